/// A region handle as returned by the task/region subsystem. Opaque to this crate — never
/// interpreted, only compared and carried.
pub type RegionHandle = u32;

/// Identifies a location (thread/process) that owns a root subtree of the profile forest.
pub type LocationId = u32;

/// An arena index into [`crate::Tree`]'s node pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct NodeId(pub(crate) usize);

/// Identifies a metric definition for a sparse (per-node, not-always-present) metric value.
pub type MetricId = u32;

/// What a node represents. `scorep_profile_node.c` keeps this as a `node_type` enum plus a
/// separate `type_specific_data` union compared/hashed by free functions dispatching on the
/// enum tag; folded here into a single tagged enum carrying its own payload directly, the usual
/// substitution for a C tagged union (see `DESIGN.md`).
///
/// `ThreadFork` is the one departure from a literal port: the source marks a node as a fork
/// point with an orthogonal flag (`SCOREP_PROFILE_FLAG_IS_FORK_NODE`) settable on any node type,
/// not a `node_type` variant. This implementation elevates it to its own variant instead — see
/// `SPEC_FULL.md` §2.6.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeType {
    /// A plain callpath node for a region enter/exit.
    Regular(RegionHandle),
    /// The root of one location's subtree.
    ThreadRoot(LocationId),
    /// A location's point of creation by a fork. `location` identifies which spawned location
    /// this root belongs to; `fork_node` names the `ThreadFork` node it was spawned from, if that
    /// fork has been profiled (cross-process merges may not have it yet).
    ThreadStart { location: LocationId, fork_node: Option<NodeId> },
    /// A region that forked new locations (an OpenMP parallel region, a pthread_create, ...).
    ThreadFork(RegionHandle),
}

/// A dense metric accumulator: running sum and sum-of-squares, merged by addition (spec.md §4.5
/// "dense metrics merge by summation"). Used both for the node's implicit inclusive-time slot and
/// for every general-purpose dense metric slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DenseMetric {
    pub sum: u64,
    pub squares: u64,
}

impl DenseMetric {
    pub(crate) fn merge(&mut self, other: &DenseMetric) {
        self.sum += other.sum;
        self.squares += other.squares;
    }
}

/// One callpath node. Tree links (`parent`/`first_child`/`next_sibling`) are arena indices; a
/// node with `parent == None` sits in the root list, threaded through `next_sibling` exactly like
/// a child list under a virtual null parent (mirrors the source's `first_root_node` chain).
///
/// Sparse metrics are plain `Vec`s on the node rather than the source's externally pooled
/// singly-linked chains recycled through a per-location free list: an arena-backed `Vec` already
/// recycles its allocation on node reuse, so the extra pool buys nothing observable through this
/// crate's operations. Documented in `DESIGN.md`.
pub(crate) struct Node {
    pub(crate) node_type: NodeType,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,

    pub(crate) count: u64,
    pub(crate) hits: u64,
    pub(crate) first_enter_time: u64,
    pub(crate) last_exit_time: u64,
    pub(crate) inclusive_time: DenseMetric,
    pub(crate) dense_metrics: Vec<DenseMetric>,

    pub(crate) int_sparse: Vec<(MetricId, i64)>,
    pub(crate) double_sparse: Vec<(MetricId, f64)>,

    pub(crate) mpi_in_subtree: bool,

    pub(crate) callpath_handle: Option<u64>,
}

impl Node {
    pub(crate) fn reset(&mut self, node_type: NodeType, timestamp: u64, num_dense_metrics: usize) {
        self.node_type = node_type;
        self.parent = None;
        self.first_child = None;
        self.next_sibling = None;
        self.count = 0;
        self.hits = 0;
        self.first_enter_time = timestamp;
        self.last_exit_time = timestamp;
        self.inclusive_time = DenseMetric::default();
        self.dense_metrics.clear();
        self.dense_metrics.resize(num_dense_metrics, DenseMetric::default());
        self.int_sparse.clear();
        self.double_sparse.clear();
        self.mpi_in_subtree = false;
        self.callpath_handle = None;
    }
}
