/// An arena index into [`crate::AllocMetric`]'s allocation-node pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct AllocationId(pub(crate) usize);

/// `allocation_item`: one live (or recycled-but-not-yet-reused) allocation record. `left`/
/// `right` are splay-tree links, arena indices rather than pointers (same substitution as
/// every other component — see `DESIGN.md`'s arena+index notes).
pub(crate) struct AllocationNode {
    pub(crate) left: Option<AllocationId>,
    pub(crate) right: Option<AllocationId>,
    pub(crate) address: u64,
    pub(crate) size: u64,
    pub(crate) substrate_data: Vec<u64>,
}

impl AllocationNode {
    pub(crate) fn reset(&mut self, address: u64, size: u64, num_substrates: usize) {
        self.left = None;
        self.right = None;
        self.address = address;
        self.size = size;
        self.substrate_data.clear();
        self.substrate_data.resize(num_substrates, 0);
    }
}
