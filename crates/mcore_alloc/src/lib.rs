//! Live-allocation tracking: a splay tree keyed on address, a recycling free list, and a
//! process-wide byte counter shared by every tracker (spec.md §4.4).
//!
//! One [`AllocMetric`] per memory-recording scope (typically per allocator substrate per
//! process). All mutation goes through its own `parking_lot::Mutex`, matching spec.md §5's "per-
//! tracker mutex in C5"; the process-wide counter is a single [`std::sync::atomic::AtomicU64`]
//! shared by every tracker in the process, updated with `SeqCst` per spec.md §5.

mod node;
mod splay;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

pub use node::AllocationId;
use node::AllocationNode;

static PROCESS_ALLOCATED_MEMORY: AtomicU64 = AtomicU64::new(0);

/// Current process-wide live-allocation total, summed across every [`AllocMetric`].
pub fn process_allocated_memory() -> u64 {
    PROCESS_ALLOCATED_MEMORY.load(Ordering::SeqCst)
}

/// Result of [`AllocMetric::handle_realloc`]: the previous size, the handle to reinsert/free
/// next, and the two totals to report onward — snapshotted at the point spec.md §4.4 calls for,
/// which for a relocating realloc is the transient peak between the add and the subtract, not
/// the final converged value.
pub struct ReallocOutcome {
    pub prev_size: u64,
    pub total_allocated_memory: u64,
    pub process_allocated_memory: u64,
    pub id: AllocationId,
}

struct Inner {
    arena: Vec<AllocationNode>,
    free_list: Vec<AllocationId>,
    root: Option<AllocationId>,
    total_allocated_memory: u64,
    num_substrates: usize,
}

impl Inner {
    fn alloc_node(&mut self, address: u64, size: u64) -> AllocationId {
        if let Some(id) = self.free_list.pop() {
            self.arena[id.0].reset(address, size, self.num_substrates);
            id
        } else {
            self.arena.push(AllocationNode {
                left: None,
                right: None,
                address,
                size,
                substrate_data: vec![0; self.num_substrates],
            });
            AllocationId(self.arena.len() - 1)
        }
    }

    /// `insert_memory_allocation`. On a duplicate address the source warns and then replaces the
    /// tree root with the new node *unconditionally* (the reassignment is outside the
    /// if/else-if/else chain), orphaning whatever was at the root along with its whole subtree.
    /// Ported as-is rather than silently fixed: see `DESIGN.md`'s C5 entry.
    fn insert(&mut self, id: AllocationId) {
        if let Some(root) = self.root {
            let root = splay::splay(&mut self.arena, Some(root), self.arena[id.0].address).expect("root was Some");
            let address = self.arena[id.0].address;
            if address < self.arena[root.0].address {
                self.arena[id.0].right = Some(root);
                self.arena[id.0].left = self.arena[root.0].left;
                self.arena[root.0].left = None;
            } else if address > self.arena[root.0].address {
                self.arena[id.0].left = Some(root);
                self.arena[id.0].right = self.arena[root.0].right;
                self.arena[root.0].right = None;
            } else {
                mcore_err::Recoverable::DuplicateInsert { table: "alloc_tracker" }.warn();
            }
        }
        self.root = Some(id);
    }

    fn find(&mut self, address: u64) -> Option<AllocationId> {
        let root = self.root?;
        self.root = splay::splay(&mut self.arena, Some(root), address);
        let root = self.root.expect("splay of Some root returns Some");
        (self.arena[root.0].address == address).then_some(root)
    }

    /// `remove_memory_allocation`: detach `id` from the tree. `id` is assumed to already be the
    /// splayed-to root (every call site splays on `id`'s address immediately beforehand), same
    /// precondition the source carries via its own root-equality guard.
    fn detach(&mut self, id: AllocationId) {
        if self.root != Some(id) {
            return;
        }
        if let Some(left) = self.arena[id.0].left {
            self.root = splay::splay(&mut self.arena, Some(left), self.arena[id.0].address);
            let new_root = self.root.expect("splay of Some root returns Some");
            self.arena[new_root.0].right = self.arena[id.0].right;
        } else {
            self.root = self.arena[id.0].right;
        }
        self.arena[id.0].left = None;
        self.arena[id.0].right = None;
    }

    fn recycle(&mut self, id: AllocationId) {
        self.free_list.push(id);
    }
}

/// One live-allocation tracker (`SCOREP_AllocMetric`).
pub struct AllocMetric {
    name: String,
    inner: Mutex<Inner>,
}

impl AllocMetric {
    pub fn new(name: impl Into<String>, num_substrates: usize) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                arena: Vec::new(),
                free_list: Vec::new(),
                root: None,
                total_allocated_memory: 0,
                num_substrates,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_allocated_memory(&self) -> u64 {
        self.inner.lock().total_allocated_memory
    }

    /// `SCOREP_AllocMetric_HandleAlloc`: a new allocation was observed at `address`.
    pub fn handle_alloc(&self, address: u64, size: u64) -> AllocationId {
        let mut inner = self.inner.lock();
        PROCESS_ALLOCATED_MEMORY.fetch_add(size, Ordering::SeqCst);
        inner.total_allocated_memory += size;
        let id = inner.alloc_node(address, size);
        inner.insert(id);
        id
    }

    /// `SCOREP_AllocMetric_AcquireAlloc`: look up `address` and, if found, detach it from the
    /// tree so the caller can pass it on to [`handle_realloc`](Self::handle_realloc) or
    /// [`handle_free`](Self::handle_free). Warns and returns `None` if nothing is tracked at
    /// `address` (spec.md §7 kind 2 — freeing/reallocating an address this tracker never saw is
    /// recoverable, not fatal, since allocator interposition can start mid-program).
    pub fn acquire_alloc(&self, address: u64) -> Option<AllocationId> {
        mcore_err::bug_on(address == 0, "cannot acquire an allocation for a null address");
        let mut inner = self.inner.lock();
        match inner.find(address) {
            Some(id) => {
                inner.detach(id);
                Some(id)
            }
            None => {
                mcore_err::Recoverable::NotFound { what: "allocation" }.warn();
                None
            }
        }
    }

    /// `SCOREP_AllocMetric_HandleRealloc`: resize (and possibly relocate) an allocation.
    /// `prev` is the detached handle from a prior [`acquire_alloc`](Self::acquire_alloc), or
    /// `None` if the tracker never saw the previous allocation (the realloc is then treated as a
    /// fresh [`handle_alloc`](Self::handle_alloc)).
    ///
    /// Resolves spec.md §9's open question on `address == result_address && size == 0`: the
    /// source does not special-case it, the address-unchanged branch always runs and the node is
    /// retained with `size == 0` rather than treated as an implicit free. This port matches that
    /// — a zero-size "retained" allocation only leaves the tree through an explicit
    /// [`handle_free`](Self::handle_free).
    ///
    /// spec.md §4.4: when the allocator kept the same address, this is one signed delta against
    /// both counters. When it relocated, the source does two separate atomic updates — add the
    /// new size, then subtract the old one — and the totals handed back here (and on to
    /// `SCOREP_TrackRealloc`/[`Substrate::track_realloc`](crate)) are snapshotted *between* those
    /// two steps, so the momentary peak that briefly counts both the old and new allocation is
    /// what gets reported, not the converged post-free total.
    pub fn handle_realloc(&self, address: u64, size: u64, prev: Option<AllocationId>) -> ReallocOutcome {
        let mut inner = self.inner.lock();
        let Some(id) = prev else {
            mcore_err::Recoverable::NotFound { what: "previous allocation" }.warn();
            let process_allocated_memory = PROCESS_ALLOCATED_MEMORY.fetch_add(size, Ordering::SeqCst) + size;
            inner.total_allocated_memory += size;
            let total_allocated_memory = inner.total_allocated_memory;
            let id = inner.alloc_node(address, size);
            inner.insert(id);
            return ReallocOutcome { prev_size: 0, total_allocated_memory, process_allocated_memory, id };
        };

        let prev_size = inner.arena[id.0].size;
        let prev_address = inner.arena[id.0].address;

        let (total_allocated_memory, process_allocated_memory) = if prev_address == address {
            if size >= prev_size {
                let grown = size - prev_size;
                let process_allocated_memory = PROCESS_ALLOCATED_MEMORY.fetch_add(grown, Ordering::SeqCst) + grown;
                inner.total_allocated_memory += grown;
                (inner.total_allocated_memory, process_allocated_memory)
            } else {
                let shrunk = prev_size - size;
                let process_allocated_memory = PROCESS_ALLOCATED_MEMORY.fetch_sub(shrunk, Ordering::SeqCst) - shrunk;
                inner.total_allocated_memory -= shrunk;
                (inner.total_allocated_memory, process_allocated_memory)
            }
        } else {
            // System allocates `size` before freeing the old allocation (a free(prevAddr) really
            // does happen) — report the usage after the allocation but before the free, then
            // reduce afterwards by the freed size.
            let process_allocated_memory = PROCESS_ALLOCATED_MEMORY.fetch_add(size, Ordering::SeqCst) + size;
            PROCESS_ALLOCATED_MEMORY.fetch_sub(prev_size, Ordering::SeqCst);

            inner.total_allocated_memory += size;
            let total_allocated_memory = inner.total_allocated_memory;
            inner.total_allocated_memory -= prev_size;

            (total_allocated_memory, process_allocated_memory)
        };

        inner.arena[id.0].address = address;
        inner.arena[id.0].size = size;
        inner.insert(id);

        ReallocOutcome { prev_size, total_allocated_memory, process_allocated_memory, id }
    }

    /// `SCOREP_AllocMetric_HandleFree`: `allocation` must already be detached (via
    /// [`acquire_alloc`](Self::acquire_alloc)); returns its size and recycles its arena slot.
    pub fn handle_free(&self, allocation: AllocationId) -> u64 {
        let mut inner = self.inner.lock();
        let size = inner.arena[allocation.0].size;
        PROCESS_ALLOCATED_MEMORY.fetch_sub(size, Ordering::SeqCst);
        inner.total_allocated_memory -= size;
        inner.recycle(allocation);
        size
    }

    pub fn substrate_data(&self, allocation: AllocationId, slot: usize) -> u64 {
        self.inner.lock().arena[allocation.0].substrate_data[slot]
    }

    pub fn set_substrate_data(&self, allocation: AllocationId, slot: usize, value: u64) {
        self.inner.lock().arena[allocation.0].substrate_data[slot] = value;
    }

    /// `SCOREP_AllocMetric_ReportLeaked`: destructively walk every node still in the tree,
    /// calling `on_leak(address, size)` for each, then recycle it. Walk order follows whatever
    /// shape the splay tree happens to have (the source does the same — each leaked-memory event
    /// is independent, no ordering is promised).
    pub fn report_leaked(&self, mut on_leak: impl FnMut(u64, u64)) {
        let mut inner = self.inner.lock();
        while let Some(id) = inner.root {
            let (address, size) = (inner.arena[id.0].address, inner.arena[id.0].size);
            on_leak(address, size);
            inner.detach(id);
            inner.recycle(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_scenario_four_allocation_tracker() {
        let metric = AllocMetric::new("heap", 0);
        metric.handle_alloc(0x1000, 16);
        metric.handle_alloc(0x2000, 32);
        metric.handle_alloc(0x1800, 8);
        metric.handle_alloc(0x2800, 64);
        metric.handle_alloc(0x1400, 4);
        assert_eq!(metric.total_allocated_memory(), 124);

        let prev = metric.acquire_alloc(0x2000).unwrap();
        let outcome = metric.handle_realloc(0x2000, 40, Some(prev));
        assert_eq!(outcome.prev_size, 32);
        assert_eq!(metric.total_allocated_memory(), 132);

        let freed = metric.acquire_alloc(0x1000).unwrap();
        let out_size = metric.handle_free(freed);
        assert_eq!(out_size, 16);
        assert_eq!(metric.total_allocated_memory(), 116);

        let mut leaked = vec![];
        metric.report_leaked(|addr, size| leaked.push((addr, size)));
        assert_eq!(leaked.len(), 4);
        assert!(leaked.contains(&(0x2000, 40)));
        let _ = outcome.id;
    }

    #[test]
    fn handle_alloc_then_acquire_then_handle_free_restores_the_counter() {
        let metric = AllocMetric::new("heap", 0);
        metric.handle_alloc(0x3000, 100);
        assert_eq!(metric.total_allocated_memory(), 100);
        let acquired = metric.acquire_alloc(0x3000).unwrap();
        let size = metric.handle_free(acquired);
        assert_eq!(size, 100);
        assert_eq!(metric.total_allocated_memory(), 0);
    }

    #[test]
    fn acquiring_an_unknown_address_is_recoverable_not_fatal() {
        let metric = AllocMetric::new("heap", 0);
        assert_eq!(metric.acquire_alloc(0x9999), None);
    }

    #[test]
    #[should_panic(expected = "null address")]
    fn acquiring_the_null_address_is_fatal() {
        let metric = AllocMetric::new("heap", 0);
        metric.acquire_alloc(0);
    }

    #[test]
    fn realloc_with_no_previous_allocation_behaves_like_a_fresh_alloc() {
        let metric = AllocMetric::new("heap", 0);
        let outcome = metric.handle_realloc(0x4000, 8, None);
        assert_eq!(outcome.prev_size, 0);
        assert_eq!(metric.total_allocated_memory(), 8);
        let mut leaked = vec![];
        metric.report_leaked(|addr, size| leaked.push((addr, size)));
        assert_eq!(leaked, vec![(0x4000, 8)]);
    }

    #[test]
    fn realloc_to_a_new_address_frees_the_old_one_after_accounting_for_both() {
        let metric = AllocMetric::new("heap", 0);
        metric.handle_alloc(0x1000, 100);
        assert_eq!(metric.total_allocated_memory(), 100);

        let prev = metric.acquire_alloc(0x1000).unwrap();
        let outcome = metric.handle_realloc(0x2000, 60, Some(prev));
        assert_eq!(outcome.prev_size, 100);
        // the peak momentarily counts both the new 60 and the old 100
        assert_eq!(outcome.total_allocated_memory, 160);
        // the process-wide counter is shared by every tracker in the test binary, but it can
        // never be smaller than this tracker's own peak
        assert!(outcome.process_allocated_memory >= outcome.total_allocated_memory);
        // after the implicit free of the old allocation, the converged total is just the new size
        assert_eq!(metric.total_allocated_memory(), 60);

        let mut leaked = vec![];
        metric.report_leaked(|addr, size| leaked.push((addr, size)));
        assert_eq!(leaked, vec![(0x2000, 60)]);
    }

    #[test]
    fn realloc_keeping_the_same_address_reports_the_converged_total_not_a_peak() {
        let metric = AllocMetric::new("heap", 0);
        metric.handle_alloc(0x1000, 100);
        let prev = metric.acquire_alloc(0x1000).unwrap();
        let outcome = metric.handle_realloc(0x1000, 60, Some(prev));
        assert_eq!(outcome.prev_size, 100);
        assert_eq!(outcome.total_allocated_memory, 60);
        assert!(outcome.process_allocated_memory >= outcome.total_allocated_memory);
        assert_eq!(metric.total_allocated_memory(), 60);
    }

    #[test]
    fn substrate_data_slots_round_trip() {
        let metric = AllocMetric::new("heap", 2);
        let id = metric.handle_alloc(0x5000, 1);
        metric.set_substrate_data(id, 1, 77);
        assert_eq!(metric.substrate_data(id, 1), 77);
        assert_eq!(metric.substrate_data(id, 0), 0);
    }
}
