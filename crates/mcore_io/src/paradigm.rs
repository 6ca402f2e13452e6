use crate::handle::HandleId;

/// `SCOREP_IO_HANDLE_HASHTABLE_POWER = 6`: every paradigm's handle table has exactly 64 buckets,
/// fixed for the paradigm's lifetime (no growth, unlike [`mcore_hashtable`]'s chunked chains).
pub(crate) const BUCKETS: usize = 64;

/// One registered I/O paradigm's handle table: a fixed array of intrusive singly-linked chains,
/// one per bucket, threaded through each [`crate::handle::HandleData::next_in_bucket`] rather
/// than through a separate chunk structure. This is a deliberate structural departure from
/// [`mcore_hashtable`]'s chunked-array buckets (see `DESIGN.md`'s C4 entry): the source links
/// handles directly through their own payload, and a table keyed by an opaque byte payload with
/// O(1) splice-out-by-reference has no natural fit to the chunk-compaction design C1 uses for
/// plain key/value pairs.
pub(crate) struct Paradigm {
    pub(crate) buckets: [Option<HandleId>; BUCKETS],
}

impl Paradigm {
    pub(crate) fn new() -> Self {
        Self { buckets: [None; BUCKETS] }
    }

    pub(crate) fn bucket_idx(hash: u32) -> usize {
        (hash as usize) & (BUCKETS - 1)
    }
}
