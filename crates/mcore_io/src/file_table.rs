//! `SCOREP_IoMgmt_GetIoFileHandle`'s file-path cache. Unlike the per-paradigm handle tables,
//! this genuinely is a straight instantiation of the generic template
//! (`SCOREP_HASH_TABLE_MONOTONIC`, table size 128, 6 pairs per chunk, keyed on the canonicalized
//! path's Jenkins hash with a string-equality tiebreak) — so it is ported as a literal
//! [`mcore_hashtable::MonotonicTable`] rather than bespoke code.

use std::sync::atomic::{AtomicU32, Ordering};

use mcore_hashtable::{jenkins, MonotonicTable, TableShape};

use crate::handle::FileId;

#[derive(Clone)]
struct FileKey {
    path: String,
    hash: u32,
}

struct FileShape;

impl TableShape for FileShape {
    type Key = FileKey;
    type Value = FileId;
    type CtorArg = FileId;

    fn bucket_idx(key: &FileKey, table_size: usize) -> usize {
        (key.hash as usize) % table_size
    }

    fn equals(a: &FileKey, b: &FileKey) -> bool {
        a.hash == b.hash && a.path == b.path
    }

    fn construct(_key: &FileKey, ctor_arg: FileId) -> FileId {
        ctor_arg
    }
}

const TABLE_SIZE: usize = 128;
const PAIRS_PER_CHUNK: usize = 6;

/// File-path → [`FileId`] cache, one per process. Ids are minted in allocation order starting
/// at 0, same as the source's running `unify_key` counter.
pub struct FileTable {
    table: MonotonicTable<FileShape>,
    next_id: AtomicU32,
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            table: MonotonicTable::new(PAIRS_PER_CHUNK, TABLE_SIZE),
            next_id: AtomicU32::new(0),
        }
    }

    /// `SCOREP_IoMgmt_GetIoFileHandle`: resolve `path` (already canonicalized by the caller, the
    /// way the source calls `realpath` first) to a stable [`FileId`], minting a fresh one on
    /// first sight.
    pub fn get_or_insert(&self, path: &str) -> FileId {
        let hash = jenkins::hash_bytes(path.as_bytes(), 0);
        let key = FileKey { path: path.to_string(), hash };
        // Reserve an id speculatively; `get_and_insert` only keeps it if this is the first
        // sighting of `path`, same as the source incrementing its counter unconditionally before
        // discovering whether the insert actually took.
        let candidate = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (_inserted, id) = self.table.get_and_insert(key, candidate);
        id
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_always_resolves_to_the_same_id() {
        let table = FileTable::new();
        let a = table.get_or_insert("/tmp/a.dat");
        let b = table.get_or_insert("/tmp/b.dat");
        let a_again = table.get_or_insert("/tmp/a.dat");
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }
}
