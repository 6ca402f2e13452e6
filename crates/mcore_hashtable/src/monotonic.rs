use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use crate::bucket::{self, Bucket};
use crate::shape::TableShape;

/// A hash table with no remove operation: `get` and `get_and_insert` only. Every other
/// operation below is built on the same bucket chunk-chain as [`crate::NonMonotonicTable`];
/// the only difference is that this variant never has to coordinate with a writer that might
/// shrink the chain out from under a reader, so it never needs the exclusive lock outside of
/// insert.
pub struct MonotonicTable<S: TableShape> {
    table_size: usize,
    pairs_per_chunk: usize,
    buckets: Vec<Bucket<S::Key, S::Value>>,
    _shape: PhantomData<S>,
}

impl<S: TableShape> MonotonicTable<S> {
    /// `table_size` should be a power of two for a good `bucket_idx` distribution, though
    /// nothing here requires it.
    pub fn new(pairs_per_chunk: usize, table_size: usize) -> Self {
        assert!(pairs_per_chunk > 0, "pairs_per_chunk must be positive");
        assert!(table_size > 0, "table_size must be positive");
        let mut buckets = Vec::with_capacity(table_size);
        buckets.resize_with(table_size, Bucket::default);
        Self {
            table_size,
            pairs_per_chunk,
            buckets,
            _shape: PhantomData,
        }
    }

    fn bucket_for(&self, key: &S::Key) -> &Bucket<S::Key, S::Value> {
        let idx = S::bucket_idx(key, self.table_size);
        mcore_err::bug_on(
            idx >= self.table_size,
            format_args!("out-of-bounds bucket index {idx} (table size {})", self.table_size),
        );
        &self.buckets[idx]
    }

    /// An arbitrary number of `get`s may run concurrently with each other and with
    /// `get_and_insert`.
    pub fn get(&self, key: &S::Key) -> Option<S::Value> {
        let bucket = self.bucket_for(key);
        if bucket.len() == 0 {
            return None;
        }
        let storage = bucket.storage.read();
        bucket::find(&storage, |k| S::equals(key, k))
    }

    /// Returns `(true, value)` if a fresh pair was inserted, `(false, value)` if `key` was
    /// already present.
    pub fn get_and_insert(&self, key: S::Key, ctor_arg: S::CtorArg) -> (bool, S::Value) {
        if let Some(value) = self.get(&key) {
            return (false, value);
        }
        let bucket = self.bucket_for(&key);
        let mut storage = bucket.storage.write();
        // Re-check: another writer may have inserted this key while we waited for the lock.
        if let Some(value) = bucket::find(&storage, |k| S::equals(&key, k)) {
            return (false, value);
        }
        let value = S::construct(&key, ctor_arg);
        bucket::push(&mut storage, self.pairs_per_chunk, key, value.clone());
        bucket.size.fetch_add(1, Ordering::SeqCst);
        (true, value)
    }

    /// Serial-context only: walk every live pair.
    pub fn iterate_key_value_pairs(&self, mut cb: impl FnMut(&S::Key, &S::Value)) {
        for bucket in &self.buckets {
            let storage = bucket.storage.read();
            bucket::for_each(&storage, &mut cb);
        }
    }

    /// Serial-context only: drop every chunk, leaving the table empty.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.storage.get_mut().head = None;
            bucket.size.store(0, Ordering::SeqCst);
        }
    }

    /// Total number of live pairs, summed across buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.len() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mod8Table;
    impl TableShape for Mod8Table {
        type Key = u32;
        type Value = u32;
        type CtorArg = u32;
        fn bucket_idx(key: &u32, table_size: usize) -> usize {
            (*key as usize) % table_size
        }
        fn equals(a: &u32, b: &u32) -> bool {
            a == b
        }
        fn construct(key: &u32, ctor_arg: u32) -> u32 {
            *key + ctor_arg
        }
    }

    #[test]
    fn end_to_end_scenario_from_spec() {
        // TABLE_SIZE=8, PAIRS_PER_CHUNK=3, bucket_idx(k) = k mod 8.
        let table: MonotonicTable<Mod8Table> = MonotonicTable::new(3, 8);
        for k in [1u32, 9, 17, 25, 3, 11, 19, 27, 35] {
            table.get_and_insert(k, 0);
        }
        assert_eq!(table.len(), 9);
        let (inserted, value) = table.get_and_insert(35, 0);
        assert!(!inserted);
        assert_eq!(value, 35);
        assert_eq!(table.get(&4), None);
    }

    #[test]
    fn insert_is_idempotent_and_keeps_first_constructed_value() {
        let table: MonotonicTable<Mod8Table> = MonotonicTable::new(3, 8);
        let (first_inserted, first_value) = table.get_and_insert(1, 100);
        let (second_inserted, second_value) = table.get_and_insert(1, 999);
        assert!(first_inserted);
        assert!(!second_inserted);
        assert_eq!(first_value, second_value);
    }

    #[test]
    #[should_panic(expected = "out-of-bounds bucket index")]
    fn out_of_bounds_bucket_idx_is_fatal() {
        struct BrokenShape;
        impl TableShape for BrokenShape {
            type Key = u32;
            type Value = u32;
            type CtorArg = ();
            fn bucket_idx(_key: &u32, _table_size: usize) -> usize {
                999
            }
            fn equals(a: &u32, b: &u32) -> bool {
                a == b
            }
            fn construct(key: &u32, _ctor_arg: ()) -> u32 {
                *key
            }
        }
        let table: MonotonicTable<BrokenShape> = MonotonicTable::new(3, 8);
        table.get(&1);
    }
}
