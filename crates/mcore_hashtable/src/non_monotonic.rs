use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::bucket::{self, Bucket, Chunk};
use crate::shape::TableShape;

/// A hash table with remove support. Built on the same chunk-chain buckets as
/// [`crate::MonotonicTable`], with a table-wide free list of emptied chunks so a bucket that
/// churns entries doesn't repeatedly allocate and drop chunk storage.
pub struct NonMonotonicTable<S: TableShape> {
    table_size: usize,
    pairs_per_chunk: usize,
    buckets: Vec<Bucket<S::Key, S::Value>>,
    free_list: Mutex<Vec<Box<Chunk<S::Key, S::Value>>>>,
    _shape: PhantomData<S>,
}

impl<S: TableShape> NonMonotonicTable<S> {
    pub fn new(pairs_per_chunk: usize, table_size: usize) -> Self {
        assert!(pairs_per_chunk > 0, "pairs_per_chunk must be positive");
        assert!(table_size > 0, "table_size must be positive");
        let mut buckets = Vec::with_capacity(table_size);
        buckets.resize_with(table_size, Bucket::default);
        Self {
            table_size,
            pairs_per_chunk,
            buckets,
            free_list: Mutex::new(Vec::new()),
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

    pub fn get(&self, key: &S::Key) -> Option<S::Value> {
        let bucket = self.bucket_for(key);
        if bucket.len() == 0 {
            return None;
        }
        let storage = bucket.storage.read();
        bucket::find(&storage, |k| S::equals(key, k))
    }

    pub fn get_and_insert(&self, key: S::Key, ctor_arg: S::CtorArg) -> (bool, S::Value) {
        if let Some(value) = self.get(&key) {
            return (false, value);
        }
        let bucket = self.bucket_for(&key);
        let mut storage = bucket.storage.write();
        if let Some(value) = bucket::find(&storage, |k| S::equals(&key, k)) {
            return (false, value);
        }
        // Reuse a free-listed chunk before growing, matching the non-monotonic fast path.
        if storage.head.is_none() {
            if let Some(mut reused) = self.free_list.lock().pop() {
                reused.pairs.clear();
                reused.next = None;
                storage.head = Some(reused);
            }
        }
        let value = S::construct(&key, ctor_arg);
        bucket::push(&mut storage, self.pairs_per_chunk, key, value.clone());
        bucket.size.fetch_add(1, Ordering::SeqCst);
        (true, value)
    }

    /// Removes `key`, invoking [`TableShape::destroy`] on the removed pair. Returns whether a
    /// pair was found.
    pub fn remove(&self, key: &S::Key) -> bool {
        self.get_and_remove(key).is_some()
    }

    /// Removes `key` and hands the removed value to the caller without invoking
    /// [`TableShape::destroy`] — the caller takes over whatever cleanup that hook would have
    /// done.
    pub fn get_and_remove(&self, key: &S::Key) -> Option<S::Value> {
        let bucket = self.bucket_for(key);
        let mut storage = bucket.storage.write();
        let removed = bucket::remove(&mut storage, &self.free_list, |k| S::equals(key, k));
        if removed.is_some() {
            bucket.size.fetch_sub(1, Ordering::SeqCst);
        }
        removed.map(|(_, v)| v)
    }

    /// Remove every pair for which `condition` holds, calling [`TableShape::destroy`] on each.
    pub fn remove_if(&self, mut condition: impl FnMut(&S::Key, &S::Value) -> bool) {
        for bucket in &self.buckets {
            if bucket.len() == 0 {
                continue;
            }
            let mut storage = bucket.storage.write();
            loop {
                let hit = bucket::find_matching(&storage, &mut condition);
                let Some(matched_key) = hit else {
                    break;
                };
                if let Some((k, v)) = bucket::remove(&mut storage, &self.free_list, |k| S::equals(&matched_key, k))
                {
                    bucket.size.fetch_sub(1, Ordering::SeqCst);
                    S::destroy(k, v);
                } else {
                    break;
                }
            }
        }
    }

    pub fn iterate_key_value_pairs(&self, mut cb: impl FnMut(&S::Key, &S::Value)) {
        for bucket in &self.buckets {
            let storage = bucket.storage.read();
            bucket::for_each(&storage, &mut cb);
        }
    }

    /// Serial-context only: drop every live and free-listed chunk.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.storage.get_mut().head = None;
            bucket.size.store(0, Ordering::SeqCst);
        }
        self.free_list.lock().clear();
    }

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
    fn remove_then_get_is_not_found_and_iteration_never_yields_it() {
        let table: NonMonotonicTable<Mod8Table> = NonMonotonicTable::new(3, 8);
        for k in [1u32, 9, 17, 25] {
            table.get_and_insert(k, 0);
        }
        assert!(table.remove(&9));
        assert_eq!(table.get(&9), None);
        assert!(!table.remove(&9));

        let mut seen = vec![];
        table.iterate_key_value_pairs(|k, _| seen.push(*k));
        assert!(!seen.contains(&9));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn insert_remove_roundtrip_restores_size() {
        let table: NonMonotonicTable<Mod8Table> = NonMonotonicTable::new(3, 8);
        table.get_and_insert(1, 0);
        assert_eq!(table.len(), 1);
        table.remove(&1);
        assert_eq!(table.len(), 0);
        // The vacated chunk should be available for the next insert without growing the table.
        table.get_and_insert(9, 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_if_removes_every_match() {
        let table: NonMonotonicTable<Mod8Table> = NonMonotonicTable::new(3, 8);
        for k in [1u32, 2, 3, 9, 10, 11] {
            table.get_and_insert(k, 0);
        }
        table.remove_if(|k, _| *k % 2 == 1);
        let mut seen = vec![];
        table.iterate_key_value_pairs(|k, _| seen.push(*k));
        seen.sort_unstable();
        assert_eq!(seen, vec![2, 10]);
    }
}
