//! Per-bucket storage: a chain of fixed-capacity chunks, plus the atomic occupancy count that
//! lets a reader short-circuit an empty bucket without taking the bucket lock.
//!
//! The original template locks per bucket only for writers and keeps `get()` entirely
//! mutex-free, restarting its scan if `size` grew mid-walk. This port instead guards chunk
//! storage with a [`parking_lot::RwLock`]: readers take a shared lock (cheap, many concurrent
//! readers, no hand-rolled atomic latch to get wrong), writers take an exclusive one. `size`
//! is kept as a true `AtomicU32` alongside it purely so an empty bucket never has to touch the
//! lock at all, and so bucket occupancy remains independently observable the way the data model
//! describes it.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

/// A fixed-capacity run of key/value pairs plus a link to the next chunk in the bucket's chain.
pub(crate) struct Chunk<K, V> {
    pub(crate) pairs: Vec<(K, V)>,
    pub(crate) next: Option<Box<Chunk<K, V>>>,
}

impl<K, V> Chunk<K, V> {
    fn new(pairs_per_chunk: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(pairs_per_chunk),
            next: None,
        }
    }
}

/// The chunk chain owned by one bucket.
#[derive(Default)]
pub(crate) struct BucketStorage<K, V> {
    pub(crate) head: Option<Box<Chunk<K, V>>>,
}

/// One bucket: an atomic occupancy counter plus the lock-guarded chunk chain. Cache-line
/// aligned so that two buckets never share a cache line and contend on false sharing, mirroring
/// the template's `SCOREP_ALIGNAS(SCOREP_CACHELINESIZE)` bucket header.
#[repr(align(64))]
pub(crate) struct Bucket<K, V> {
    pub(crate) size: AtomicU32,
    pub(crate) storage: RwLock<BucketStorage<K, V>>,
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self {
            size: AtomicU32::new(0),
            storage: RwLock::new(BucketStorage::default()),
        }
    }
}

impl<K, V> Bucket<K, V> {
    pub(crate) fn len(&self) -> u32 {
        self.size.load(Ordering::SeqCst)
    }
}

/// Find the first pair satisfying `equals` by walking the chunk chain; returns a clone of the
/// stored value. Callers hold at least a read lock on the bucket's storage.
pub(crate) fn find<K, V: Clone>(
    storage: &BucketStorage<K, V>,
    mut equals: impl FnMut(&K) -> bool,
) -> Option<V> {
    let mut node = storage.head.as_deref();
    while let Some(chunk) = node {
        for (k, v) in &chunk.pairs {
            if equals(k) {
                return Some(v.clone());
            }
        }
        node = chunk.next.as_deref();
    }
    None
}

/// Append a new pair to the bucket's chunk chain, allocating a fresh chunk once the tail is
/// full. Callers hold the bucket's write lock.
pub(crate) fn push<K, V>(storage: &mut BucketStorage<K, V>, pairs_per_chunk: usize, key: K, value: V) {
    if storage.head.is_none() {
        storage.head = Some(Box::new(Chunk::new(pairs_per_chunk)));
    }
    let mut node = storage.head.as_deref_mut().expect("just inserted");
    loop {
        if node.pairs.len() < pairs_per_chunk {
            node.pairs.push((key, value));
            return;
        }
        if node.next.is_none() {
            node.next = Some(Box::new(Chunk::new(pairs_per_chunk)));
        }
        node = node.next.as_deref_mut().expect("just inserted");
    }
}

fn chunk_count<K, V>(storage: &BucketStorage<K, V>) -> usize {
    let mut n = 0;
    let mut node = storage.head.as_deref();
    while let Some(chunk) = node {
        n += 1;
        node = chunk.next.as_deref();
    }
    n
}

fn chunk_at_mut<K, V>(storage: &mut BucketStorage<K, V>, index: usize) -> Option<&mut Chunk<K, V>> {
    let mut node = storage.head.as_deref_mut();
    let mut i = 0;
    while let Some(chunk) = node {
        if i == index {
            return Some(chunk);
        }
        node = chunk.next.as_deref_mut();
        i += 1;
    }
    None
}

/// Unless the bucket has exactly one chunk, unlink an emptied tail chunk and hand it to the
/// table-wide free list. Keeping a sole empty chunk around avoids re-locking the free list on
/// the bucket's next insert, per the boundary case the source calls out explicitly.
fn release_tail_if_empty<K, V>(
    storage: &mut BucketStorage<K, V>,
    free_list: &parking_lot::Mutex<Vec<Box<Chunk<K, V>>>>,
) {
    let Some(head) = storage.head.as_mut() else {
        return;
    };
    if head.next.is_none() {
        return; // sole chunk: keep even if empty
    }
    let mut node = head.as_mut();
    while node.next.as_ref().expect("checked above").next.is_some() {
        node = node.next.as_mut().expect("checked above");
    }
    let tail_empty = node.next.as_ref().expect("checked above").pairs.is_empty();
    if tail_empty {
        let removed = node.next.take().expect("checked above");
        free_list.lock().push(removed);
    }
}

/// Locate and remove the first pair satisfying `equals`, restoring compactness by moving the
/// chunk chain's very last pair into the vacated slot. Returns the removed pair's value.
/// Callers hold the bucket's write lock.
pub(crate) fn remove<K, V>(
    storage: &mut BucketStorage<K, V>,
    free_list: &parking_lot::Mutex<Vec<Box<Chunk<K, V>>>>,
    mut equals: impl FnMut(&K) -> bool,
) -> Option<(K, V)> {
    let found = {
        let mut node = storage.head.as_deref();
        let mut chunk_idx = 0;
        let mut result = None;
        'outer: while let Some(chunk) = node {
            for (slot, (k, _)) in chunk.pairs.iter().enumerate() {
                if equals(k) {
                    result = Some((chunk_idx, slot));
                    break 'outer;
                }
            }
            node = chunk.next.as_deref();
            chunk_idx += 1;
        }
        result
    }?;
    let (found_chunk, found_slot) = found;
    let tail_idx = chunk_count(storage) - 1;

    let removed = if found_chunk == tail_idx {
        let chunk = chunk_at_mut(storage, found_chunk).expect("located above");
        chunk.pairs.swap_remove(found_slot)
    } else {
        let last_pair = {
            let tail = chunk_at_mut(storage, tail_idx).expect("tail exists");
            tail.pairs.pop().expect("tail non-empty: size > 0")
        };
        let chunk = chunk_at_mut(storage, found_chunk).expect("located above");
        std::mem::replace(&mut chunk.pairs[found_slot], last_pair)
    };

    release_tail_if_empty(storage, free_list);
    Some(removed)
}

/// Return a clone of the first key whose pair satisfies `condition`, without removing it.
pub(crate) fn find_matching<K: Clone, V>(
    storage: &BucketStorage<K, V>,
    mut condition: impl FnMut(&K, &V) -> bool,
) -> Option<K> {
    let mut node = storage.head.as_deref();
    while let Some(chunk) = node {
        for (k, v) in &chunk.pairs {
            if condition(k, v) {
                return Some(k.clone());
            }
        }
        node = chunk.next.as_deref();
    }
    None
}

/// Walk every pair in the bucket; serial-context only (matches `iterate_key_value_pairs`).
pub(crate) fn for_each<K, V>(storage: &BucketStorage<K, V>, mut f: impl FnMut(&K, &V)) {
    let mut node = storage.head.as_deref();
    while let Some(chunk) = node {
        for (k, v) in &chunk.pairs {
            f(k, v);
        }
        node = chunk.next.as_deref();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_chains_new_chunks_when_full() {
        let mut storage: BucketStorage<i32, i32> = BucketStorage::default();
        for i in 0..7 {
            push(&mut storage, 3, i, i * 10);
        }
        assert_eq!(chunk_count(&storage), 3); // 3 + 3 + 1
        let mut seen = vec![];
        for_each(&storage, |k, v| seen.push((*k, *v)));
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn remove_keeps_sole_chunk_even_when_emptied() {
        let mut storage: BucketStorage<i32, i32> = BucketStorage::default();
        let free_list = parking_lot::Mutex::new(Vec::new());
        push(&mut storage, 3, 1, 10);
        let removed = remove(&mut storage, &free_list, |k| *k == 1);
        assert_eq!(removed, Some((1, 10)));
        assert!(storage.head.is_some(), "sole chunk must be retained");
        assert!(free_list.lock().is_empty());
    }

    #[test]
    fn remove_releases_emptied_non_primary_chunk() {
        let mut storage: BucketStorage<i32, i32> = BucketStorage::default();
        let free_list = parking_lot::Mutex::new(Vec::new());
        for i in 0..4 {
            push(&mut storage, 3, i, i);
        }
        // four pairs -> two chunks (3 + 1). Remove the lone pair in the second chunk.
        let removed = remove(&mut storage, &free_list, |k| *k == 3);
        assert_eq!(removed, Some((3, 3)));
        assert_eq!(chunk_count(&storage), 1);
        assert_eq!(free_list.lock().len(), 1);
    }

    #[test]
    fn remove_compacts_with_last_pair_from_tail() {
        let mut storage: BucketStorage<i32, i32> = BucketStorage::default();
        let free_list = parking_lot::Mutex::new(Vec::new());
        for i in 0..5 {
            push(&mut storage, 3, i, i);
        }
        let removed = remove(&mut storage, &free_list, |k| *k == 0);
        assert_eq!(removed, Some((0, 0)));
        let mut seen = vec![];
        for_each(&storage, |k, _| seen.push(*k));
        assert_eq!(seen.len(), 4);
        assert!(!seen.contains(&0));
        assert!(seen.contains(&4), "last pair should have been moved into the vacated slot");
    }
}
