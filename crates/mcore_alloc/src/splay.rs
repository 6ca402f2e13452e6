//! Top-down splay, ported from `SCOREP_AllocMetric.c`'s `splay` (itself adapted from Sleator's
//! canonical top-down splay). The source builds two temporary spines while descending toward
//! `key`, using a stack-local sentinel node so the spine-tail writes never need a null check;
//! this port tracks each spine's head/tail as plain `Option<AllocationId>` pairs instead, since
//! there's no arena slot to spend on a throwaway sentinel.
//!
//! Naming follows the *contents* of each spine, not the source's `left`/`right` locals (which
//! name the variable, not what it holds): `less` collects every node visited whose address is
//! less than `key` (destined to become the new root's left subtree), `greater` collects every
//! node greater than `key` (destined to become the new root's right subtree).

use crate::node::{AllocationId, AllocationNode};

pub(crate) fn splay(arena: &mut [AllocationNode], root: Option<AllocationId>, key: u64) -> Option<AllocationId> {
    let mut root = root?;

    let mut less_head: Option<AllocationId> = None;
    let mut less_tail: Option<AllocationId> = None;
    let mut greater_head: Option<AllocationId> = None;
    let mut greater_tail: Option<AllocationId> = None;

    loop {
        if key < arena[root.0].address {
            let Some(left) = arena[root.0].left else { break };
            if key < arena[left.0].address {
                // zig-zig: rotate right
                arena[root.0].left = arena[left.0].right;
                arena[left.0].right = Some(root);
                root = left;
                if arena[root.0].left.is_none() {
                    break;
                }
            }
            match greater_tail {
                Some(tail) => arena[tail.0].left = Some(root),
                None => greater_head = Some(root),
            }
            greater_tail = Some(root);
            root = arena[root.0].left.expect("checked non-null above");
        } else if key > arena[root.0].address {
            let Some(right) = arena[root.0].right else { break };
            if key > arena[right.0].address {
                // zig-zig: rotate left
                arena[root.0].right = arena[right.0].left;
                arena[right.0].left = Some(root);
                root = right;
                if arena[root.0].right.is_none() {
                    break;
                }
            }
            match less_tail {
                Some(tail) => arena[tail.0].right = Some(root),
                None => less_head = Some(root),
            }
            less_tail = Some(root);
            root = arena[root.0].right.expect("checked non-null above");
        } else {
            break;
        }
    }

    if let Some(tail) = less_tail {
        arena[tail.0].right = arena[root.0].left;
    }
    if let Some(tail) = greater_tail {
        arena[tail.0].left = arena[root.0].right;
    }
    arena[root.0].left = less_head;
    arena[root.0].right = greater_head;
    Some(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_of(pairs: &[(u64, u64)]) -> Vec<AllocationNode> {
        pairs
            .iter()
            .map(|&(address, size)| AllocationNode { left: None, right: None, address, size, substrate_data: vec![] })
            .collect()
    }

    #[test]
    fn splay_on_empty_tree_is_a_no_op() {
        let mut arena: Vec<AllocationNode> = vec![];
        assert_eq!(splay(&mut arena, None, 42), None);
    }

    #[test]
    fn splay_on_a_single_node_tree_is_identity() {
        let mut arena = arena_of(&[(100, 16)]);
        let root = splay(&mut arena, Some(AllocationId(0)), 100);
        assert_eq!(root, Some(AllocationId(0)));
        assert_eq!(arena[0].left, None);
        assert_eq!(arena[0].right, None);
    }

    #[test]
    fn splaying_on_a_present_key_brings_it_to_the_root() {
        // Build a simple right-leaning chain 10 -> 20 -> 30 -> 40 (insert order), then splay on 20.
        let mut arena = arena_of(&[(10, 0), (20, 0), (30, 0), (40, 0)]);
        arena[0].right = Some(AllocationId(1));
        arena[1].right = Some(AllocationId(2));
        arena[2].right = Some(AllocationId(3));

        let root = splay(&mut arena, Some(AllocationId(0)), 20).unwrap();
        assert_eq!(root, AllocationId(1));
        assert_eq!(arena[root.0].left, Some(AllocationId(0)));
        // everything greater than 20 hangs off the right
        assert_eq!(arena[root.0].right, Some(AllocationId(2)));
    }
}
