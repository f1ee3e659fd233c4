//! Master share-tree construction and per-successor projection.
//!
//! Grounded on `original_source/secrets/secrets.go`'s `buildSeedTree` and
//! `successorTree`. The master tree is an internal construction detail of
//! generation only — it is never transported — which is why it uses its own
//! [`MasterNode`] representation instead of the transport [`Node`] type: a
//! master-tree node keeps its own bucket bytes even after it has been further
//! subdivided, a quirk [`project`] depends on (see the module-level comment
//! in `node.rs` and DESIGN.md).

use std::collections::BTreeMap;

use crate::node::Node;

/// A node of the master tree. Unlike [`Node`], `data` and `children` are not
/// mutually exclusive: a node that gets subdivided keeps the bucket bytes it
/// was dealt, even though a `children` map is also attached.
#[derive(Debug, Clone)]
pub struct MasterNode {
    pub data: Vec<u8>,
    pub children: Option<BTreeMap<usize, MasterNode>>,
}

impl MasterNode {
    fn leaf(data: Vec<u8>) -> Self {
        MasterNode {
            data,
            children: None,
        }
    }
}

/// Deals `data` round-robin into `num_buckets` buckets: byte at position `p`
/// goes to bucket `p % num_buckets`. This interleaving (rather than
/// contiguous slicing) spreads adjacent seed bytes across different
/// successors.
pub fn deal(data: &[u8], num_buckets: usize) -> Vec<Vec<u8>> {
    let mut buckets = vec![Vec::new(); num_buckets];
    for (i, &byte) in data.iter().enumerate() {
        buckets[i % num_buckets].push(byte);
    }
    buckets
}

/// Builds the master share tree from the full seed.
///
/// `n` is the successor count, `k` the quorum threshold. Recursion stops
/// deepening a branch once fewer than `k` unused successor slots remain
/// along that path, or once the bucket dealt to the next slot would be
/// empty (the "partial internal node" edge case of §4.1).
pub fn build_master(seed: &[u8], n: usize, k: usize) -> MasterNode {
    let mut root = MasterNode::leaf(seed.to_vec());
    build(&mut root, n, k, &mut vec![false; n]);
    root
}

fn build(node: &mut MasterNode, n: usize, k: usize, excluded: &mut [bool]) {
    let num_buckets = n - excluded.iter().filter(|&&e| e).count();
    if num_buckets < k {
        return;
    }
    let buckets = deal(&node.data, num_buckets);
    let mut children = BTreeMap::new();
    let mut bucket_idx = 0;
    for i in 0..n {
        if excluded[i] {
            continue;
        }
        if buckets[bucket_idx].is_empty() {
            break;
        }
        excluded[i] = true;
        let mut child = MasterNode::leaf(buckets[bucket_idx].clone());
        build(&mut child, n, k, excluded);
        children.insert(i, child);
        bucket_idx += 1;
        excluded[i] = false;
    }
    node.children = Some(children);
}

/// Projects the subtree successor `i` is entitled to hold out of the master
/// tree. See the module doc and DESIGN.md for why the successor's own branch
/// always yields a proper leaf, never a hole, even when it was further split
/// below to serve other successors.
pub fn project(master: &MasterNode, i: usize) -> Node {
    match &master.children {
        None => Node::Empty,
        Some(children) => {
            let mut sub = BTreeMap::new();
            for (&j, child) in children {
                if j == i {
                    sub.insert(j, Node::Leaf(child.data.clone()));
                } else {
                    let projected = project(child, i);
                    if matches!(projected, Node::Internal(_)) {
                        sub.insert(j, projected);
                    }
                }
            }
            Node::Internal(sub)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_is_round_robin() {
        let buckets = deal(b"abcdef", 3);
        assert_eq!(buckets, vec![b"ad".to_vec(), b"be".to_vec(), b"cf".to_vec()]);
    }

    #[test]
    fn deal_into_more_buckets_than_bytes_leaves_some_empty() {
        let buckets = deal(b"ab", 5);
        assert_eq!(
            buckets,
            vec![
                vec![b'a'],
                vec![b'b'],
                Vec::new(),
                Vec::new(),
                Vec::new()
            ]
        );
    }

    #[test]
    fn unanimous_quorum_gives_every_successor_a_direct_leaf() {
        // n = k: num_buckets never drops below k until the very first split,
        // so every successor's own branch is a leaf of the root-level deal.
        let seed = b"0123456789AB".to_vec();
        let master = build_master(&seed, 3, 3);
        for i in 0..3 {
            let projected = project(&master, i);
            match projected {
                Node::Internal(children) => {
                    assert_eq!(children.len(), 1);
                    assert!(matches!(children.get(&i), Some(Node::Leaf(_))));
                }
                other => panic!("expected internal node, got {other:?}"),
            }
        }
    }

    #[test]
    fn threshold_below_n_produces_deeper_trees() {
        let seed: Vec<u8> = (0u8..60).collect();
        let master = build_master(&seed, 3, 2);
        // Root splits into 3 buckets (one per successor); each of those
        // splits again into 2 (n - 1 >= k still holds), bottoming out once
        // num_buckets would drop below k = 2.
        let children = master.children.as_ref().unwrap();
        assert_eq!(children.len(), 3);
        for child in children.values() {
            // num_buckets at depth 1 is n - 1 = 2, still >= k, so depth-1
            // nodes are further split.
            assert!(child.children.is_some());
        }
    }
}
