//! Validation utilities for column trees.
//!
//! These walk the persisted blocks rather than the in-memory root, so they
//! catch a root or cache that has drifted from what is stored.

use crate::alloc::Allocator;
use crate::error::{BPlusTreeError, BTreeResult};
use crate::inner::InnerNode;
use crate::leaf::LeafNode;
use crate::leaf_array::LeafArray;
use crate::node::Node;
use crate::types::{BPlusTreeBase, Ref};

/// Size and height of a checked subtree.
struct SubtreeShape {
    size: usize,
    depth: usize,
}

// ============================================================================
// VALIDATION METHODS
// ============================================================================

impl<L: LeafArray> BPlusTreeBase<L> {
    /// Check if the tree maintains its structural invariants.
    pub fn check_invariants(&self) -> bool {
        self.verify().is_ok()
    }

    /// Check every invariant and report the first violation.
    ///
    /// An unattached tree is valid when it reports no elements.
    pub fn verify(&self) -> BTreeResult<()> {
        let Some(root) = &self.root else {
            if self.size != 0 {
                return Err(BPlusTreeError::invalid_state(
                    "verify",
                    &format!("unattached tree reports {} elements", self.size),
                ));
            }
            return Ok(());
        };

        let root_ref = root.get_ref();
        if let Some(parent) = &self.parent {
            let published = parent.child_ref();
            if published != root_ref {
                return Err(BPlusTreeError::invalid_state(
                    "verify",
                    &format!("parent slot holds {} but root is {}", published, root_ref),
                ));
            }
        }

        let shape = self.verify_node(root_ref, true)?;
        if shape.size != self.size {
            return Err(BPlusTreeError::data_integrity(
                "size",
                &format!("tree holds {} elements, size is {}", shape.size, self.size),
            ));
        }
        self.verify_root_copy(root)?;
        self.verify_cache()
    }

    /// Check the subtree at `r` and return its size and height.
    fn verify_node(&self, r: Ref, is_root: bool) -> BTreeResult<SubtreeShape> {
        let max = self.config.max_node_size;
        match Node::<L>::init_from_ref(&self.alloc, r)? {
            Node::Leaf(leaf) => {
                if leaf.size() > max {
                    return Err(BPlusTreeError::corrupted_tree(
                        "leaf",
                        &format!("ref {} holds {} elements, max is {}", r, leaf.size(), max),
                    ));
                }
                if !is_root && leaf.size() == 0 {
                    return Err(BPlusTreeError::corrupted_tree(
                        "leaf",
                        &format!("non-root leaf {} is empty", r),
                    ));
                }
                Ok(SubtreeShape {
                    size: leaf.size(),
                    depth: 1,
                })
            }
            Node::Inner(inner) => self.verify_inner(&inner, is_root),
        }
    }

    fn verify_inner(&self, inner: &InnerNode, is_root: bool) -> BTreeResult<SubtreeShape> {
        let r = inner.get_ref();
        let max = self.config.max_node_size;
        let count = inner.node_size();
        let min_children = if is_root { 2 } else { 1 };
        if count < min_children || count > max {
            return Err(BPlusTreeError::corrupted_tree(
                "inner node",
                &format!("ref {} has {} children", r, count),
            ));
        }

        let mut size = 0;
        let mut depth = None;
        for (ndx, &child) in inner.children().iter().enumerate() {
            let shape = self.verify_node(child, false)?;
            size += shape.size;
            if inner.child_start(ndx) + shape.size != size || inner.child_size(ndx) != shape.size {
                return Err(BPlusTreeError::data_integrity(
                    "inner offsets",
                    &format!(
                        "ref {} child {} holds {} elements, offsets say {}",
                        r,
                        ndx,
                        shape.size,
                        inner.child_size(ndx)
                    ),
                ));
            }
            match depth {
                None => depth = Some(shape.depth),
                Some(d) if d != shape.depth => {
                    return Err(BPlusTreeError::corrupted_tree(
                        "inner node",
                        &format!("ref {} has leaves at depths {} and {}", r, d, shape.depth),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(SubtreeShape {
            size,
            depth: depth.unwrap_or(0) + 1,
        })
    }

    /// The decoded root must match its block.
    fn verify_root_copy(&self, root: &Node<L>) -> BTreeResult<()> {
        let r = root.get_ref();
        let stored = Node::<L>::init_from_ref(&self.alloc, r)?;
        let matches = match (root, &stored) {
            (Node::Leaf(live), Node::Leaf(stored)) => same_values(live, stored),
            (Node::Inner(live), Node::Inner(stored)) => {
                live.children() == stored.children() && live.tree_size() == stored.tree_size()
            }
            _ => false,
        };
        if !matches {
            return Err(BPlusTreeError::invalid_state(
                "verify",
                &format!("decoded root differs from block {}", r),
            ));
        }
        Ok(())
    }

    /// A cached leaf must match its block and sit where its bounds say.
    fn verify_cache(&self) -> BTreeResult<()> {
        let cache = self.cache.borrow();
        let (Some(cached), Some((begin, end))) = (cache.leaf(), cache.bounds()) else {
            return Ok(());
        };
        let r = cached.get_ref();
        let stored = LeafNode::<L>::init_from_ref(&self.alloc, r)?;
        if !same_values(cached, &stored) {
            return Err(BPlusTreeError::invalid_state(
                "verify",
                &format!("cached copy of leaf {} differs from its block", r),
            ));
        }
        if end != begin + cached.size() || end > self.size {
            return Err(BPlusTreeError::invalid_state(
                "verify",
                &format!("cache bounds {}..{} do not fit leaf {}", begin, end, r),
            ));
        }
        let (owner, owner_begin) = leaf_at(&self.alloc, self.get_ref(), begin)?;
        if owner != r || owner_begin != begin {
            return Err(BPlusTreeError::invalid_state(
                "verify",
                &format!(
                    "element {} lives in leaf {} at {}, cache has leaf {}",
                    begin, owner, owner_begin, r
                ),
            ));
        }
        Ok(())
    }
}

fn same_values<L: LeafArray>(a: &LeafNode<L>, b: &LeafNode<L>) -> bool {
    a.size() == b.size() && (0..a.size()).all(|ndx| a.get(ndx) == b.get(ndx))
}

/// Ref of the leaf holding element `n` below `r`, and the global index of
/// that leaf's first element.
fn leaf_at(alloc: &Allocator, r: Ref, n: usize) -> BTreeResult<(Ref, usize)> {
    let mut r = r;
    let mut begin = 0;
    while alloc.header(r)?.is_inner {
        let inner = InnerNode::init_from_ref(alloc, r)?;
        let local = n - begin;
        let ndx = (0..inner.node_size())
            .find(|&ndx| local < inner.child_start(ndx) + inner.child_size(ndx))
            .ok_or_else(|| {
                BPlusTreeError::corrupted_tree(
                    "inner node",
                    &format!("ref {} has no child holding element {}", r, n),
                )
            })?;
        begin += inner.child_start(ndx);
        r = inner.child_ref(ndx);
    }
    Ok((r, begin))
}
