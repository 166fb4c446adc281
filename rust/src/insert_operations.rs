//! Insert operations for column trees.
//!
//! An insert descends to the leaf owning the position, inserts there and
//! unwinds any splits. A split that reaches the root grows the tree by one
//! level.

use tracing::trace;

use crate::error::BTreeResult;
use crate::inner::InnerNode;
use crate::leaf::LeafNode;
use crate::leaf_array::{ColumnType, LeafArray};
use crate::node::{Node, TreeContext};
use crate::types::{BPlusTree, BPlusTreeBase, State, NPOS};

impl<L: LeafArray> BPlusTreeBase<L> {
    /// Run `func` on the leaf that should receive a new element before
    /// global position `n` (`NPOS` or `size()` to append). `func` gets the
    /// leaf and the local position and returns the new leaf size.
    ///
    /// Enough blocks for every copy and split on the path are reserved
    /// before any node is touched, so a failed insert leaves the tree as it
    /// was.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached or `n > size()`.
    pub(crate) fn bptree_insert<F>(&mut self, n: usize, func: F) -> BTreeResult<()>
    where
        F: FnOnce(&mut LeafNode<L>, usize) -> usize,
    {
        assert!(
            n == NPOS || n <= self.size,
            "insert position {} out of range (size {})",
            n,
            self.size
        );
        let n = if n == self.size { NPOS } else { n };
        let depth = self.depth()?;
        self.alloc.check_headroom(2 * depth + 1)?;

        let Some(root) = self.root.as_mut() else {
            panic!("insert into an unattached column tree");
        };
        let old_ref = root.get_ref();
        let mut state = State::default();
        let mut ctx = TreeContext::new(&self.alloc, self.config.max_node_size, self.cache.get_mut());
        let sibling = root.bptree_insert(&mut ctx, n, &mut state, func)?;
        self.size += 1;

        match sibling {
            Some(sibling_ref) => {
                root.set_parent(None);
                let new_root = InnerNode::new_root(
                    &self.alloc,
                    root.get_ref(),
                    state.split_offset,
                    sibling_ref,
                    state.split_size,
                )?;
                trace!(
                    target: "column_bptree::root",
                    left = root.get_ref(),
                    right = sibling_ref,
                    depth = depth + 1,
                    "grew root"
                );
                self.replace_root(Node::Inner(new_root));
            }
            None if root.get_ref() != old_ref => root.update_parent(),
            None => {}
        }
        Ok(())
    }
}

impl<T: ColumnType> BPlusTree<T> {
    /// Append `value`.
    pub fn add(&mut self, value: T) -> BTreeResult<()> {
        self.insert(NPOS, value)
    }

    /// Insert `value` before position `n`; `n == size()` or `NPOS` appends.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached or `n > size()`.
    pub fn insert(&mut self, n: usize, value: T) -> BTreeResult<()> {
        self.base.bptree_insert(n, move |leaf, ndx| {
            leaf.array_mut().insert(ndx, value);
            leaf.size()
        })
    }
}
