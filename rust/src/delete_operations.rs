//! Erase and clear for column trees.

use tracing::trace;

use crate::error::BTreeResult;
use crate::leaf::LeafNode;
use crate::leaf_array::LeafArray;
use crate::node::{destroy_deep, Node, TreeContext};
use crate::types::BPlusTreeBase;

impl<L: LeafArray> BPlusTreeBase<L> {
    /// Run `func` on the leaf holding element `n`; it removes the element
    /// and returns the new leaf size. Underfull nodes are merged or refilled
    /// on the way back up, and an inner root left with a single child is
    /// replaced by that child.
    pub(crate) fn bptree_erase<F>(&mut self, n: usize, func: F) -> BTreeResult<()>
    where
        F: FnOnce(&mut LeafNode<L>, usize) -> usize,
    {
        assert!(
            n < self.size,
            "erase index {} out of range (size {})",
            n,
            self.size
        );
        let depth = self.depth()?;
        self.alloc.check_headroom(2 * depth)?;

        let Some(root) = self.root.as_mut() else {
            panic!("erase from an unattached column tree");
        };
        let old_ref = root.get_ref();
        let mut ctx = TreeContext::new(&self.alloc, self.config.max_node_size, self.cache.get_mut());
        root.bptree_erase(&mut ctx, n, func)?;
        self.size -= 1;

        let mut collapsed = false;
        loop {
            let (inner_ref, only_child) = match &*root {
                Node::Inner(inner) if inner.node_size() == 1 => (inner.get_ref(), inner.child_ref(0)),
                _ => break,
            };
            let child = Node::init_from_ref(&self.alloc, only_child)?;
            self.alloc.free(inner_ref);
            *root = child;
            collapsed = true;
            trace!(
                target: "column_bptree::root",
                freed = inner_ref,
                root = only_child,
                "collapsed root"
            );
        }

        if collapsed {
            self.publish_root();
        } else if root.get_ref() != old_ref {
            root.update_parent();
        }
        Ok(())
    }

    /// Remove element `n`.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached or `n >= size()`.
    pub fn erase(&mut self, n: usize) -> BTreeResult<()> {
        self.bptree_erase(n, |leaf, ndx| {
            leaf.array_mut().erase(ndx);
            leaf.size()
        })
    }

    /// Remove every element. A leaf root is truncated in place; a deeper
    /// tree is freed and replaced by a fresh empty leaf.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached.
    pub fn clear(&mut self) -> BTreeResult<()> {
        self.alloc.check_headroom(1)?;
        match self.root.as_mut() {
            None => panic!("clear on an unattached column tree"),
            Some(Node::Leaf(leaf)) => {
                let old_ref = leaf.get_ref();
                leaf.array_mut().truncate_and_destroy_children(0);
                leaf.write(&self.alloc)?;
                if leaf.get_ref() != old_ref {
                    leaf.update_parent();
                }
                self.cache.get_mut().invalidate();
            }
            Some(Node::Inner(inner)) => {
                let old_ref = inner.get_ref();
                destroy_deep(&self.alloc, old_ref)?;
                let leaf = LeafNode::create(&self.alloc)?;
                self.replace_root(Node::Leaf(leaf));
                trace!(target: "column_bptree::root", freed = old_ref, "cleared tree");
            }
        }
        self.size = 0;
        Ok(())
    }
}
