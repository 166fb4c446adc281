//! Tree structure queries for column trees.
//!
//! Size queries, node counting and shape inspection. Everything here reads
//! the persisted blocks, so the answers hold for what another tree attached
//! to the same root ref would see.

use crate::error::BTreeResult;
use crate::leaf_array::LeafArray;
use crate::node::{count_nodes, subtree_depth, Node};
use crate::types::BPlusTreeBase;

// ============================================================================
// TREE STRUCTURE OPERATIONS
// ============================================================================

impl<L: LeafArray> BPlusTreeBase<L> {
    /// Returns the number of elements in the tree.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true if the tree holds no elements.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns true if the root is a leaf node.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached.
    pub fn is_leaf_root(&self) -> bool {
        self.root_node().is_leaf()
    }

    /// Number of levels, 1 for a leaf root and 0 when unattached.
    pub fn depth(&self) -> BTreeResult<usize> {
        match &self.root {
            None => Ok(0),
            Some(Node::Leaf(_)) => Ok(1),
            Some(Node::Inner(inner)) => Ok(1 + subtree_depth(&self.alloc, inner.child_ref(0))?),
        }
    }

    /// Returns the number of leaf nodes in the tree.
    pub fn leaf_count(&self) -> BTreeResult<usize> {
        Ok(self.node_counts()?.0)
    }

    /// Count the leaf and inner nodes in the tree.
    pub fn node_counts(&self) -> BTreeResult<(usize, usize)> {
        match &self.root {
            None => Ok((0, 0)),
            Some(root) => count_nodes(&self.alloc, root.get_ref()),
        }
    }

    /// Element count of every leaf, left to right.
    pub fn leaf_sizes(&self) -> BTreeResult<Vec<usize>> {
        let mut sizes = Vec::new();
        self.traverse(|leaf, _| {
            sizes.push(leaf.size());
            false
        })?;
        Ok(sizes)
    }
}

#[cfg(test)]
mod tests {
    use crate::alloc::Allocator;
    use crate::config::TreeConfig;
    use crate::leaf_array::IntColumn;

    #[test]
    fn shape_of_growing_tree() {
        let mut column = IntColumn::with_config(Allocator::new(), TreeConfig::new(4)).unwrap();
        assert_eq!(column.depth().unwrap(), 0);
        assert_eq!(column.node_counts().unwrap(), (0, 0));

        column.create().unwrap();
        assert!(column.is_empty());
        assert_eq!(column.depth().unwrap(), 1);
        assert_eq!(column.leaf_count().unwrap(), 1);

        for v in 0..17 {
            column.add(v).unwrap();
        }
        assert_eq!(column.size(), 17);
        assert_eq!(column.leaf_sizes().unwrap(), vec![4, 4, 4, 4, 1]);
        assert_eq!(column.node_counts().unwrap(), (5, 3));
        assert_eq!(column.depth().unwrap(), 3);
        assert_eq!(column.allocator().stats().live_blocks, 8);
    }
}
