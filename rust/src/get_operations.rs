//! Element access and search for column trees.

use tracing::trace;

use crate::error::BTreeResult;
use crate::leaf::LeafNode;
use crate::leaf_array::{ColumnType, LeafArray};
use crate::node::{Node, TreeContext};
use crate::types::{BPlusTree, BPlusTreeBase, NOT_FOUND};

impl<L: LeafArray> BPlusTreeBase<L> {
    /// Run `func` on the leaf holding element `n` and the local index.
    /// A hit in the leaf cache skips the descent; a miss refreshes it.
    pub(crate) fn bptree_read<F, R>(&self, n: usize, func: F) -> BTreeResult<R>
    where
        F: FnOnce(&LeafNode<L>, usize) -> R,
    {
        let root = self.root_node();
        assert!(
            n < self.size,
            "index {} out of range (size {})",
            n,
            self.size
        );
        if let Node::Leaf(leaf) = root {
            return Ok(func(leaf, n));
        }
        let mut cache = self.cache.borrow_mut();
        if let Some((leaf, ndx)) = cache.lookup(n) {
            return Ok(func(leaf, ndx));
        }
        let mut ctx = TreeContext::new(&self.alloc, self.config.max_node_size, &mut *cache);
        root.bptree_read(&mut ctx, n, func)
    }

    /// Run `func` on the leaf holding element `n` so it can change it in
    /// place. The node count does not change.
    pub(crate) fn bptree_access<F>(&mut self, n: usize, func: F) -> BTreeResult<()>
    where
        F: FnOnce(&mut LeafNode<L>, usize),
    {
        assert!(
            n < self.size,
            "index {} out of range (size {})",
            n,
            self.size
        );
        let depth = self.depth()?;
        self.alloc.check_headroom(depth)?;

        let Some(root) = self.root.as_mut() else {
            panic!("access to an unattached column tree");
        };
        let old_ref = root.get_ref();
        let mut ctx = TreeContext::new(&self.alloc, self.config.max_node_size, self.cache.get_mut());
        root.bptree_access(&mut ctx, n, func)?;
        if root.get_ref() != old_ref {
            trace!(
                target: "column_bptree::root",
                from = old_ref,
                to = root.get_ref(),
                "root relocated"
            );
            root.update_parent();
        }
        Ok(())
    }
}

impl<T: ColumnType> BPlusTree<T> {
    /// Value used to fill new slots of this column type.
    pub fn default_value() -> T {
        <T::Leaf as LeafArray>::default_value()
    }

    /// Element `n`.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached or `n >= size()`.
    pub fn get(&self, n: usize) -> BTreeResult<T> {
        self.base.bptree_read(n, |leaf, ndx| leaf.get(ndx))
    }

    /// Overwrite element `n`.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached or `n >= size()`.
    pub fn set(&mut self, n: usize, value: T) -> BTreeResult<()> {
        self.base
            .bptree_access(n, move |leaf, ndx| leaf.array_mut().set(ndx, value))
    }

    /// Index of the first element equal to `value`, or `NOT_FOUND`.
    pub fn find_first(&self, value: &T) -> BTreeResult<usize> {
        let mut found = NOT_FOUND;
        self.base.traverse(|leaf, offset| {
            let ndx = leaf.find_first(value);
            if ndx != NOT_FOUND {
                found = offset + ndx;
                return true;
            }
            false
        })?;
        Ok(found)
    }

    /// Indices of every element equal to `value`, in order.
    pub fn find_all(&self, value: &T) -> BTreeResult<Vec<usize>> {
        let mut found = Vec::new();
        self.base.traverse(|leaf, offset| {
            let array = leaf.array();
            let mut begin = 0;
            loop {
                let ndx = array.find_first(value, begin, array.size());
                if ndx == NOT_FOUND {
                    break;
                }
                found.push(offset + ndx);
                begin = ndx + 1;
            }
            false
        })?;
        Ok(found)
    }

    /// Every element in order.
    pub fn get_all(&self) -> BTreeResult<Vec<T>> {
        let mut all = Vec::with_capacity(self.size);
        self.base.traverse(|leaf, _| {
            all.extend((0..leaf.size()).map(|ndx| leaf.get(ndx)));
            false
        })?;
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use crate::alloc::Allocator;
    use crate::config::TreeConfig;
    use crate::leaf_array::{IntColumn, StringColumn};
    use crate::types::NOT_FOUND;

    fn column_of(values: &[i64], cache: bool) -> IntColumn {
        let config = TreeConfig::new(4).with_leaf_cache(cache);
        let mut column = IntColumn::with_config(Allocator::new(), config).unwrap();
        column.create().unwrap();
        for &v in values {
            column.add(v).unwrap();
        }
        column
    }

    #[test]
    fn get_fills_and_hits_the_cache() {
        let values: Vec<i64> = (0..30).map(|v| v * 3).collect();
        let column = column_of(&values, true);
        column.invalidate_leaf_cache();
        assert!(column.cache.borrow().bounds().is_none());

        assert_eq!(column.get(13).unwrap(), 39);
        let (begin, end) = column.cache.borrow().bounds().unwrap();
        assert!(begin <= 13 && 13 < end);
        for n in begin..end {
            assert_eq!(column.get(n).unwrap(), values[n]);
        }
        column.verify().unwrap();
    }

    #[test]
    fn get_without_cache() {
        let values: Vec<i64> = (0..30).collect();
        let column = column_of(&values, false);
        for (n, &v) in values.iter().enumerate() {
            assert_eq!(column.get(n).unwrap(), v);
        }
        assert!(column.cache.borrow().bounds().is_none());
    }

    #[test]
    fn set_keeps_cache_coherent() {
        let mut column = column_of(&(0..30).collect::<Vec<_>>(), true);
        column.get(20).unwrap();
        column.set(20, -1).unwrap();
        assert_eq!(column.get(20).unwrap(), -1);
        column.set(3, -2).unwrap();
        assert_eq!(column.get(20).unwrap(), -1);
        assert_eq!(column.get(3).unwrap(), -2);
        column.verify().unwrap();
    }

    #[test]
    fn find_first_and_all() {
        let column = column_of(&[5, 1, 5, 2, 9, 5, 1, 5, 0, 5], true);
        assert_eq!(column.find_first(&5).unwrap(), 0);
        assert_eq!(column.find_first(&9).unwrap(), 4);
        assert_eq!(column.find_first(&42).unwrap(), NOT_FOUND);
        assert_eq!(column.find_all(&5).unwrap(), vec![0, 2, 5, 7, 9]);
        assert!(column.find_all(&42).unwrap().is_empty());
    }

    #[test]
    fn default_values() {
        assert_eq!(IntColumn::default_value(), 0);
        assert_eq!(StringColumn::default_value(), "");
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_past_end_panics() {
        let column = column_of(&[1, 2], true);
        let _ = column.get(2);
    }
}
