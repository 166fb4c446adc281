//! Leaf traversal and value iteration.

use std::fmt::Write as _;

use crate::error::BTreeResult;
use crate::leaf::LeafNode;
use crate::leaf_array::{ColumnType, LeafArray};
use crate::types::{BPlusTree, BPlusTreeBase};

impl<L: LeafArray> BPlusTreeBase<L> {
    /// Call `func` with each leaf, left to right, and the global index of
    /// the leaf's first element. Returns `true` if `func` stopped the walk
    /// by returning `true`. An unattached tree has no leaves.
    pub fn traverse<F>(&self, mut func: F) -> BTreeResult<bool>
    where
        F: FnMut(&LeafNode<L>, usize) -> bool,
    {
        match &self.root {
            Some(root) => root.bptree_traverse(&self.alloc, 0, &mut func),
            None => Ok(false),
        }
    }

    /// One line per leaf: the offset of its first element and its values.
    pub fn dump_values(&self) -> BTreeResult<String> {
        let mut out = String::new();
        self.traverse(|leaf, offset| {
            let values: Vec<L::Value> = (0..leaf.size()).map(|ndx| leaf.get(ndx)).collect();
            let _ = writeln!(out, "{}: {:?}", offset, values);
            false
        })?;
        Ok(out)
    }

    /// The values of the leaf holding element `n`, and the global index of
    /// the first of them.
    pub(crate) fn leaf_values(&self, n: usize) -> BTreeResult<(usize, Vec<L::Value>)> {
        self.bptree_read(n, |leaf, ndx| {
            let values = (0..leaf.size()).map(|i| leaf.get(i)).collect();
            (n - ndx, values)
        })
    }
}

impl<T: ColumnType> BPlusTree<T> {
    /// Iterate the values in order, one leaf decode per leaf.
    pub fn iter(&self) -> Values<'_, T> {
        Values {
            tree: self,
            next: 0,
            buffer: Vec::new(),
            buffer_begin: 0,
            failed: false,
        }
    }
}

/// Iterator over a column's values. Yields an error and stops if a block
/// cannot be read.
pub struct Values<'a, T: ColumnType> {
    tree: &'a BPlusTree<T>,
    next: usize,
    buffer: Vec<T>,
    buffer_begin: usize,
    failed: bool,
}

impl<'a, T: ColumnType> Iterator for Values<'a, T> {
    type Item = BTreeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.tree.size || !self.tree.is_attached() {
            return None;
        }
        let in_buffer = self.next >= self.buffer_begin
            && self.next < self.buffer_begin + self.buffer.len();
        if !in_buffer {
            match self.tree.base.leaf_values(self.next) {
                Ok((begin, values)) => {
                    self.buffer_begin = begin;
                    self.buffer = values;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        let value = self.buffer[self.next - self.buffer_begin].clone();
        self.next += 1;
        Some(Ok(value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.tree.size.saturating_sub(self.next);
        (0, Some(remaining))
    }
}

impl<'a, T: ColumnType> IntoIterator for &'a BPlusTree<T> {
    type Item = BTreeResult<T>;
    type IntoIter = Values<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::alloc::Allocator;
    use crate::config::TreeConfig;
    use crate::leaf_array::{IntColumn, StringColumn};

    #[test]
    fn iter_matches_get_all() {
        let mut column = IntColumn::with_config(Allocator::new(), TreeConfig::new(4)).unwrap();
        column.create().unwrap();
        for v in 0..37 {
            let mid = column.size() / 2;
            column.insert(mid, v).unwrap();
        }
        let iterated: Vec<i64> = column.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(iterated, column.get_all().unwrap());
        assert_eq!((&column).into_iter().count(), 37);
    }

    #[test]
    fn iter_on_empty_and_unattached() {
        let column = IntColumn::new(Allocator::new());
        assert_eq!(column.iter().count(), 0);
        let mut column = IntColumn::new(Allocator::new());
        column.create().unwrap();
        assert_eq!(column.iter().count(), 0);
    }

    #[test]
    fn traverse_stops_early() {
        let mut column = IntColumn::with_config(Allocator::new(), TreeConfig::new(4)).unwrap();
        column.create().unwrap();
        for v in 0..12 {
            column.add(v).unwrap();
        }
        let mut visited = 0;
        let stopped = column
            .traverse(|_, offset| {
                visited += 1;
                offset >= 4
            })
            .unwrap();
        assert!(stopped);
        assert_eq!(visited, 2);
    }

    #[test]
    fn dump_values_lists_leaves() {
        let mut column = StringColumn::with_config(Allocator::new(), TreeConfig::new(4)).unwrap();
        column.create().unwrap();
        for s in ["a", "b", "c", "d", "e"] {
            column.add(s.to_string()).unwrap();
        }
        assert_eq!(
            column.dump_values().unwrap(),
            "0: [\"a\", \"b\", \"c\", \"d\"]\n4: [\"e\"]\n"
        );
    }
}
