//! Core types and data structures for column trees.
//!
//! This module contains the reference type, the sentinel constants, the split
//! state passed between tree levels, and the two tree containers.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

use crate::alloc::Allocator;
use crate::cache::LeafCache;
use crate::config::TreeConfig;
use crate::leaf_array::{ColumnType, LeafArray};
use crate::node::Node;
use crate::parent::ParentLink;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Persisted reference to a block handed out by an [`Allocator`].
pub type Ref = u64;

/// The reference that names no block.
pub const NULL_REF: Ref = 0;

/// Insert position meaning "append at the end".
pub const NPOS: usize = usize::MAX;

/// Returned by searches that find nothing.
pub const NOT_FOUND: usize = usize::MAX;

/// Smallest accepted `max_node_size`.
pub const MIN_NODE_SIZE: usize = 4;

/// Largest accepted `max_node_size`, and the largest element count a node
/// block may declare in its header.
pub const MAX_NODE_SIZE: usize = 1 << 20;

/// Node capacity used when no configuration is given.
pub const DEFAULT_MAX_NODE_SIZE: usize = 1000;

// ============================================================================
// SPLIT STATE
// ============================================================================

/// Reported upward by a node that split during an insert.
///
/// `split_offset` is the number of elements that stayed in the original node
/// and `split_size` the number of elements in the original and the new
/// sibling together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct State {
    pub split_offset: usize,
    pub split_size: usize,
}

// ============================================================================
// OBJECT KEYS
// ============================================================================

/// Key of an object in a table. `-1` is the null key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjKey(pub i64);

impl ObjKey {
    pub const NULL: ObjKey = ObjKey(-1);

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl Default for ObjKey {
    fn default() -> Self {
        Self::NULL
    }
}

// ============================================================================
// TREES
// ============================================================================

/// Element-type independent half of a column tree.
///
/// Owns the root node, the element count, the link to the parent slot that
/// stores the root ref, and the single-leaf access cache. All structural
/// algorithms live here; [`BPlusTree`] adds the value-typed API on top.
#[derive(Debug)]
pub struct BPlusTreeBase<L: LeafArray> {
    pub(crate) alloc: Allocator,
    pub(crate) config: TreeConfig,
    pub(crate) root: Option<Node<L>>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) size: usize,
    pub(crate) cache: RefCell<LeafCache<L>>,
}

/// A column of `T` values stored in a copy-on-write B+ tree.
///
/// # Examples
///
/// ```
/// use column_bptree::{Allocator, IntColumn, NOT_FOUND};
///
/// let mut column = IntColumn::new(Allocator::new());
/// column.create().unwrap();
/// column.add(1).unwrap();
/// column.add(2).unwrap();
/// column.add(3).unwrap();
/// column.insert(1, 99).unwrap();
/// assert_eq!(column.get_all().unwrap(), vec![1, 99, 2, 3]);
///
/// column.erase(0).unwrap();
/// assert_eq!(column.find_first(&2).unwrap(), 1);
/// assert_eq!(column.find_first(&42).unwrap(), NOT_FOUND);
/// ```
#[derive(Debug)]
pub struct BPlusTree<T: ColumnType> {
    pub(crate) base: BPlusTreeBase<T::Leaf>,
}

impl<T: ColumnType> Deref for BPlusTree<T> {
    type Target = BPlusTreeBase<T::Leaf>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<T: ColumnType> DerefMut for BPlusTree<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_key() {
        assert!(ObjKey::NULL.is_null());
        assert!(ObjKey::default().is_null());
        assert!(!ObjKey(0).is_null());
        assert_eq!(ObjKey(5).value(), 5);
    }
}
