//! Single-leaf access cache.
//!
//! Holds a decoded copy of the most recently touched non-root leaf together
//! with the global index range it covers. The copy always matches the block
//! at its ref; anything that could break that invalidates the cache.

use crate::leaf::LeafNode;
use crate::leaf_array::LeafArray;
use crate::types::Ref;

const EMPTY: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct LeafCache<L: LeafArray> {
    enabled: bool,
    begin: usize,
    end: usize,
    leaf: Option<LeafNode<L>>,
}

impl<L: LeafArray> LeafCache<L> {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            begin: EMPTY,
            end: EMPTY,
            leaf: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn invalidate(&mut self) {
        self.begin = EMPTY;
        self.end = EMPTY;
        self.leaf = None;
    }

    /// Cached `[begin, end)` range, if any.
    pub fn bounds(&self) -> Option<(usize, usize)> {
        self.leaf.as_ref().map(|_| (self.begin, self.end))
    }

    /// The cached leaf and the local index of global element `n`.
    pub fn lookup(&self, n: usize) -> Option<(&LeafNode<L>, usize)> {
        let leaf = self.leaf.as_ref()?;
        if self.begin <= n && n < self.end {
            Some((leaf, n - self.begin))
        } else {
            None
        }
    }

    pub fn leaf(&self) -> Option<&LeafNode<L>> {
        self.leaf.as_ref()
    }

    /// Remove and return the cached leaf if it lives at `r`.
    pub fn take(&mut self, r: Ref) -> Option<LeafNode<L>> {
        if !self.leaf.as_ref().is_some_and(|leaf| leaf.get_ref() == r) {
            return None;
        }
        let leaf = self.leaf.take();
        self.invalidate();
        leaf
    }

    /// Cache `leaf` as covering the elements starting at global index `begin`.
    pub fn store(&mut self, leaf: LeafNode<L>, begin: usize) {
        if !self.enabled || leaf.size() == 0 {
            self.invalidate();
            return;
        }
        self.begin = begin;
        self.end = begin + leaf.size();
        self.leaf = Some(leaf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf_array::ArrayInteger;

    fn leaf_of(values: &[i64], r: Ref) -> LeafNode<ArrayInteger> {
        let mut leaf = LeafNode::detached(ArrayInteger::new());
        for &v in values {
            leaf.array_mut().add(v);
        }
        leaf.set_ref(r);
        leaf
    }

    #[test]
    fn lookup_uses_bounds() {
        let mut cache = LeafCache::new(true);
        assert!(cache.lookup(0).is_none());
        cache.store(leaf_of(&[10, 11, 12], 5), 20);
        assert_eq!(cache.bounds(), Some((20, 23)));
        let (leaf, ndx) = cache.lookup(22).unwrap();
        assert_eq!(leaf.get(ndx), 12);
        assert!(cache.lookup(23).is_none());
        assert!(cache.lookup(19).is_none());
    }

    #[test]
    fn take_only_matching_ref() {
        let mut cache = LeafCache::new(true);
        cache.store(leaf_of(&[1], 5), 0);
        assert!(cache.take(6).is_none());
        assert!(cache.bounds().is_some());
        assert_eq!(cache.take(5).unwrap().get(0), 1);
        assert!(cache.bounds().is_none());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let mut cache = LeafCache::new(false);
        cache.store(leaf_of(&[1, 2], 5), 0);
        assert!(cache.lookup(0).is_none());
        assert!(!cache.is_enabled());
    }
}
