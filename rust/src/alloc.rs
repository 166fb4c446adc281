//! Block allocator handing out persisted references.
//!
//! Blocks live in a slab with a free list, the same layout the node arena
//! uses, but each slot holds raw bytes and a ref is the slot index plus one
//! so that `NULL_REF` (0) never names a block. `freeze` marks every live
//! block read-only; a later write to a frozen block relocates it instead of
//! touching the bytes an older version still points at.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::NodeHeader;
use crate::node::mark_reachable;
use crate::types::{Ref, NULL_REF};

/// Statistics for an allocator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocatorStats {
    pub total_slots: usize,
    pub live_blocks: usize,
    pub read_only_blocks: usize,
    pub free_slots: usize,
    pub utilization: f64,
}

#[derive(Debug, Default)]
struct Slab {
    storage: Vec<Vec<u8>>,
    allocated_mask: Vec<bool>,
    read_only_mask: Vec<bool>,
    free_list: Vec<usize>,
    live: usize,
    block_limit: Option<usize>,
}

impl Slab {
    fn index(&self, r: Ref) -> Option<usize> {
        if r == NULL_REF {
            return None;
        }
        let index = usize::try_from(r - 1).ok()?;
        if self.allocated_mask.get(index).copied().unwrap_or(false) {
            Some(index)
        } else {
            None
        }
    }

    fn checked_index(&self, r: Ref) -> BTreeResult<usize> {
        self.index(r)
            .ok_or_else(|| BPlusTreeError::invalid_ref(r, "not a live block"))
    }

    fn allocate(&mut self, bytes: Vec<u8>) -> BTreeResult<Ref> {
        if let Some(limit) = self.block_limit {
            if self.live >= limit {
                return Err(BPlusTreeError::allocation_error(
                    "block",
                    &format!("block limit {} reached", limit),
                ));
            }
        }
        let index = if let Some(free_index) = self.free_list.pop() {
            self.storage[free_index] = bytes;
            self.allocated_mask[free_index] = true;
            self.read_only_mask[free_index] = false;
            free_index
        } else {
            let index = self.storage.len();
            self.storage.push(bytes);
            self.allocated_mask.push(true);
            self.read_only_mask.push(false);
            index
        };
        self.live += 1;
        Ok(index as Ref + 1)
    }
}

/// Shared handle to a block store. Clones refer to the same blocks.
#[derive(Debug, Clone, Default)]
pub struct Allocator {
    inner: Rc<RefCell<Slab>>,
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator that refuses to hold more than `limit` live blocks.
    pub fn with_block_limit(limit: usize) -> Self {
        let alloc = Self::new();
        alloc.set_block_limit(Some(limit));
        alloc
    }

    pub fn set_block_limit(&self, limit: Option<usize>) {
        self.inner.borrow_mut().block_limit = limit;
    }

    /// Store `bytes` in a fresh writable block.
    pub fn alloc(&self, bytes: Vec<u8>) -> BTreeResult<Ref> {
        let r = self.inner.borrow_mut().allocate(bytes)?;
        trace!(target: "column_bptree::alloc", r, "allocated block");
        Ok(r)
    }

    /// Run `f` over the bytes of block `r`.
    pub fn read<R>(&self, r: Ref, f: impl FnOnce(&[u8]) -> R) -> BTreeResult<R> {
        let slab = self.inner.borrow();
        let index = slab.checked_index(r)?;
        Ok(f(&slab.storage[index]))
    }

    pub fn header(&self, r: Ref) -> BTreeResult<NodeHeader> {
        self.read(r, NodeHeader::parse)?
    }

    pub fn contains(&self, r: Ref) -> bool {
        self.inner.borrow().index(r).is_some()
    }

    pub fn is_read_only(&self, r: Ref) -> bool {
        let slab = self.inner.borrow();
        slab.index(r).map_or(false, |index| slab.read_only_mask[index])
    }

    /// Replace the contents of a writable block.
    pub fn overwrite(&self, r: Ref, bytes: Vec<u8>) -> BTreeResult<()> {
        let mut slab = self.inner.borrow_mut();
        let index = slab.checked_index(r)?;
        if slab.read_only_mask[index] {
            return Err(BPlusTreeError::invalid_ref(r, "block is read-only"));
        }
        slab.storage[index] = bytes;
        Ok(())
    }

    /// Write `bytes` as the new contents of `r`, relocating the block first
    /// if it is frozen. Returns the ref now holding the bytes.
    pub fn copy_on_write(&self, r: Ref, bytes: Vec<u8>) -> BTreeResult<Ref> {
        if !self.is_read_only(r) {
            self.overwrite(r, bytes)?;
            return Ok(r);
        }
        let new_ref = self.alloc(bytes)?;
        trace!(
            target: "column_bptree::alloc",
            from = r,
            to = new_ref,
            "relocated frozen block"
        );
        Ok(new_ref)
    }

    /// Release a block. Frozen blocks stay readable for older versions.
    pub fn free(&self, r: Ref) {
        let mut slab = self.inner.borrow_mut();
        let Some(index) = slab.index(r) else {
            return;
        };
        if slab.read_only_mask[index] {
            return;
        }
        slab.allocated_mask[index] = false;
        slab.storage[index] = Vec::new();
        slab.free_list.push(index);
        slab.live -= 1;
        trace!(target: "column_bptree::alloc", r, "freed block");
    }

    /// Make every live block read-only, closing the current version.
    /// `free` leaves frozen blocks in place; reclaim versions nobody reads
    /// any more with [`Allocator::release_unreachable`].
    pub fn freeze(&self) {
        let mut slab = self.inner.borrow_mut();
        let Slab {
            allocated_mask,
            read_only_mask,
            ..
        } = &mut *slab;
        for (read_only, &allocated) in read_only_mask.iter_mut().zip(allocated_mask.iter()) {
            *read_only |= allocated;
        }
        debug!(target: "column_bptree::alloc", live = slab.live, "froze allocator");
    }

    /// Free every block, frozen or not, that no tree in `roots` reaches, and
    /// return how many were freed. `roots` must name every version still in
    /// use; handles on versions left out must not be read afterwards. Nothing
    /// is freed if any root fails to decode.
    pub fn release_unreachable(&self, roots: &[Ref]) -> BTreeResult<usize> {
        let mut reachable = HashSet::new();
        for &root in roots {
            mark_reachable(self, root, &mut reachable)?;
        }
        let mut slab = self.inner.borrow_mut();
        let mut released = 0;
        for index in 0..slab.storage.len() {
            if !slab.allocated_mask[index] || reachable.contains(&(index as Ref + 1)) {
                continue;
            }
            slab.allocated_mask[index] = false;
            slab.read_only_mask[index] = false;
            slab.storage[index] = Vec::new();
            slab.free_list.push(index);
            slab.live -= 1;
            released += 1;
        }
        debug!(
            target: "column_bptree::alloc",
            released,
            live = slab.live,
            "released unreachable blocks"
        );
        Ok(released)
    }

    /// Fail unless `blocks` more allocations are guaranteed to succeed.
    pub fn check_headroom(&self, blocks: usize) -> BTreeResult<()> {
        let slab = self.inner.borrow();
        match slab.block_limit {
            Some(limit) if slab.live + blocks > limit => Err(BPlusTreeError::allocation_error(
                &format!("{} blocks", blocks),
                &format!("{} of {} blocks in use", slab.live, limit),
            )),
            _ => Ok(()),
        }
    }

    pub fn stats(&self) -> AllocatorStats {
        let slab = self.inner.borrow();
        let total_slots = slab.storage.len();
        let read_only_blocks = slab
            .read_only_mask
            .iter()
            .zip(slab.allocated_mask.iter())
            .filter(|(&read_only, &allocated)| read_only && allocated)
            .count();
        let utilization = if total_slots > 0 {
            slab.live as f64 / total_slots as f64
        } else {
            0.0
        };
        AllocatorStats {
            total_slots,
            live_blocks: slab.live,
            read_only_blocks,
            free_slots: slab.free_list.len(),
            utilization,
        }
    }

    /// Whether both handles share one block store.
    pub fn ptr_eq(&self, other: &Allocator) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_read_free_reuses_slots() {
        let alloc = Allocator::new();
        let a = alloc.alloc(vec![1, 2, 3]).unwrap();
        let b = alloc.alloc(vec![4]).unwrap();
        assert_ne!(a, NULL_REF);
        assert_eq!(alloc.read(a, |bytes| bytes.to_vec()).unwrap(), vec![1, 2, 3]);
        assert!(alloc.contains(b));

        alloc.free(a);
        assert!(!alloc.contains(a));
        assert!(alloc.read(a, |_| ()).is_err());

        let c = alloc.alloc(vec![9]).unwrap();
        assert_eq!(c, a);
        let stats = alloc.stats();
        assert_eq!(stats.live_blocks, 2);
        assert_eq!(stats.free_slots, 0);
    }

    #[test]
    fn frozen_blocks_relocate_on_write() {
        let alloc = Allocator::new();
        let r = alloc.alloc(vec![1]).unwrap();
        assert_eq!(alloc.copy_on_write(r, vec![2]).unwrap(), r);

        alloc.freeze();
        assert!(alloc.is_read_only(r));
        assert!(alloc.overwrite(r, vec![3]).is_err());

        let moved = alloc.copy_on_write(r, vec![3]).unwrap();
        assert_ne!(moved, r);
        assert_eq!(alloc.read(r, |bytes| bytes[0]).unwrap(), 2);
        assert_eq!(alloc.read(moved, |bytes| bytes[0]).unwrap(), 3);

        alloc.free(r);
        assert!(alloc.contains(r));
        assert_eq!(alloc.stats().read_only_blocks, 1);
    }

    fn leaf_block(alloc: &Allocator, value: u8) -> Ref {
        let mut bytes = Vec::new();
        NodeHeader::leaf(crate::header::Encoding::Integer, 1, 1).write_to(&mut bytes);
        bytes.push(value);
        alloc.alloc(bytes).unwrap()
    }

    #[test]
    fn release_unreachable_frees_frozen_blocks() {
        let alloc = Allocator::new();
        let kept = leaf_block(&alloc, 1);
        let old = leaf_block(&alloc, 2);
        alloc.freeze();
        let fresh = leaf_block(&alloc, 3);

        assert_eq!(alloc.release_unreachable(&[kept, old, fresh]).unwrap(), 0);
        assert_eq!(alloc.release_unreachable(&[kept, fresh]).unwrap(), 1);
        assert!(!alloc.contains(old));
        assert!(alloc.is_read_only(kept));
        assert_eq!(alloc.stats().live_blocks, 2);
        assert_eq!(alloc.stats().free_slots, 1);

        let reused = leaf_block(&alloc, 4);
        assert_eq!(reused, old);
        assert!(!alloc.is_read_only(reused));
    }

    #[test]
    fn release_unreachable_keeps_everything_on_bad_root() {
        let alloc = Allocator::new();
        let block = leaf_block(&alloc, 1);
        let garbage = alloc.alloc(vec![0xff; 3]).unwrap();
        alloc.freeze();
        assert!(alloc.release_unreachable(&[block, garbage]).is_err());
        assert!(alloc.release_unreachable(&[block, 999]).is_err());
        assert_eq!(alloc.stats().live_blocks, 2);
        assert_eq!(alloc.release_unreachable(&[]).unwrap(), 2);
        assert_eq!(alloc.stats().live_blocks, 0);
    }

    #[test]
    fn block_limit_is_enforced() {
        let alloc = Allocator::with_block_limit(2);
        alloc.alloc(vec![]).unwrap();
        assert!(alloc.check_headroom(1).is_ok());
        assert!(alloc.check_headroom(2).unwrap_err().is_allocation_error());
        alloc.alloc(vec![]).unwrap();
        assert!(alloc.alloc(vec![]).unwrap_err().is_allocation_error());

        alloc.set_block_limit(None);
        assert!(alloc.alloc(vec![]).is_ok());
    }

    #[test]
    fn clones_share_blocks() {
        let alloc = Allocator::new();
        let other = alloc.clone();
        let r = other.alloc(vec![7]).unwrap();
        assert!(alloc.contains(r));
        assert!(alloc.ptr_eq(&other));
        assert!(!alloc.ptr_eq(&Allocator::new()));
    }
}
