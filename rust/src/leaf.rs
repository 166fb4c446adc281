//! Leaf nodes: a persisted leaf array plus its ref.

use tracing::trace;

use crate::alloc::Allocator;
use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::{NodeHeader, HEADER_SIZE};
use crate::leaf_array::LeafArray;
use crate::node::TreeContext;
use crate::parent::ParentLink;
use crate::types::{Ref, State, NPOS, NULL_REF};

/// A leaf node. Reads go to the decoded array; every change is written back
/// to the block before the operation returns.
#[derive(Debug, Clone)]
pub struct LeafNode<L: LeafArray> {
    array: L,
    ref_: Ref,
    parent: Option<ParentLink>,
}

impl<L: LeafArray> LeafNode<L> {
    /// A leaf that has not been written to any block yet.
    pub(crate) fn detached(array: L) -> Self {
        Self {
            array,
            ref_: NULL_REF,
            parent: None,
        }
    }

    /// Allocate an empty leaf.
    pub fn create(alloc: &Allocator) -> BTreeResult<Self> {
        let mut leaf = Self::detached(L::new());
        leaf.write(alloc)?;
        Ok(leaf)
    }

    pub fn init_from_ref(alloc: &Allocator, r: Ref) -> BTreeResult<Self> {
        alloc.read(r, |bytes| {
            let header = NodeHeader::parse(bytes)?;
            Self::decode(r, &header, bytes)
        })?
    }

    pub(crate) fn decode(r: Ref, header: &NodeHeader, bytes: &[u8]) -> BTreeResult<Self> {
        if header.is_inner {
            return Err(BPlusTreeError::corrupted_tree(
                "leaf",
                &format!("ref {} holds an inner node", r),
            ));
        }
        if header.encoding != L::ENCODING {
            return Err(BPlusTreeError::corrupted_tree(
                "leaf",
                &format!(
                    "ref {} is encoded as {:?}, expected {:?}",
                    r,
                    header.encoding,
                    L::ENCODING
                ),
            ));
        }
        let array = L::decode(header.width, header.size, &bytes[HEADER_SIZE..])?;
        Ok(Self {
            array,
            ref_: r,
            parent: None,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        let width = self.array.encode(&mut payload);
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        NodeHeader::leaf(L::ENCODING, width, self.array.size()).write_to(&mut out);
        out.extend_from_slice(&payload);
        out
    }

    /// Persist the current contents, relocating the block if it is frozen.
    pub(crate) fn write(&mut self, alloc: &Allocator) -> BTreeResult<Ref> {
        let bytes = self.encode();
        self.ref_ = if self.ref_ == NULL_REF {
            alloc.alloc(bytes)?
        } else {
            alloc.copy_on_write(self.ref_, bytes)?
        };
        Ok(self.ref_)
    }

    pub fn get_ref(&self) -> Ref {
        self.ref_
    }

    #[cfg(test)]
    pub(crate) fn set_ref(&mut self, r: Ref) {
        self.ref_ = r;
    }

    pub fn size(&self) -> usize {
        self.array.size()
    }

    pub fn get(&self, ndx: usize) -> L::Value {
        self.array.get(ndx)
    }

    pub fn find_first(&self, value: &L::Value) -> usize {
        self.array.find_first(value, 0, self.array.size())
    }

    pub fn array(&self) -> &L {
        &self.array
    }

    pub(crate) fn array_mut(&mut self) -> &mut L {
        &mut self.array
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ParentLink>) {
        self.parent = parent;
    }

    pub(crate) fn update_parent(&self) {
        if let Some(parent) = &self.parent {
            parent.update(self.ref_);
        }
    }

    /// Move the elements from `ndx` onwards to the end of `dest`.
    pub(crate) fn move_to(&mut self, dest: &mut LeafNode<L>, ndx: usize) {
        let mut tail = self.array.split_off(ndx);
        dest.array.append(&mut tail);
    }

    pub(crate) fn bptree_insert<F>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        state: &mut State,
        func: F,
    ) -> BTreeResult<Option<Ref>>
    where
        F: FnOnce(&mut LeafNode<L>, usize) -> usize,
    {
        let leaf_size = self.size();
        let n = if n == NPOS { leaf_size } else { n };
        debug_assert!(n <= leaf_size);

        if leaf_size < ctx.max_node_size {
            let new_size = func(self, n);
            debug_assert_eq!(new_size, leaf_size + 1);
            self.write(ctx.alloc)?;
            return Ok(None);
        }

        let mut sibling = Self::detached(L::new());
        if n == leaf_size {
            func(&mut sibling, 0);
        } else {
            let mid = leaf_size / 2;
            self.move_to(&mut sibling, mid);
            if n <= mid {
                func(self, n);
            } else {
                func(&mut sibling, n - mid);
            }
        }
        state.split_offset = self.size();
        state.split_size = leaf_size + 1;

        self.write(ctx.alloc)?;
        let sibling_ref = sibling.write(ctx.alloc)?;
        ctx.cache.invalidate();
        trace!(
            target: "column_bptree::split",
            leaf = self.ref_,
            sibling = sibling_ref,
            kept = state.split_offset,
            total = state.split_size,
            "split leaf"
        );
        Ok(Some(sibling_ref))
    }

    pub(crate) fn bptree_access<F>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        func: F,
    ) -> BTreeResult<()>
    where
        F: FnOnce(&mut LeafNode<L>, usize),
    {
        func(self, n);
        self.write(ctx.alloc)?;
        Ok(())
    }

    pub(crate) fn bptree_read<F, R>(&self, n: usize, func: F) -> R
    where
        F: FnOnce(&LeafNode<L>, usize) -> R,
    {
        func(self, n)
    }

    /// Returns the leaf size after the erase.
    pub(crate) fn bptree_erase<F>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        func: F,
    ) -> BTreeResult<usize>
    where
        F: FnOnce(&mut LeafNode<L>, usize) -> usize,
    {
        let new_size = func(self, n);
        self.write(ctx.alloc)?;
        Ok(new_size)
    }
}
