//! Inner nodes: child refs plus a cumulative element count per child.
//!
//! Block payload is the child refs followed by the cumulative counts, each
//! a little-endian u64. `offsets[i]` is the number of elements in children
//! `0..=i`, so the last entry is the size of the whole subtree.

use tracing::trace;

use crate::alloc::Allocator;
use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::{NodeHeader, HEADER_SIZE};
use crate::leaf::LeafNode;
use crate::leaf_array::LeafArray;
use crate::node::{destroy_deep, Node, TraverseFunc, TreeContext};
use crate::parent::ParentLink;
use crate::types::{Ref, State, NPOS, NULL_REF};

#[derive(Debug, Clone, Default)]
pub struct InnerNode {
    ref_: Ref,
    children: Vec<Ref>,
    offsets: Vec<usize>,
    parent: Option<ParentLink>,
}

fn read_u64(chunk: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(chunk);
    u64::from_le_bytes(bytes)
}

impl InnerNode {
    fn detached() -> Self {
        Self::default()
    }

    /// Allocate a root over two subtrees, the result of splitting the old root.
    pub fn new_root(
        alloc: &Allocator,
        left: Ref,
        left_size: usize,
        right: Ref,
        total_size: usize,
    ) -> BTreeResult<Self> {
        let mut root = Self {
            children: vec![left, right],
            offsets: vec![left_size, total_size],
            ..Self::detached()
        };
        root.write(alloc)?;
        Ok(root)
    }

    pub fn init_from_ref(alloc: &Allocator, r: Ref) -> BTreeResult<Self> {
        alloc.read(r, |bytes| {
            let header = NodeHeader::parse(bytes)?;
            Self::decode(r, &header, bytes)
        })?
    }

    pub(crate) fn decode(r: Ref, header: &NodeHeader, bytes: &[u8]) -> BTreeResult<Self> {
        if !header.is_inner {
            return Err(BPlusTreeError::corrupted_tree(
                "inner node",
                &format!("ref {} holds a leaf", r),
            ));
        }
        let count = header.size;
        let payload = &bytes[HEADER_SIZE..];
        let needed = match count.checked_mul(16) {
            Some(needed) if needed <= payload.len() => needed,
            _ => {
                return Err(BPlusTreeError::corrupted_tree(
                    "inner node",
                    &format!("ref {} is too short for {} children", r, count),
                ))
            }
        };
        let (refs, counts) = payload[..needed].split_at(needed / 2);
        let children = refs.chunks_exact(8).map(read_u64).collect();
        let offsets = counts
            .chunks_exact(8)
            .map(|chunk| read_u64(chunk) as usize)
            .collect();
        Ok(Self {
            ref_: r,
            children,
            offsets,
            parent: None,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.children.len() * 16);
        NodeHeader::inner(self.children.len()).write_to(&mut out);
        for &child in &self.children {
            out.extend_from_slice(&child.to_le_bytes());
        }
        for &offset in &self.offsets {
            out.extend_from_slice(&(offset as u64).to_le_bytes());
        }
        out
    }

    pub(crate) fn write(&mut self, alloc: &Allocator) -> BTreeResult<Ref> {
        let bytes = self.encode();
        self.ref_ = if self.ref_ == NULL_REF {
            alloc.alloc(bytes)?
        } else {
            alloc.copy_on_write(self.ref_, bytes)?
        };
        Ok(self.ref_)
    }

    /// Unwritten copy with the same counts but different child refs.
    pub(crate) fn with_children(&self, children: Vec<Ref>) -> Self {
        Self {
            children,
            offsets: self.offsets.clone(),
            ..Self::detached()
        }
    }

    pub fn get_ref(&self) -> Ref {
        self.ref_
    }

    pub fn node_size(&self) -> usize {
        self.children.len()
    }

    pub fn tree_size(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn children(&self) -> &[Ref] {
        &self.children
    }

    pub fn child_ref(&self, ndx: usize) -> Ref {
        self.children[ndx]
    }

    /// Global index, relative to this node, of child `ndx`'s first element.
    pub fn child_start(&self, ndx: usize) -> usize {
        if ndx == 0 {
            0
        } else {
            self.offsets[ndx - 1]
        }
    }

    pub fn child_size(&self, ndx: usize) -> usize {
        self.offsets[ndx] - self.child_start(ndx)
    }

    /// The child holding element `n`.
    fn find_child(&self, n: usize) -> usize {
        self.offsets.partition_point(|&end| end <= n)
    }

    fn adjust_offsets(&mut self, from: usize, grow: bool) {
        for offset in &mut self.offsets[from..] {
            if grow {
                *offset += 1;
            } else {
                *offset -= 1;
            }
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ParentLink>) {
        self.parent = parent;
    }

    pub(crate) fn update_parent(&self) {
        if let Some(parent) = &self.parent {
            parent.update(self.ref_);
        }
    }

    /// Move children from `ndx` onwards to the end of `dest`, whose subtree
    /// already holds `offset_adj` elements.
    pub(crate) fn move_to(&mut self, dest: &mut InnerNode, ndx: usize, offset_adj: usize) {
        let base = self.child_start(ndx);
        dest.children.extend(self.children.drain(ndx..));
        dest.offsets
            .extend(self.offsets.drain(ndx..).map(|o| o - base + offset_adj));
    }

    fn load_child<L: LeafArray>(
        &self,
        ctx: &mut TreeContext<'_, L>,
        ndx: usize,
    ) -> BTreeResult<Node<L>> {
        let r = self.children[ndx];
        if let Some(leaf) = ctx.cache.take(r) {
            return Ok(Node::Leaf(leaf));
        }
        Node::init_from_ref(ctx.alloc, r)
    }

    /// Hand a child back after an operation; leaves go to the cache.
    fn release_child<L: LeafArray>(ctx: &mut TreeContext<'_, L>, child: Node<L>, begin: usize) {
        if let Node::Leaf(leaf) = child {
            ctx.cache.store(leaf, begin);
        }
    }

    pub(crate) fn bptree_insert<L, F>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        state: &mut State,
        func: F,
    ) -> BTreeResult<Option<Ref>>
    where
        L: LeafArray,
        F: FnOnce(&mut LeafNode<L>, usize) -> usize,
    {
        let (child_ndx, local) = if n == NPOS {
            (self.children.len() - 1, NPOS)
        } else {
            let ndx = self.find_child(n);
            (ndx, n - self.child_start(ndx))
        };
        let start = self.child_start(child_ndx);
        let mut child = self.load_child(ctx, child_ndx)?;
        let mut child_state = State::default();

        let base = ctx.offset;
        ctx.offset = base + start;
        let sibling = child.bptree_insert(ctx, local, &mut child_state, func);
        ctx.offset = base;
        let sibling = sibling?;

        self.children[child_ndx] = child.get_ref();
        let Some(sibling_ref) = sibling else {
            self.adjust_offsets(child_ndx, true);
            Self::release_child(ctx, child, base + start);
            self.write(ctx.alloc)?;
            return Ok(None);
        };

        self.offsets[child_ndx] = start + child_state.split_offset;
        self.children.insert(child_ndx + 1, sibling_ref);
        self.offsets
            .insert(child_ndx + 1, start + child_state.split_size);
        self.adjust_offsets(child_ndx + 2, true);

        if self.children.len() <= ctx.max_node_size {
            self.write(ctx.alloc)?;
            return Ok(None);
        }

        let mut new_inner = Self::detached();
        let split_at = if child_ndx + 2 == self.children.len() {
            self.children.len() - 1
        } else {
            self.children.len() / 2
        };
        self.move_to(&mut new_inner, split_at, 0);
        state.split_offset = self.tree_size();
        state.split_size = self.tree_size() + new_inner.tree_size();

        self.write(ctx.alloc)?;
        let new_ref = new_inner.write(ctx.alloc)?;
        trace!(
            target: "column_bptree::split",
            inner = self.ref_,
            sibling = new_ref,
            kept_children = self.children.len(),
            moved_children = new_inner.children.len(),
            "split inner node"
        );
        Ok(Some(new_ref))
    }

    pub(crate) fn bptree_access<L, F>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        func: F,
    ) -> BTreeResult<()>
    where
        L: LeafArray,
        F: FnOnce(&mut LeafNode<L>, usize),
    {
        let child_ndx = self.find_child(n);
        let start = self.child_start(child_ndx);
        let mut child = self.load_child(ctx, child_ndx)?;

        let base = ctx.offset;
        ctx.offset = base + start;
        let result = child.bptree_access(ctx, n - start, func);
        ctx.offset = base;
        result?;

        let new_ref = child.get_ref();
        Self::release_child(ctx, child, base + start);
        if new_ref != self.children[child_ndx] {
            self.children[child_ndx] = new_ref;
            self.write(ctx.alloc)?;
        }
        Ok(())
    }

    pub(crate) fn bptree_read<L, F, R>(
        &self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        func: F,
    ) -> BTreeResult<R>
    where
        L: LeafArray,
        F: FnOnce(&LeafNode<L>, usize) -> R,
    {
        let child_ndx = self.find_child(n);
        let start = self.child_start(child_ndx);
        let child = self.load_child(ctx, child_ndx)?;

        let base = ctx.offset;
        ctx.offset = base + start;
        let result = child.bptree_read(ctx, n - start, func);
        ctx.offset = base;
        let value = result?;

        Self::release_child(ctx, child, base + start);
        Ok(value)
    }

    /// Returns the child count afterwards, or 0 once the subtree is empty.
    pub(crate) fn bptree_erase<L, F>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        func: F,
    ) -> BTreeResult<usize>
    where
        L: LeafArray,
        F: FnOnce(&mut LeafNode<L>, usize) -> usize,
    {
        let child_ndx = self.find_child(n);
        let start = self.child_start(child_ndx);
        let mut child = self.load_child(ctx, child_ndx)?;

        let base = ctx.offset;
        ctx.offset = base + start;
        let child_size = child.bptree_erase(ctx, n - start, func);
        ctx.offset = base;
        let child_size = child_size?;

        self.children[child_ndx] = child.get_ref();
        self.adjust_offsets(child_ndx, false);

        if child_size == 0 && self.children.len() > 1 {
            ctx.cache.invalidate();
            destroy_deep(ctx.alloc, child.get_ref())?;
            self.children.remove(child_ndx);
            self.offsets.remove(child_ndx);
            trace!(
                target: "column_bptree::merge",
                inner = self.ref_,
                child_ndx,
                "removed empty child"
            );
        } else if child_size < ctx.max_node_size / 2 && self.children.len() > 1 {
            ctx.cache.invalidate();
            self.rebalance(ctx, child_ndx, child)?;
        } else {
            Self::release_child(ctx, child, base + start);
        }

        self.write(ctx.alloc)?;
        Ok(if self.tree_size() == 0 {
            0
        } else {
            self.children.len()
        })
    }

    /// Merge the underfull child at `child_ndx` with a neighbour, or even
    /// out the two when they do not fit in one node. The right neighbour is
    /// preferred; the last child pairs with its left one.
    fn rebalance<L: LeafArray>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        child_ndx: usize,
        child: Node<L>,
    ) -> BTreeResult<()> {
        let (left_ndx, mut left, mut right) = if child_ndx + 1 < self.children.len() {
            let right = self.load_child(ctx, child_ndx + 1)?;
            (child_ndx, child, right)
        } else {
            let left = self.load_child(ctx, child_ndx - 1)?;
            (child_ndx - 1, left, child)
        };
        let left_start = self.child_start(left_ndx);
        let combined = left.node_size() + right.node_size();
        let left_total = left.tree_size();
        right.move_to(&mut left, 0, left_total)?;

        if combined <= ctx.max_node_size {
            left.write(ctx.alloc)?;
            ctx.alloc.free(right.get_ref());
            self.children[left_ndx] = left.get_ref();
            self.children.remove(left_ndx + 1);
            self.offsets.remove(left_ndx);
            trace!(
                target: "column_bptree::merge",
                survivor = left.get_ref(),
                freed = right.get_ref(),
                size = combined,
                "merged siblings"
            );
        } else {
            let target = combined / 2;
            left.move_to(&mut right, target, 0)?;
            left.write(ctx.alloc)?;
            right.write(ctx.alloc)?;
            self.children[left_ndx] = left.get_ref();
            self.children[left_ndx + 1] = right.get_ref();
            self.offsets[left_ndx] = left_start + left.tree_size();
            trace!(
                target: "column_bptree::merge",
                left = left.get_ref(),
                right = right.get_ref(),
                left_size = left.node_size(),
                right_size = right.node_size(),
                "redistributed siblings"
            );
        }
        Ok(())
    }

    pub(crate) fn bptree_traverse<L: LeafArray>(
        &self,
        alloc: &Allocator,
        offset: usize,
        func: &mut TraverseFunc<'_, L>,
    ) -> BTreeResult<bool> {
        for (ndx, &r) in self.children.iter().enumerate() {
            let child = Node::<L>::init_from_ref(alloc, r)?;
            if child.bptree_traverse(alloc, offset + self.child_start(ndx), func)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner_with(children: &[Ref], sizes: &[usize]) -> InnerNode {
        let mut node = InnerNode::detached();
        let mut total = 0;
        for (&child, &size) in children.iter().zip(sizes) {
            total += size;
            node.children.push(child);
            node.offsets.push(total);
        }
        node
    }

    #[test]
    fn find_child_uses_cumulative_counts() {
        let node = inner_with(&[1, 2, 3], &[3, 2, 4]);
        assert_eq!(node.find_child(0), 0);
        assert_eq!(node.find_child(2), 0);
        assert_eq!(node.find_child(3), 1);
        assert_eq!(node.find_child(4), 1);
        assert_eq!(node.find_child(5), 2);
        assert_eq!(node.find_child(8), 2);
        assert_eq!(node.child_start(2), 5);
        assert_eq!(node.child_size(2), 4);
        assert_eq!(node.tree_size(), 9);
    }

    #[test]
    fn move_to_rebases_counts() {
        let mut left = inner_with(&[1, 2, 3, 4], &[3, 2, 4, 1]);
        let mut right = inner_with(&[9], &[5]);
        let right_size = right.tree_size();
        left.move_to(&mut right, 2, right_size);
        assert_eq!(left.children, vec![1, 2]);
        assert_eq!(left.offsets, vec![3, 5]);
        assert_eq!(right.children, vec![9, 3, 4]);
        assert_eq!(right.offsets, vec![5, 9, 10]);
    }

    #[test]
    fn encode_decode() {
        let alloc = Allocator::new();
        let mut node = inner_with(&[11, 12, 13], &[3, 2, 4]);
        let r = node.write(&alloc).unwrap();
        let back = InnerNode::init_from_ref(&alloc, r).unwrap();
        assert_eq!(back.children, node.children);
        assert_eq!(back.offsets, node.offsets);
        assert_eq!(back.get_ref(), r);
    }

    #[test]
    fn decode_rejects_short_block() {
        let alloc = Allocator::new();
        let mut bytes = Vec::new();
        NodeHeader::inner(4).write_to(&mut bytes);
        bytes.extend_from_slice(&[0u8; 16]);
        let r = alloc.alloc(bytes).unwrap();
        assert!(InnerNode::init_from_ref(&alloc, r)
            .unwrap_err()
            .is_corruption());
    }

    #[test]
    fn decode_rejects_huge_child_count() {
        let mut bytes = Vec::new();
        NodeHeader::inner(4).write_to(&mut bytes);
        bytes.extend_from_slice(&[0u8; 64]);
        for count in [usize::MAX / 8, usize::MAX] {
            let header = NodeHeader {
                size: count,
                ..NodeHeader::inner(4)
            };
            assert!(InnerNode::decode(1, &header, &bytes)
                .unwrap_err()
                .is_corruption());
        }

        let alloc = Allocator::new();
        bytes[8..HEADER_SIZE].copy_from_slice(&((usize::MAX / 8) as u64).to_le_bytes());
        let r = alloc.alloc(bytes).unwrap();
        assert!(InnerNode::init_from_ref(&alloc, r)
            .unwrap_err()
            .is_corruption());
    }
}
