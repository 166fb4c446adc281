//! The node capability surface shared by leaves and inner nodes.
//!
//! Tree operations are written once against [`Node`] and recurse top-down.
//! A global element index is turned into a child-local index at each inner
//! node; the leaf applies the caller's closure, and split or size
//! information flows back up through return values.

use std::collections::HashSet;

use crate::alloc::Allocator;
use crate::cache::LeafCache;
use crate::error::{BPlusTreeError, BTreeResult};
use crate::header::NodeHeader;
use crate::inner::InnerNode;
use crate::leaf::LeafNode;
use crate::leaf_array::LeafArray;
use crate::parent::ParentLink;
use crate::types::{Ref, State, NULL_REF};

/// Visitor called with each leaf and the global index of its first element.
/// Returning `true` stops the walk.
pub type TraverseFunc<'f, L> = dyn FnMut(&LeafNode<L>, usize) -> bool + 'f;

/// What every recursive operation needs from the owning tree.
pub(crate) struct TreeContext<'a, L: LeafArray> {
    pub alloc: &'a Allocator,
    pub max_node_size: usize,
    pub cache: &'a mut LeafCache<L>,
    /// Global index of the first element of the node being visited.
    pub offset: usize,
}

impl<'a, L: LeafArray> TreeContext<'a, L> {
    pub fn new(alloc: &'a Allocator, max_node_size: usize, cache: &'a mut LeafCache<L>) -> Self {
        Self {
            alloc,
            max_node_size,
            cache,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node<L: LeafArray> {
    Leaf(LeafNode<L>),
    Inner(InnerNode),
}

impl<L: LeafArray> Node<L> {
    /// Decode whichever kind of node lives at `r`.
    pub fn init_from_ref(alloc: &Allocator, r: Ref) -> BTreeResult<Self> {
        alloc.read(r, |bytes| {
            let header = NodeHeader::parse(bytes)?;
            if header.is_inner {
                InnerNode::decode(r, &header, bytes).map(Node::Inner)
            } else {
                LeafNode::decode(r, &header, bytes).map(Node::Leaf)
            }
        })?
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn get_ref(&self) -> Ref {
        match self {
            Node::Leaf(leaf) => leaf.get_ref(),
            Node::Inner(inner) => inner.get_ref(),
        }
    }

    /// Elements in a leaf, children in an inner node.
    pub fn node_size(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.size(),
            Node::Inner(inner) => inner.node_size(),
        }
    }

    /// Elements in the whole subtree.
    pub fn tree_size(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.size(),
            Node::Inner(inner) => inner.tree_size(),
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ParentLink>) {
        match self {
            Node::Leaf(leaf) => leaf.set_parent(parent),
            Node::Inner(inner) => inner.set_parent(parent),
        }
    }

    /// Publish this node's ref into its parent slot, if it has one.
    pub(crate) fn update_parent(&self) {
        match self {
            Node::Leaf(leaf) => leaf.update_parent(),
            Node::Inner(inner) => inner.update_parent(),
        }
    }

    pub(crate) fn write(&mut self, alloc: &Allocator) -> BTreeResult<Ref> {
        match self {
            Node::Leaf(leaf) => leaf.write(alloc),
            Node::Inner(inner) => inner.write(alloc),
        }
    }

    /// Insert before element `n` of this subtree, or append when `n` is
    /// `NPOS`. Returns the new sibling's ref if this node split.
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
        match self {
            Node::Leaf(leaf) => leaf.bptree_insert(ctx, n, state, func),
            Node::Inner(inner) => inner.bptree_insert(ctx, n, state, func),
        }
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
        match self {
            Node::Leaf(leaf) => leaf.bptree_access(ctx, n, func),
            Node::Inner(inner) => inner.bptree_access(ctx, n, func),
        }
    }

    pub(crate) fn bptree_read<F, R>(
        &self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        func: F,
    ) -> BTreeResult<R>
    where
        F: FnOnce(&LeafNode<L>, usize) -> R,
    {
        match self {
            Node::Leaf(leaf) => Ok(leaf.bptree_read(n, func)),
            Node::Inner(inner) => inner.bptree_read(ctx, n, func),
        }
    }

    /// Erase element `n` of this subtree. Returns the node size afterwards,
    /// or 0 if the subtree is now empty.
    pub(crate) fn bptree_erase<F>(
        &mut self,
        ctx: &mut TreeContext<'_, L>,
        n: usize,
        func: F,
    ) -> BTreeResult<usize>
    where
        F: FnOnce(&mut LeafNode<L>, usize) -> usize,
    {
        match self {
            Node::Leaf(leaf) => leaf.bptree_erase(ctx, n, func),
            Node::Inner(inner) => inner.bptree_erase(ctx, n, func),
        }
    }

    /// Visit the leaves left to right. Returns `true` if the visitor stopped
    /// the walk.
    pub(crate) fn bptree_traverse(
        &self,
        alloc: &Allocator,
        offset: usize,
        func: &mut TraverseFunc<'_, L>,
    ) -> BTreeResult<bool> {
        match self {
            Node::Leaf(leaf) => Ok(func(leaf, offset)),
            Node::Inner(inner) => inner.bptree_traverse(alloc, offset, func),
        }
    }

    /// Move everything from `ndx` onwards to the end of `dest`, which must be
    /// the same kind of node. `offset_adj` is the element count already in
    /// `dest` and only matters for inner nodes.
    pub(crate) fn move_to(
        &mut self,
        dest: &mut Node<L>,
        ndx: usize,
        offset_adj: usize,
    ) -> BTreeResult<()> {
        match (self, dest) {
            (Node::Leaf(src), Node::Leaf(dest)) => {
                src.move_to(dest, ndx);
                Ok(())
            }
            (Node::Inner(src), Node::Inner(dest)) => {
                src.move_to(dest, ndx, offset_adj);
                Ok(())
            }
            _ => Err(BPlusTreeError::corrupted_tree(
                "sibling",
                "leaf and inner node at the same level",
            )),
        }
    }
}

// ============================================================================
// WHOLE-SUBTREE HELPERS
// ============================================================================

/// Free every block of the subtree rooted at `r`.
pub(crate) fn destroy_deep(alloc: &Allocator, r: Ref) -> BTreeResult<()> {
    if r == NULL_REF {
        return Ok(());
    }
    let header = alloc.header(r)?;
    if header.is_inner {
        let inner = InnerNode::init_from_ref(alloc, r)?;
        for &child in inner.children() {
            destroy_deep(alloc, child)?;
        }
    }
    alloc.free(r);
    Ok(())
}

/// Add every block of the subtree at `r` to `reachable`.
pub(crate) fn mark_reachable(
    alloc: &Allocator,
    r: Ref,
    reachable: &mut HashSet<Ref>,
) -> BTreeResult<()> {
    if r == NULL_REF || !reachable.insert(r) {
        return Ok(());
    }
    if alloc.header(r)?.is_inner {
        let inner = InnerNode::init_from_ref(alloc, r)?;
        for &child in inner.children() {
            mark_reachable(alloc, child, reachable)?;
        }
    }
    Ok(())
}

/// Copy the subtree at `r` in `src` into fresh blocks of `dst`.
pub(crate) fn clone_deep(src: &Allocator, dst: &Allocator, r: Ref) -> BTreeResult<Ref> {
    let bytes = src.read(r, |bytes| bytes.to_vec())?;
    let header = NodeHeader::parse(&bytes)?;
    if !header.is_inner {
        return dst.alloc(bytes);
    }
    let inner = InnerNode::decode(r, &header, &bytes)?;
    let children = inner
        .children()
        .iter()
        .map(|&child| clone_deep(src, dst, child))
        .collect::<BTreeResult<Vec<_>>>()?;
    let mut copy = inner.with_children(children);
    copy.write(dst)
}

/// Number of levels below and including `r`.
pub(crate) fn subtree_depth(alloc: &Allocator, r: Ref) -> BTreeResult<usize> {
    let mut depth = 1;
    let mut r = r;
    while alloc.header(r)?.is_inner {
        let inner = InnerNode::init_from_ref(alloc, r)?;
        r = *inner.children().first().ok_or_else(|| {
            BPlusTreeError::corrupted_tree("inner node", &format!("ref {} has no children", r))
        })?;
        depth += 1;
    }
    Ok(depth)
}

/// Count leaves and inner nodes below and including `r`.
pub(crate) fn count_nodes(alloc: &Allocator, r: Ref) -> BTreeResult<(usize, usize)> {
    if !alloc.header(r)?.is_inner {
        return Ok((1, 0));
    }
    let inner = InnerNode::init_from_ref(alloc, r)?;
    let mut counts = (0, 1);
    for &child in inner.children() {
        let (leaves, inners) = count_nodes(alloc, child)?;
        counts.0 += leaves;
        counts.1 += inners;
    }
    Ok(counts)
}
