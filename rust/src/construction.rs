//! Construction, attachment and ownership transfer for column trees.
//!
//! A tree starts unattached. `create` gives it a fresh empty leaf root,
//! `init_from_ref` and `init_from_parent` attach it to an existing subtree,
//! and `destroy` frees the subtree and detaches it again.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::alloc::Allocator;
use crate::cache::LeafCache;
use crate::config::TreeConfig;
use crate::error::{BTreeResult, BTreeResultExt, InitResult};
use crate::leaf::LeafNode;
use crate::leaf_array::{ColumnType, LeafArray};
use crate::node::{clone_deep, count_nodes, destroy_deep, Node};
use crate::parent::{ArrayParent, ParentLink};
use crate::types::{BPlusTree, BPlusTreeBase, Ref, NULL_REF};

impl<L: LeafArray> BPlusTreeBase<L> {
    /// Create an unattached tree with the default configuration.
    pub fn new(alloc: Allocator) -> Self {
        Self::build(alloc, TreeConfig::default())
    }

    /// Create an unattached tree, validating `config` first.
    ///
    /// # Examples
    ///
    /// ```
    /// use column_bptree::{Allocator, BPlusTreeBase, ArrayInteger, TreeConfig};
    ///
    /// assert!(BPlusTreeBase::<ArrayInteger>::with_config(Allocator::new(), TreeConfig::new(2)).is_err());
    /// let tree = BPlusTreeBase::<ArrayInteger>::with_config(Allocator::new(), TreeConfig::new(16)).unwrap();
    /// assert!(!tree.is_attached());
    /// ```
    pub fn with_config(alloc: Allocator, config: TreeConfig) -> InitResult<Self> {
        config.validate()?;
        Ok(Self::build(alloc, config))
    }

    fn build(alloc: Allocator, config: TreeConfig) -> Self {
        Self {
            alloc,
            config,
            root: None,
            parent: None,
            size: 0,
            cache: RefCell::new(LeafCache::new(config.leaf_cache)),
        }
    }

    pub fn allocator(&self) -> &Allocator {
        &self.alloc
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.root.is_some()
    }

    /// Ref of the root node.
    ///
    /// # Panics
    ///
    /// Panics if the tree is unattached.
    pub fn get_ref(&self) -> Ref {
        self.root_node().get_ref()
    }

    pub(crate) fn root_node(&self) -> &Node<L> {
        match &self.root {
            Some(root) => root,
            None => panic!("column tree is not attached"),
        }
    }

    /// Bind the tree to slot `ndx_in_parent` of `parent`. The slot is
    /// rewritten whenever the root ref changes from now on.
    pub fn set_parent(&mut self, parent: Rc<dyn ArrayParent>, ndx_in_parent: usize) {
        let link = ParentLink::new(parent, ndx_in_parent);
        if let Some(root) = self.root.as_mut() {
            root.set_parent(Some(link.clone()));
        }
        self.parent = Some(link);
    }

    pub fn ndx_in_parent(&self) -> Option<usize> {
        self.parent.as_ref().map(ParentLink::ndx_in_parent)
    }

    /// Write the root ref into the parent slot.
    pub fn update_parent(&self) {
        if let Some(root) = &self.root {
            root.update_parent();
        }
    }

    /// Attach a new empty leaf root.
    ///
    /// # Panics
    ///
    /// Panics if the tree is already attached.
    pub fn create(&mut self) -> BTreeResult<()> {
        assert!(!self.is_attached(), "create on an attached column tree");
        let leaf = LeafNode::create(&self.alloc)?;
        self.size = 0;
        self.replace_root(Node::Leaf(leaf));
        debug!(target: "column_bptree::root", root = self.get_ref(), "created tree");
        Ok(())
    }

    /// Free every node and detach. The parent slot, if any, is nulled.
    pub fn destroy(&mut self) -> BTreeResult<()> {
        let Some(root) = self.root.take() else {
            return Ok(());
        };
        destroy_deep(&self.alloc, root.get_ref())?;
        self.size = 0;
        self.cache.get_mut().invalidate();
        if let Some(parent) = &self.parent {
            parent.update(NULL_REF);
        }
        debug!(target: "column_bptree::root", root = root.get_ref(), "destroyed tree");
        Ok(())
    }

    /// Attach to the subtree whose root lives at `r`.
    pub fn init_from_ref(&mut self, r: Ref) -> InitResult<()> {
        let mut root = Node::init_from_ref(&self.alloc, r).with_context("init_from_ref")?;
        root.set_parent(self.parent.clone());
        self.size = root.tree_size();
        self.root = Some(root);
        self.cache.get_mut().invalidate();
        debug!(target: "column_bptree::root", root = r, size = self.size, "attached tree");
        Ok(())
    }

    /// Attach to the ref stored in the parent slot. Returns `false`, leaving
    /// the tree unattached, when the slot is empty.
    ///
    /// # Panics
    ///
    /// Panics if no parent was set.
    pub fn init_from_parent(&mut self) -> InitResult<bool> {
        let parent = match &self.parent {
            Some(parent) => parent,
            None => panic!("init_from_parent on a column tree without a parent"),
        };
        let r = parent.child_ref();
        if r == NULL_REF {
            return Ok(false);
        }
        self.init_from_ref(r)?;
        Ok(true)
    }

    /// Install `root` as the new root and publish its ref.
    pub(crate) fn replace_root(&mut self, root: Node<L>) {
        self.root = Some(root);
        self.publish_root();
    }

    /// Rebind the current root to the parent slot after it changed identity.
    pub(crate) fn publish_root(&mut self) {
        if let Some(root) = self.root.as_mut() {
            root.set_parent(self.parent.clone());
            root.update_parent();
            trace!(target: "column_bptree::root", root = root.get_ref(), "new root");
        }
        self.cache.get_mut().invalidate();
    }

    /// Drop the cached leaf. Reads after this descend from the root.
    pub fn invalidate_leaf_cache(&self) {
        self.cache.borrow_mut().invalidate();
    }

    /// Replace this tree's contents with a deep copy of `rhs`, which may live
    /// in another allocator. The copy keeps `rhs`'s node capacity.
    pub fn assign_from(&mut self, rhs: &BPlusTreeBase<L>) -> BTreeResult<()> {
        let Some(rhs_root) = &rhs.root else {
            return self.destroy();
        };
        let (leaves, inners) = count_nodes(&rhs.alloc, rhs_root.get_ref())?;
        self.alloc.check_headroom(leaves + inners)?;
        let copy = clone_deep(&rhs.alloc, &self.alloc, rhs_root.get_ref())?;
        let root = Node::init_from_ref(&self.alloc, copy)?;
        if let Some(old) = self.root.take() {
            destroy_deep(&self.alloc, old.get_ref())?;
        }
        self.config.max_node_size = rhs.config.max_node_size;
        self.size = rhs.size;
        self.replace_root(root);
        Ok(())
    }

    /// Take over `rhs`'s subtree, leaving `rhs` unattached.
    ///
    /// # Panics
    ///
    /// Panics if the two trees use different allocators.
    pub fn move_from(&mut self, rhs: &mut BPlusTreeBase<L>) -> BTreeResult<()> {
        assert!(
            self.alloc.ptr_eq(&rhs.alloc),
            "move_from between column trees of different allocators"
        );
        if let Some(old) = self.root.take() {
            destroy_deep(&self.alloc, old.get_ref())?;
        }
        self.config.max_node_size = rhs.config.max_node_size;
        self.size = rhs.size;
        rhs.size = 0;
        rhs.cache.get_mut().invalidate();
        if let Some(mut root) = rhs.root.take() {
            if let Some(parent) = &rhs.parent {
                parent.update(NULL_REF);
            }
            root.set_parent(None);
            self.replace_root(root);
        } else {
            self.cache.get_mut().invalidate();
            if let Some(parent) = &self.parent {
                parent.update(NULL_REF);
            }
        }
        Ok(())
    }
}

impl<T: ColumnType> BPlusTree<T> {
    /// Create an unattached column with the default configuration.
    pub fn new(alloc: Allocator) -> Self {
        Self {
            base: BPlusTreeBase::new(alloc),
        }
    }

    pub fn with_config(alloc: Allocator, config: TreeConfig) -> InitResult<Self> {
        Ok(Self {
            base: BPlusTreeBase::with_config(alloc, config)?,
        })
    }

    /// Deep copy into fresh blocks of the same allocator, without a parent.
    pub fn try_clone(&self) -> BTreeResult<Self> {
        let mut copy = Self {
            base: BPlusTreeBase::build(self.alloc.clone(), self.config),
        };
        copy.base.assign_from(&self.base)?;
        Ok(copy)
    }

    pub fn as_base(&self) -> &BPlusTreeBase<T::Leaf> {
        &self.base
    }

    pub fn as_base_mut(&mut self) -> &mut BPlusTreeBase<T::Leaf> {
        &mut self.base
    }
}
