//! The slot a tree's root ref is published into.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::types::{Ref, NULL_REF};

/// Owner of a slot holding a child ref, typically a table's column list.
pub trait ArrayParent {
    fn get_child_ref(&self, ndx: usize) -> Ref;
    fn update_child_ref(&self, ndx: usize, new_ref: Ref);
}

/// Non-owning link from a root node to the slot that stores its ref.
#[derive(Clone)]
pub struct ParentLink {
    parent: Rc<dyn ArrayParent>,
    ndx_in_parent: usize,
}

impl ParentLink {
    pub fn new(parent: Rc<dyn ArrayParent>, ndx_in_parent: usize) -> Self {
        Self {
            parent,
            ndx_in_parent,
        }
    }

    pub fn ndx_in_parent(&self) -> usize {
        self.ndx_in_parent
    }

    pub fn child_ref(&self) -> Ref {
        self.parent.get_child_ref(self.ndx_in_parent)
    }

    pub fn update(&self, new_ref: Ref) {
        self.parent.update_child_ref(self.ndx_in_parent, new_ref);
    }
}

impl fmt::Debug for ParentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentLink")
            .field("ndx_in_parent", &self.ndx_in_parent)
            .field("child_ref", &self.child_ref())
            .finish()
    }
}

/// A plain table of ref slots.
#[derive(Debug, Default)]
pub struct RefSlots {
    slots: RefCell<Vec<Ref>>,
}

impl RefSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: RefCell::new(vec![NULL_REF; len]),
        }
    }

    pub fn get(&self, ndx: usize) -> Ref {
        self.slots.borrow()[ndx]
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArrayParent for RefSlots {
    fn get_child_ref(&self, ndx: usize) -> Ref {
        self.get(ndx)
    }

    fn update_child_ref(&self, ndx: usize, new_ref: Ref) {
        self.slots.borrow_mut()[ndx] = new_ref;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_updates_its_slot() {
        let slots = Rc::new(RefSlots::new(3));
        let link = ParentLink::new(slots.clone(), 1);
        link.update(17);
        assert_eq!(slots.get(0), NULL_REF);
        assert_eq!(slots.get(1), 17);
        assert_eq!(link.child_ref(), 17);
        assert_eq!(link.ndx_in_parent(), 1);
    }
}
