// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visual tree nodes.
//!
//! A [`Node`] is the tree position an element back-references. Children are
//! owned by their parent; the parent link is weak, so dropping a subtree's
//! owner detaches it and its top node behaves as a root from then on.
//!
//! The registry never caches tree positions: [`Node::depth`] walks the
//! ancestor chain every time it is asked.

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::ptr;

/// A named node in a visual tree.
pub struct Node {
    name: String,
    parent: RefCell<Weak<Self>>,
    children: RefCell<Vec<Rc<Self>>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("depth", &self.depth())
            .field("children", &self.children.borrow().len())
            .finish()
    }
}

impl Node {
    /// Creates a detached node.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        })
    }

    /// Creates a node and appends it to `parent`.
    #[must_use]
    pub fn new_child(parent: &Rc<Self>, name: impl Into<String>) -> Rc<Self> {
        let child = Self::new(name);
        parent.add_child(&child);
        child
    }

    /// Returns the node's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // -- Topology API --

    /// Appends `child` as the last child of `self`.
    ///
    /// # Panics
    ///
    /// Panics if `child` already has a parent, or if `child` is `self` or one
    /// of its ancestors.
    pub fn add_child(self: &Rc<Self>, child: &Rc<Self>) {
        assert!(child.parent().is_none(), "child already has a parent");
        assert!(
            !child.is_ancestor_of(self) && !Rc::ptr_eq(self, child),
            "adding {:?} under {:?} would create a cycle",
            child.name,
            self.name
        );
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(Rc::clone(child));
    }

    /// Detaches `self` from its parent.
    ///
    /// # Panics
    ///
    /// Panics if the node has no parent.
    pub fn remove_from_parent(&self) {
        let parent = self.parent().expect("node has no parent");
        parent.unlink_child(self);
        *self.parent.borrow_mut() = Weak::new();
    }

    /// Moves `self` under `new_parent`, detaching it from its current parent
    /// first if it has one.
    ///
    /// # Panics
    ///
    /// Panics if `new_parent` is `self` or one of its descendants.
    pub fn reparent(self: &Rc<Self>, new_parent: &Rc<Self>) {
        if self.parent().is_some() {
            self.remove_from_parent();
        }
        new_parent.add_child(self);
    }

    /// Returns the parent, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Rc<Self>> {
        self.parent.borrow().upgrade()
    }

    /// Returns a snapshot of the direct children, in insertion order.
    #[must_use]
    pub fn children(&self) -> Vec<Rc<Self>> {
        self.children.borrow().clone()
    }

    /// Returns the number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    // -- Position queries --

    /// Returns the number of ancestor hops to the root. A root has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            depth += 1;
            cursor = node.parent();
        }
        depth
    }

    /// Returns whether `self` appears on `other`'s ancestor chain.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        let mut cursor = other.parent();
        while let Some(node) = cursor {
            if ptr::eq(Rc::as_ptr(&node), self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Returns the topmost reachable ancestor, or `self` for a root.
    #[must_use]
    pub fn root(self: &Rc<Self>) -> Rc<Self> {
        let mut top = Rc::clone(self);
        while let Some(parent) = top.parent() {
            top = parent;
        }
        top
    }

    /// Returns the names from the root down to `self`, joined with `/`.
    ///
    /// Used as tree context when reporting rebuild failures.
    #[must_use]
    pub fn path(&self) -> String {
        let mut names: Vec<String> = Vec::new();
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            names.push(node.name.clone());
            cursor = node.parent();
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push_str(name);
            path.push('/');
        }
        path.push_str(&self.name);
        path
    }

    // -- Internal helpers --

    fn unlink_child(&self, child: &Self) {
        let mut children = self.children.borrow_mut();
        if let Some(pos) = children
            .iter()
            .position(|c| ptr::eq(Rc::as_ptr(c), child))
        {
            children.remove(pos);
        }
    }
}
