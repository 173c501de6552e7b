// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The rebuildable-element capability and non-owning element handles.
//!
//! Any visual-tree node that wants scheduled rebuilds implements
//! [`CanvasElement`]. The registry never owns elements: it stores
//! [`ElementHandle`]s, which wrap a [`Weak`] reference and compare by the
//! address of the shared allocation.
//!
//! Two kinds of staleness are distinguished:
//!
//! - **Dropped** — every strong owner is gone and the handle no longer
//!   upgrades. Nothing can be called on the element.
//! - **Destroyed** — the handle still upgrades, but
//!   [`is_destroyed`](CanvasElement::is_destroyed) reports `true`. The element
//!   still receives its completion callback when it is purged.

use alloc::borrow::Cow;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::node::Node;
use crate::stage::UpdateStage;

/// A recoverable failure raised by [`CanvasElement::rebuild`].
///
/// The registry logs these with the element's tree path and moves on to the
/// next element.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RebuildError {
    /// Generic failure with a human-readable reason.
    #[error("rebuild failed: {reason}")]
    Failed {
        /// What went wrong.
        reason: Cow<'static, str>,
    },
    /// A collaborator the element depends on was not available.
    #[error("missing dependency: {what}")]
    MissingDependency {
        /// The missing collaborator.
        what: Cow<'static, str>,
    },
    /// Computed geometry was unusable (NaN, negative size, ...).
    #[error("invalid geometry: {detail}")]
    InvalidGeometry {
        /// Which value was rejected.
        detail: Cow<'static, str>,
    },
}

impl RebuildError {
    /// Shorthand for [`RebuildError::Failed`].
    #[must_use]
    pub fn failed(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// A visual-tree node that participates in scheduled rebuilds.
///
/// All methods take `&self`. A rebuild may register further elements with
/// the registry that is currently driving it, so implementations keep their
/// mutable state behind `Cell`/`RefCell`.
pub trait CanvasElement {
    /// Performs the work for one stage.
    ///
    /// # Errors
    ///
    /// Returns a [`RebuildError`] if the stage could not complete. The
    /// registry logs it; other elements and stages still run.
    fn rebuild(&self, stage: UpdateStage) -> Result<(), RebuildError>;

    /// Returns the tree node this element is attached to, if any.
    ///
    /// Used for depth ordering and as log context.
    fn node(&self) -> Option<Rc<Node>>;

    /// Called once the layout phase that had this element queued is over,
    /// or when the element leaves the layout queue early.
    fn layout_complete(&self);

    /// Called once the graphic phase that had this element queued is over,
    /// or when the element leaves the graphic queue early.
    fn graphic_update_complete(&self);

    /// Returns whether the element's backing object has been torn down even
    /// though this reference is still reachable.
    fn is_destroyed(&self) -> bool {
        false
    }
}

/// A non-owning, identity-compared reference to a [`CanvasElement`].
///
/// Any `Weak<T>` with `T: CanvasElement` converts into a handle, so call
/// sites can pass `Rc::downgrade(&element)` directly.
#[derive(Clone)]
pub struct ElementHandle(Weak<dyn CanvasElement>);

impl ElementHandle {
    /// Wraps a weak element reference.
    #[must_use]
    pub fn new(element: Weak<dyn CanvasElement>) -> Self {
        Self(element)
    }

    /// Creates a handle to a live element.
    #[must_use]
    pub fn from_rc<E: CanvasElement + 'static>(element: &Rc<E>) -> Self {
        let weak: Weak<E> = Rc::downgrade(element);
        Self(weak)
    }

    /// Returns the element if any strong owner still holds it.
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Rc<dyn CanvasElement>> {
        self.0.upgrade()
    }

    /// Returns whether every strong owner has been dropped.
    #[inline]
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.0.strong_count() == 0
    }

    /// Returns the element if it is still reachable and not destroyed, i.e.
    /// if it may be rebuilt.
    #[must_use]
    pub fn live(&self) -> Option<Rc<dyn CanvasElement>> {
        self.upgrade().filter(|e| !e.is_destroyed())
    }

    /// Returns the element's tree path, or `None` if it is gone or detached.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.upgrade().and_then(|e| e.node()).map(|n| n.path())
    }

    /// Names the element for diagnostics: its tree path, or the address of
    /// its allocation when it has no node.
    #[must_use]
    pub fn describe(&self) -> String {
        self.path().unwrap_or_else(|| format!("{:#x}", self.addr()))
    }

    /// Address of the shared allocation, used for identity and hashing.
    #[inline]
    fn addr(&self) -> usize {
        self.0.as_ptr().cast::<()>() as usize
    }
}

impl<E: CanvasElement + 'static> From<Weak<E>> for ElementHandle {
    fn from(element: Weak<E>) -> Self {
        let weak: Weak<dyn CanvasElement> = element;
        Self(weak)
    }
}

impl<E: CanvasElement + 'static> From<&Rc<E>> for ElementHandle {
    fn from(element: &Rc<E>) -> Self {
        Self::from_rc(element)
    }
}

impl From<&Rc<dyn CanvasElement>> for ElementHandle {
    fn from(element: &Rc<dyn CanvasElement>) -> Self {
        Self(Rc::downgrade(element))
    }
}

impl PartialEq for ElementHandle {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ElementHandle {}

impl Hash for ElementHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "ElementHandle({path})"),
            None if self.is_dropped() => f.write_str("ElementHandle(<dropped>)"),
            None => write!(f, "ElementHandle({:#x})", self.addr()),
        }
    }
}
