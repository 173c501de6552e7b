// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The parameterless "render tick about to occur" signal.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

/// Identifies one subscription to a [`TickSignal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn()>;

/// A synchronous, single-threaded event fired once per render tick.
///
/// Listeners run in subscription order. The listener list is snapshotted
/// before dispatch, so a listener may subscribe or unsubscribe while the
/// signal is being emitted; such changes take effect on the next emit.
#[derive(Default)]
pub struct TickSignal {
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_id: Cell<u64>,
    emitted: Cell<u64>,
}

impl fmt::Debug for TickSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickSignal")
            .field("listeners", &self.listeners.borrow().len())
            .field("emitted", &self.emitted.get())
            .finish_non_exhaustive()
    }
}

impl TickSignal {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    /// Returns the number of subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Returns how many times the signal has been emitted.
    #[must_use]
    pub fn emit_count(&self) -> u64 {
        self.emitted.get()
    }

    /// Invokes every listener synchronously.
    pub fn emit(&self) {
        self.emitted.set(self.emitted.get() + 1);
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}
