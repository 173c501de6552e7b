// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide registry and "will render" signal.
//!
//! The first call to any function here creates one [`UpdateRegistry`] and one
//! [`TickSignal`] and attaches the registry to the signal. Both live until
//! the thread exits. The registry is single-threaded, so "process-wide" means
//! per thread; a UI normally drives everything from one thread.
//!
//! Code that can pass a registry handle around explicitly should prefer
//! that. This module exists for elements that have no other way to reach the
//! scheduler.

use alloc::rc::Rc;

use std::thread_local;

use crate::registry::UpdateRegistry;
use crate::tick::TickSignal;

struct Global {
    registry: Rc<UpdateRegistry>,
    signal: Rc<TickSignal>,
}

impl Global {
    fn new() -> Self {
        let registry = Rc::new(UpdateRegistry::default());
        let signal = Rc::new(TickSignal::new());
        registry.attach(&signal);
        Self { registry, signal }
    }
}

thread_local! {
    static GLOBAL: Global = Global::new();
}

/// Returns the shared registry, creating it on first use.
#[must_use]
pub fn instance() -> Rc<UpdateRegistry> {
    GLOBAL.with(|g| Rc::clone(&g.registry))
}

/// Returns the shared "will render" signal the registry is attached to.
#[must_use]
pub fn will_render() -> Rc<TickSignal> {
    GLOBAL.with(|g| Rc::clone(&g.signal))
}

/// Emits the shared "will render" signal, running one registry tick.
pub fn emit_will_render() {
    will_render().emit();
}
