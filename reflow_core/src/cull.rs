// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contract for the clipping pass that runs between layout and graphic
//! rebuilds.
//!
//! The registry does not know how clipping works. It calls
//! [`Culler::cull`] exactly once per tick, after every layout stage has
//! finished and before the first graphic stage starts, because culling
//! decisions depend on settled geometry.
//!
//! ```rust,ignore
//! fn on_will_render(registry: &UpdateRegistry) {
//!     // Cleanup, then Prelayout / Layout / PostLayout over the layout queue
//!     // ...
//!     culler.cull();
//!     // PreRender / LatePreRender over the graphic queue
//! }
//! ```

/// The visibility/clipping service invoked once per tick.
///
/// Any `FnMut()` closure implements this trait, which keeps test doubles
/// short.
pub trait Culler {
    /// Recomputes clipping for all registered clippers.
    fn cull(&mut self);
}

impl<F: FnMut()> Culler for F {
    fn cull(&mut self) {
        self();
    }
}

/// A [`Culler`] that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCuller;

impl Culler for NoopCuller {
    fn cull(&mut self) {}
}
