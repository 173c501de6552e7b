// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Depth-ordered layout and graphic rebuild scheduling for visual trees.
//!
//! `reflow_core` decides *when* elements of a visual tree recompute their
//! layout and their visual state. Elements ask to be rebuilt; once per render
//! tick the [`UpdateRegistry`](registry::UpdateRegistry) runs every queued
//! element through a fixed sequence of stages, exactly once each, in a
//! predictable order. It is `no_std` compatible (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   TickSignal::emit()
//!       │
//!       ▼
//!   UpdateRegistry::perform_update()
//!       │
//!       ├─► Cleanup   purge dropped / destroyed entries
//!       │
//!       ├─► Layout    sort by depth, then Prelayout ─► Layout ─► PostLayout
//!       │             layout_complete() for each, clear
//!       │
//!       ├─► Cull      Culler::cull()
//!       │
//!       └─► Graphic   PreRender ─► LatePreRender (registration order)
//!                     graphic_update_complete() for each, clear
//! ```
//!
//! **[`element`]** — The [`CanvasElement`](element::CanvasElement)
//! capability and [`ElementHandle`](element::ElementHandle), the non-owning
//! reference the registry stores.
//!
//! **[`node`]** — Minimal visual tree used for depth ordering and as
//! failure-log context.
//!
//! **[`stage`]** — The five update stages and their layout/graphic split.
//!
//! **[`queue`]** — `UniqueQueue`, an insertion-ordered queue with O(1)
//! membership.
//!
//! **[`depth`]** — Tree-depth comparison and sorting.
//!
//! **[`registry`]** — The scheduler state machine and its registration API.
//!
//! **[`cull`]** — The [`Culler`](cull::Culler) hook run between phases.
//!
//! **[`tick`]** — [`TickSignal`](tick::TickSignal), the "will render" event.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types for
//! rebuild diagnostics and tick instrumentation.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables the `global` module with the
//!   lazily created per-thread registry.
//! - `trace` (disabled by default): Enables the profiling marker bodies in
//!   `Tracer` (one borrow per call site). Diagnostics are always on.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod cull;
pub mod depth;
pub mod element;
#[cfg(feature = "std")]
pub mod global;
pub mod node;
pub mod queue;
pub mod registry;
pub mod stage;
pub mod tick;
pub mod trace;
