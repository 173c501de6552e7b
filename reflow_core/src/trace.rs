// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics and profiling for the update loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! registry calls while it runs a tick. All method bodies default to no-ops,
//! so implementing only the events you care about is fine.
//!
//! Events fall into two groups:
//!
//! - **Diagnostics** — [`RebuildFailure`] and [`ContractViolation`]. These
//!   are the registry's log output and are always delivered.
//! - **Profiling markers** — update, phase, and stage begin/end events.
//!   These only exist with the `trace` feature; without it every marker
//!   compiles to nothing. They have no effect on scheduling.
//!
//! [`Tracer`] owns the installed sink together with an optional clock and is
//! what the registry talks to.
//!
//! # Crate features
//!
//! - `trace` — enables the profiling marker bodies (one borrow per call).

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;
use core::fmt;

use crate::element::RebuildError;
use crate::stage::{PhaseKind, UpdateStage};

/// Returns a monotonic timestamp in nanoseconds.
pub type Clock = fn() -> u64;

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A misuse of the registration API that the registry refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Graphic registration attempted while the graphic phase is running.
    GraphicRegistrationDuringGraphic,
    /// Unregistration attempted while the layout phase is running.
    UnregisterDuringLayout,
    /// Unregistration attempted while the graphic phase is running.
    UnregisterDuringGraphic,
    /// `perform_update` called from inside a running update.
    ReentrantUpdate,
}

impl ViolationKind {
    /// Returns the stable numeric code used by binary recordings.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::GraphicRegistrationDuringGraphic => 0,
            Self::UnregisterDuringLayout => 1,
            Self::UnregisterDuringGraphic => 2,
            Self::ReentrantUpdate => 3,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::GraphicRegistrationDuringGraphic),
            1 => Some(Self::UnregisterDuringLayout),
            2 => Some(Self::UnregisterDuringGraphic),
            3 => Some(Self::ReentrantUpdate),
            _ => None,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GraphicRegistrationDuringGraphic => {
                "tried to add an element for graphic rebuild while inside a graphic rebuild loop; this is not supported"
            }
            Self::UnregisterDuringLayout => {
                "tried to remove an element from layout rebuild while the layout phase is running"
            }
            Self::UnregisterDuringGraphic => {
                "tried to remove an element from graphic rebuild while the graphic phase is running"
            }
            Self::ReentrantUpdate => "perform_update called while an update is already running",
        })
    }
}

/// Emitted when an element's rebuild returned an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebuildFailure {
    /// Tick during which the failure happened.
    pub tick_index: u64,
    /// Stage that failed.
    pub stage: UpdateStage,
    /// The error the element returned.
    pub error: RebuildError,
    /// Tree path of the failing element, or its address if it has no node.
    pub path: Option<String>,
}

/// Emitted when the registry refuses a registration-API call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractViolation {
    /// Tick counter at the time of the call.
    pub tick_index: u64,
    /// What was refused.
    pub kind: ViolationKind,
    /// Tree path of the element involved, or its address if it has no node.
    /// `None` when the violation is not tied to an element.
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// Profiling markers
// ---------------------------------------------------------------------------

/// Opens the bracket around one `perform_update` call.
#[derive(Clone, Copy, Debug)]
pub struct UpdateBeginEvent {
    /// Tick counter.
    pub tick_index: u64,
    /// Layout queue length before cleanup.
    pub layout_queued: usize,
    /// Graphic queue length before cleanup.
    pub graphic_queued: usize,
    /// Clock reading, or 0 without a clock.
    pub timestamp: u64,
}

/// Closes the bracket around one `perform_update` call.
#[derive(Clone, Copy, Debug)]
pub struct UpdateEndEvent {
    /// Tick counter.
    pub tick_index: u64,
    /// What the tick did.
    pub stats: UpdateStats,
    /// Clock reading, or 0 without a clock.
    pub timestamp: u64,
}

/// Marks the beginning of a tick phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Tick counter.
    pub tick_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Clock reading, or 0 without a clock.
    pub timestamp: u64,
}

/// Marks the end of a tick phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Tick counter.
    pub tick_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Clock reading, or 0 without a clock.
    pub timestamp: u64,
}

/// Marks the beginning of one stage pass over a queue.
#[derive(Clone, Copy, Debug)]
pub struct StageBeginEvent {
    /// Tick counter.
    pub tick_index: u64,
    /// Which stage is starting.
    pub stage: UpdateStage,
    /// Queue length when the stage started.
    pub queued: usize,
    /// Clock reading, or 0 without a clock.
    pub timestamp: u64,
}

/// Marks the end of one stage pass over a queue.
#[derive(Clone, Copy, Debug)]
pub struct StageEndEvent {
    /// Tick counter.
    pub tick_index: u64,
    /// Which stage is ending.
    pub stage: UpdateStage,
    /// Clock reading, or 0 without a clock.
    pub timestamp: u64,
}

/// Counters describing one completed tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Entries purged during cleanup (dropped or destroyed).
    pub cleaned: usize,
    /// Elements in the layout queue when the layout phase finished.
    pub layout_elements: usize,
    /// Elements in the graphic queue when the graphic phase finished.
    pub graphic_elements: usize,
    /// `rebuild` calls made during the layout phase.
    pub layout_rebuilds: usize,
    /// `rebuild` calls made during the graphic phase.
    pub graphic_rebuilds: usize,
    /// `rebuild` calls that returned an error.
    pub failures: usize,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives diagnostics and profiling events from the registry.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about. Sinks must not call back into the
/// registry; events raised while the sink is already running are dropped.
pub trait TraceSink {
    /// Called when an element's rebuild returned an error.
    fn on_rebuild_failed(&mut self, e: &RebuildFailure) {
        _ = e;
    }

    /// Called when a registration-API call was refused.
    fn on_contract_violation(&mut self, e: &ContractViolation) {
        _ = e;
    }

    /// Called when `perform_update` starts (requires `trace` feature).
    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        _ = e;
    }

    /// Called when `perform_update` returns (requires `trace` feature).
    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase (requires `trace` feature).
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase (requires `trace` feature).
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called at the beginning of a stage (requires `trace` feature).
    fn on_stage_begin(&mut self, e: &StageBeginEvent) {
        _ = e;
    }

    /// Called at the end of a stage (requires `trace` feature).
    fn on_stage_end(&mut self, e: &StageEndEvent) {
        _ = e;
    }
}

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// Shares one sink between the registry and the code that inspects it.
///
/// Events that arrive while the cell is already borrowed are dropped.
impl<S: TraceSink + ?Sized> TraceSink for Rc<RefCell<S>> {
    fn on_rebuild_failed(&mut self, e: &RebuildFailure) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_rebuild_failed(e);
        }
    }

    fn on_contract_violation(&mut self, e: &ContractViolation) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_contract_violation(e);
        }
    }

    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_update_begin(e);
        }
    }

    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_update_end(e);
        }
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_phase_begin(e);
        }
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_phase_end(e);
        }
    }

    fn on_stage_begin(&mut self, e: &StageBeginEvent) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_stage_begin(e);
        }
    }

    fn on_stage_end(&mut self, e: &StageEndEvent) {
        if let Ok(mut s) = self.try_borrow_mut() {
            s.on_stage_end(e);
        }
    }
}

/// Delivers every event to both sinks, first `A` then `B`.
impl<A: TraceSink, B: TraceSink> TraceSink for (A, B) {
    fn on_rebuild_failed(&mut self, e: &RebuildFailure) {
        self.0.on_rebuild_failed(e);
        self.1.on_rebuild_failed(e);
    }

    fn on_contract_violation(&mut self, e: &ContractViolation) {
        self.0.on_contract_violation(e);
        self.1.on_contract_violation(e);
    }

    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        self.0.on_update_begin(e);
        self.1.on_update_begin(e);
    }

    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        self.0.on_update_end(e);
        self.1.on_update_end(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.0.on_phase_begin(e);
        self.1.on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.0.on_phase_end(e);
        self.1.on_phase_end(e);
    }

    fn on_stage_begin(&mut self, e: &StageBeginEvent) {
        self.0.on_stage_begin(e);
        self.1.on_stage_begin(e);
    }

    fn on_stage_end(&mut self, e: &StageEndEvent) {
        self.0.on_stage_end(e);
        self.1.on_stage_end(e);
    }
}

// ---------------------------------------------------------------------------
// Tracer
// ---------------------------------------------------------------------------

/// Owns the installed [`TraceSink`] and the optional clock.
///
/// Every method takes `&self` so that the registry can report from inside
/// re-entrant calls. If the sink is already borrowed (it emitted something
/// that led back here), the nested event is dropped.
pub struct Tracer {
    sink: RefCell<Box<dyn TraceSink>>,
    clock: Option<Clock>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("clock", &self.clock.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::none()
    }
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>, clock: Option<Clock>) -> Self {
        Self {
            sink: RefCell::new(sink),
            clock,
        }
    }

    /// Creates a tracer that discards all events.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Box::new(NoopSink), None)
    }

    /// Installs a new sink and returns the previous one.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a sink callback.
    pub fn replace_sink(&self, sink: Box<dyn TraceSink>) -> Box<dyn TraceSink> {
        self.sink.replace(sink)
    }

    /// Reads the clock, or returns 0 without one.
    #[inline]
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.map_or(0, |clock| clock())
    }

    /// Emits a [`RebuildFailure`].
    pub fn rebuild_failed(&self, e: &RebuildFailure) {
        self.dispatch(|s| s.on_rebuild_failed(e));
    }

    /// Emits a [`ContractViolation`].
    pub fn contract_violation(&self, e: &ContractViolation) {
        self.dispatch(|s| s.on_contract_violation(e));
    }

    /// Emits an [`UpdateBeginEvent`].
    #[inline]
    pub fn update_begin(&self, e: &UpdateBeginEvent) {
        #[cfg(feature = "trace")]
        self.dispatch(|s| s.on_update_begin(e));
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`UpdateEndEvent`].
    #[inline]
    pub fn update_end(&self, e: &UpdateEndEvent) {
        #[cfg(feature = "trace")]
        self.dispatch(|s| s.on_update_end(e));
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        self.dispatch(|s| s.on_phase_begin(e));
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        self.dispatch(|s| s.on_phase_end(e));
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`StageBeginEvent`].
    #[inline]
    pub fn stage_begin(&self, e: &StageBeginEvent) {
        #[cfg(feature = "trace")]
        self.dispatch(|s| s.on_stage_begin(e));
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`StageEndEvent`].
    #[inline]
    pub fn stage_end(&self, e: &StageEndEvent) {
        #[cfg(feature = "trace")]
        self.dispatch(|s| s.on_stage_end(e));
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    fn dispatch(&self, f: impl FnOnce(&mut dyn TraceSink)) {
        if let Ok(mut sink) = self.sink.try_borrow_mut() {
            f(&mut **sink);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
