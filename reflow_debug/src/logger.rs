// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forwarding to the [`log`] facade.
//!
//! [`LogSink`] reports rebuild failures and contract violations at
//! `error` level, update brackets at `debug`, and phase and stage markers at
//! `trace`. All records use the `reflow` target.

use reflow_core::trace::{
    ContractViolation, PhaseBeginEvent, PhaseEndEvent, RebuildFailure, StageBeginEvent,
    StageEndEvent, TraceSink, UpdateBeginEvent, UpdateEndEvent,
};

const TARGET: &str = "reflow";

/// A [`TraceSink`] that emits `log` records.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn on_rebuild_failed(&mut self, e: &RebuildFailure) {
        log::error!(
            target: TARGET,
            "{} rebuild of {} failed on tick {}: {}",
            e.stage,
            e.path.as_deref().unwrap_or("<detached element>"),
            e.tick_index,
            e.error,
        );
    }

    fn on_contract_violation(&mut self, e: &ContractViolation) {
        match e.path.as_deref() {
            Some(path) => log::error!(target: TARGET, "{} ({path})", e.kind),
            None => log::error!(target: TARGET, "{}", e.kind),
        }
    }

    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        log::debug!(
            target: TARGET,
            "tick {}: {} layout, {} graphic queued",
            e.tick_index,
            e.layout_queued,
            e.graphic_queued,
        );
    }

    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        log::debug!(
            target: TARGET,
            "tick {} done: {} cleaned, {} + {} rebuilds, {} failed",
            e.tick_index,
            e.stats.cleaned,
            e.stats.layout_rebuilds,
            e.stats.graphic_rebuilds,
            e.stats.failures,
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        log::trace!(target: TARGET, "tick {}: {} begin", e.tick_index, e.phase.name());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        log::trace!(target: TARGET, "tick {}: {} end", e.tick_index, e.phase.name());
    }

    fn on_stage_begin(&mut self, e: &StageBeginEvent) {
        log::trace!(
            target: TARGET,
            "tick {}: {} begin ({} queued)",
            e.tick_index,
            e.stage,
            e.queued,
        );
    }

    fn on_stage_end(&mut self, e: &StageEndEvent) {
        log::trace!(target: TARGET, "tick {}: {} end", e.tick_index, e.stage);
    }
}
