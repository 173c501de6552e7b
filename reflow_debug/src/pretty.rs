// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in microseconds. Stage markers are only printed when
//! [`with_stages`](PrettyPrintSink::with_stages) is enabled, since they
//! dominate the output.

use std::io::Write;

use reflow_core::trace::{
    ContractViolation, PhaseBeginEvent, PhaseEndEvent, RebuildFailure, StageBeginEvent,
    StageEndEvent, TraceSink, UpdateBeginEvent, UpdateEndEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    stages: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            stages: false,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            stages: false,
        }
    }

    /// Also prints a line for every stage begin and end.
    #[must_use]
    pub fn with_stages(mut self, stages: bool) -> Self {
        self.stages = stages;
        self
    }

    /// Consumes the sink and returns the destination.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_rebuild_failed(&mut self, e: &RebuildFailure) {
        let _ = writeln!(
            self.writer,
            "[failed] tick={} stage={} element={}: {}",
            e.tick_index,
            e.stage,
            e.path.as_deref().unwrap_or("<detached>"),
            e.error,
        );
    }

    fn on_contract_violation(&mut self, e: &ContractViolation) {
        let _ = writeln!(
            self.writer,
            "[violation] tick={} element={}: {}",
            e.tick_index,
            e.path.as_deref().unwrap_or("<unknown>"),
            e.kind,
        );
    }

    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[update:begin] tick={} layout={} graphic={} at {:.1}µs",
            e.tick_index,
            e.layout_queued,
            e.graphic_queued,
            nanos_to_us(e.timestamp),
        );
    }

    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        let s = &e.stats;
        let _ = writeln!(
            self.writer,
            "[update:end] tick={} cleaned={} layout={}/{} graphic={}/{} \
             failures={} at {:.1}µs",
            e.tick_index,
            s.cleaned,
            s.layout_elements,
            s.layout_rebuilds,
            s.graphic_elements,
            s.graphic_rebuilds,
            s.failures,
            nanos_to_us(e.timestamp),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] tick={} {} at {:.1}µs",
            e.tick_index,
            e.phase.name(),
            nanos_to_us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] tick={} {} at {:.1}µs",
            e.tick_index,
            e.phase.name(),
            nanos_to_us(e.timestamp),
        );
    }

    fn on_stage_begin(&mut self, e: &StageBeginEvent) {
        if !self.stages {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[stage:begin] tick={} {} queued={} at {:.1}µs",
            e.tick_index,
            e.stage,
            e.queued,
            nanos_to_us(e.timestamp),
        );
    }

    fn on_stage_end(&mut self, e: &StageEndEvent) {
        if !self.stages {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[stage:end] tick={} {} at {:.1}µs",
            e.tick_index,
            e.stage,
            nanos_to_us(e.timestamp),
        );
    }
}
