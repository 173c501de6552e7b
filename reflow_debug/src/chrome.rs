// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Updates, phases, and stages become nested duration events on one track.
//! Failures and violations carry no timestamp of their own, so they are
//! placed at the most recent timestamp seen in the recording.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// # Errors
///
/// Returns any error raised while writing to `writer`.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut last_ts = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::UpdateBegin(e) => {
                last_ts = nanos_to_us(e.timestamp);
                events.push(json!({
                    "ph": "B",
                    "name": "Update",
                    "cat": "Tick",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick_index": e.tick_index,
                        "layout_queued": e.layout_queued,
                        "graphic_queued": e.graphic_queued,
                    }
                }));
            }
            RecordedEvent::UpdateEnd(e) => {
                last_ts = nanos_to_us(e.timestamp);
                events.push(json!({
                    "ph": "E",
                    "name": "Update",
                    "cat": "Tick",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick_index": e.tick_index,
                        "cleaned": e.stats.cleaned,
                        "layout_elements": e.stats.layout_elements,
                        "graphic_elements": e.stats.graphic_elements,
                        "layout_rebuilds": e.stats.layout_rebuilds,
                        "graphic_rebuilds": e.stats.graphic_rebuilds,
                        "failures": e.stats.failures,
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                last_ts = nanos_to_us(e.timestamp);
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.name(),
                    "cat": "Phase",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick_index": e.tick_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                last_ts = nanos_to_us(e.timestamp);
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.name(),
                    "cat": "Phase",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick_index": e.tick_index,
                    }
                }));
            }
            RecordedEvent::StageBegin(e) => {
                last_ts = nanos_to_us(e.timestamp);
                events.push(json!({
                    "ph": "B",
                    "name": e.stage.name(),
                    "cat": "Stage",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick_index": e.tick_index,
                        "queued": e.queued,
                    }
                }));
            }
            RecordedEvent::StageEnd(e) => {
                last_ts = nanos_to_us(e.timestamp);
                events.push(json!({
                    "ph": "E",
                    "name": e.stage.name(),
                    "cat": "Stage",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "tick_index": e.tick_index,
                    }
                }));
            }
            RecordedEvent::RebuildFailed(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RebuildFailed",
                    "cat": "Diagnostics",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "tick_index": e.tick_index,
                        "stage": e.stage.name(),
                        "element": e.path,
                        "error": e.error.to_string(),
                    }
                }));
            }
            RecordedEvent::ContractViolation(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "ContractViolation",
                    "cat": "Diagnostics",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "tick_index": e.tick_index,
                        "kind": format!("{:?}", e.kind),
                        "element": e.path,
                        "message": e.kind.to_string(),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}
