// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, logging, and Chrome trace export for reflow
//! diagnostics.
//!
//! This crate provides [`TraceSink`](reflow_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`] — human-readable one-line-per-event output.
//! - [`logger::LogSink`] — forwards events to the `log` facade.
//! - [`recorder::RecorderSink`] — compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`] — writes Chrome Trace Event Format JSON from
//!   recorded bytes.

pub mod chrome;
pub mod logger;
pub mod pretty;
pub mod recorder;
