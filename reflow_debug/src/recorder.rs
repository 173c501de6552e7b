// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records. Counts are stored as `u32`; paths and
//! error messages as a `u32` byte length followed by UTF-8. [`decode`] reads
//! the records back as an iterator of [`RecordedEvent`].

use reflow_core::element::RebuildError;
use reflow_core::stage::{PhaseKind, UpdateStage};
use reflow_core::trace::{
    ContractViolation, PhaseBeginEvent, PhaseEndEvent, RebuildFailure, StageBeginEvent,
    StageEndEvent, TraceSink, UpdateBeginEvent, UpdateEndEvent, UpdateStats, ViolationKind,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_UPDATE_BEGIN: u8 = 1;
const TAG_UPDATE_END: u8 = 2;
const TAG_PHASE_BEGIN: u8 = 3;
const TAG_PHASE_END: u8 = 4;
const TAG_STAGE_BEGIN: u8 = 5;
const TAG_STAGE_END: u8 = 6;
const TAG_REBUILD_FAILED: u8 = 7;
const TAG_CONTRACT_VIOLATION: u8 = 8;

const ERROR_FAILED: u8 = 0;
const ERROR_MISSING_DEPENDENCY: u8 = 1;
const ERROR_INVALID_GEOMETRY: u8 = 2;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Discards everything recorded so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, n: usize) {
        self.write_u32(u32::try_from(n).unwrap_or(u32::MAX));
    }

    fn write_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u32::MAX as usize);
        self.write_count(len);
        self.buf.extend_from_slice(&bytes[..len]);
    }

    fn write_option_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.write_u8(1);
                self.write_str(s);
            }
            None => self.write_u8(0),
        }
    }

    fn write_error(&mut self, e: &RebuildError) {
        let (code, text) = match e {
            RebuildError::Failed { reason } => (ERROR_FAILED, reason),
            RebuildError::MissingDependency { what } => (ERROR_MISSING_DEPENDENCY, what),
            RebuildError::InvalidGeometry { detail } => (ERROR_INVALID_GEOMETRY, detail),
        };
        self.write_u8(code);
        self.write_str(text);
    }

    fn write_stats(&mut self, s: &UpdateStats) {
        self.write_count(s.cleaned);
        self.write_count(s.layout_elements);
        self.write_count(s.graphic_elements);
        self.write_count(s.layout_rebuilds);
        self.write_count(s.graphic_rebuilds);
        self.write_count(s.failures);
    }
}

impl TraceSink for RecorderSink {
    fn on_rebuild_failed(&mut self, e: &RebuildFailure) {
        self.write_u8(TAG_REBUILD_FAILED);
        self.write_u64(e.tick_index);
        self.write_u8(e.stage.index());
        self.write_error(&e.error);
        self.write_option_str(e.path.as_deref());
    }

    fn on_contract_violation(&mut self, e: &ContractViolation) {
        self.write_u8(TAG_CONTRACT_VIOLATION);
        self.write_u64(e.tick_index);
        self.write_u8(e.kind.code());
        self.write_option_str(e.path.as_deref());
    }

    fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
        self.write_u8(TAG_UPDATE_BEGIN);
        self.write_u64(e.tick_index);
        self.write_count(e.layout_queued);
        self.write_count(e.graphic_queued);
        self.write_u64(e.timestamp);
    }

    fn on_update_end(&mut self, e: &UpdateEndEvent) {
        self.write_u8(TAG_UPDATE_END);
        self.write_u64(e.tick_index);
        self.write_stats(&e.stats);
        self.write_u64(e.timestamp);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.tick_index);
        self.write_u8(e.phase.index());
        self.write_u64(e.timestamp);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.tick_index);
        self.write_u8(e.phase.index());
        self.write_u64(e.timestamp);
    }

    fn on_stage_begin(&mut self, e: &StageBeginEvent) {
        self.write_u8(TAG_STAGE_BEGIN);
        self.write_u64(e.tick_index);
        self.write_u8(e.stage.index());
        self.write_count(e.queued);
        self.write_u64(e.timestamp);
    }

    fn on_stage_end(&mut self, e: &StageEndEvent) {
        self.write_u8(TAG_STAGE_END);
        self.write_u64(e.tick_index);
        self.write_u8(e.stage.index());
        self.write_u64(e.timestamp);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// An [`UpdateBeginEvent`].
    UpdateBegin(UpdateBeginEvent),
    /// An [`UpdateEndEvent`].
    UpdateEnd(UpdateEndEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`StageBeginEvent`].
    StageBegin(StageBeginEvent),
    /// A [`StageEndEvent`].
    StageEnd(StageEndEvent),
    /// A [`RebuildFailure`].
    RebuildFailed(RebuildFailure),
    /// A [`ContractViolation`].
    ContractViolation(ContractViolation),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first truncated or unrecognized record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u32()?).ok()
    }

    fn read_string(&mut self) -> Option<String> {
        let len = self.read_count()?;
        String::from_utf8(self.take(len)?.to_vec()).ok()
    }

    fn read_option_string(&mut self) -> Option<Option<String>> {
        match self.read_u8()? {
            0 => Some(None),
            _ => Some(Some(self.read_string()?)),
        }
    }

    fn read_stage(&mut self) -> Option<UpdateStage> {
        UpdateStage::from_index(self.read_u8()?)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        PhaseKind::from_index(self.read_u8()?)
    }

    fn read_error(&mut self) -> Option<RebuildError> {
        let code = self.read_u8()?;
        let text = self.read_string()?.into();
        Some(match code {
            ERROR_FAILED => RebuildError::Failed { reason: text },
            ERROR_MISSING_DEPENDENCY => RebuildError::MissingDependency { what: text },
            ERROR_INVALID_GEOMETRY => RebuildError::InvalidGeometry { detail: text },
            _ => return None,
        })
    }

    fn read_stats(&mut self) -> Option<UpdateStats> {
        Some(UpdateStats {
            cleaned: self.read_count()?,
            layout_elements: self.read_count()?,
            graphic_elements: self.read_count()?,
            layout_rebuilds: self.read_count()?,
            graphic_rebuilds: self.read_count()?,
            failures: self.read_count()?,
        })
    }

    fn decode_update_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::UpdateBegin(UpdateBeginEvent {
            tick_index: self.read_u64()?,
            layout_queued: self.read_count()?,
            graphic_queued: self.read_count()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_update_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::UpdateEnd(UpdateEndEvent {
            tick_index: self.read_u64()?,
            stats: self.read_stats()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            tick_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            tick_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_stage_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::StageBegin(StageBeginEvent {
            tick_index: self.read_u64()?,
            stage: self.read_stage()?,
            queued: self.read_count()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_stage_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::StageEnd(StageEndEvent {
            tick_index: self.read_u64()?,
            stage: self.read_stage()?,
            timestamp: self.read_u64()?,
        }))
    }

    fn decode_rebuild_failed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RebuildFailed(RebuildFailure {
            tick_index: self.read_u64()?,
            stage: self.read_stage()?,
            error: self.read_error()?,
            path: self.read_option_string()?,
        }))
    }

    fn decode_contract_violation(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ContractViolation(ContractViolation {
            tick_index: self.read_u64()?,
            kind: ViolationKind::from_code(self.read_u8()?)?,
            path: self.read_option_string()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_UPDATE_BEGIN => self.decode_update_begin(),
            TAG_UPDATE_END => self.decode_update_end(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_STAGE_BEGIN => self.decode_stage_begin(),
            TAG_STAGE_END => self.decode_stage_end(),
            TAG_REBUILD_FAILED => self.decode_rebuild_failed(),
            TAG_CONTRACT_VIOLATION => self.decode_contract_violation(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
