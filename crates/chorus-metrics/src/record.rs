//! Per-call pipeline timing record.
//!
//! A [`LatencyRecord`] holds one absolute timestamp per pipeline stage
//! transition, taken from a process-wide monotonic clock. Timestamps are
//! seconds as `f64`, giving sub-millisecond precision over any realistic
//! process lifetime. A stage that has not been marked yet stays at the
//! [`UNSET`] sentinel.
//!
//! Derived latencies are computed on demand and never stored. They are
//! pure subtraction with no validation: if either endpoint of a stage is
//! still at the sentinel, the derived value is meaningless (typically a
//! large negative number). Callers that need fail-fast behavior use the
//! tracker's strict mode instead of checking timestamps here.

use std::sync::OnceLock;
use std::time::Instant;

/// Sentinel value for a stage timestamp that has not been recorded.
pub const UNSET: f64 = 0.0;

/// Anchor for the process-wide monotonic clock.
static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Returns seconds elapsed on the process monotonic clock.
///
/// The first call anchors the clock; all later readings are strictly
/// non-decreasing and unaffected by wall-clock adjustments.
pub fn monotonic_secs() -> f64 {
    CLOCK_ANCHOR
        .get_or_init(Instant::now)
        .elapsed()
        .as_secs_f64()
}

/// Stage timestamps for one tracked call.
///
/// Fields are public so the session runtime (and tests) can inspect them;
/// mutation during a call goes through the tracker's mark operations.
/// Once a call ends the record moves into history and is never mutated
/// again.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyRecord {
    /// When speech was first detected (set at call start).
    pub speech_start: f64,
    pub stt_start: f64,
    pub stt_end: f64,
    pub llm_start: f64,
    pub llm_end: f64,
    pub tts_start: f64,
    pub tts_end: f64,
    /// When synthesized audio reached the caller.
    pub audio_delivered: f64,
}

impl LatencyRecord {
    /// Creates a record with `speech_start` set to now and every other
    /// stage at the [`UNSET`] sentinel.
    pub fn new() -> Self {
        Self {
            speech_start: monotonic_secs(),
            ..Self::default()
        }
    }

    /// Speech-to-text stage latency in milliseconds.
    pub fn stt_latency_ms(&self) -> f64 {
        (self.stt_end - self.stt_start) * 1000.0
    }

    /// LLM stage latency in milliseconds.
    pub fn llm_latency_ms(&self) -> f64 {
        (self.llm_end - self.llm_start) * 1000.0
    }

    /// Text-to-speech stage latency in milliseconds.
    pub fn tts_latency_ms(&self) -> f64 {
        (self.tts_end - self.tts_start) * 1000.0
    }

    /// End-to-end latency from speech detection to audio delivery, in
    /// milliseconds.
    pub fn end_to_end_latency_ms(&self) -> f64 {
        (self.audio_delivered - self.speech_start) * 1000.0
    }
}
