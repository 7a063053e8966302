//! Lifecycle tracking for in-flight calls.
//!
//! The tracker owns the map of active calls and mediates every stage
//! transition. The session runtime calls `start_call` when speech is
//! detected, the `mark_*` operations as pipeline stages begin and end,
//! and `end_call` when the call tears down; at that point the record is
//! finalized into the sink and retained in history.
//!
//! Marks are expected to arrive in pipeline order but nothing enforces
//! it: an out-of-order or missing mark produces a meaningless derived
//! latency rather than an error. Likewise a mark for an unknown call id
//! is tolerated, so events that race past call teardown are harmless.
//! [`ValidationMode::Strict`] turns both cases into errors for tests and
//! deployments that prefer fail-fast behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::history::{CallHistory, LatencyStats};
use crate::record::{monotonic_secs, LatencyRecord};
use crate::sink::{MetricsSink, LATENCY_TARGET_MS};

/// How the tracker treats unknown call ids and duplicate starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Unknown ids are silent no-ops; a duplicate `start_call` replaces
    /// the prior record with a warning. Matches what a busy session
    /// runtime needs: late or duplicate events must never fail the call
    /// path.
    #[default]
    Lenient,
    /// Unknown ids and duplicate starts are reported as errors.
    Strict,
}

/// Errors surfaced only in [`ValidationMode::Strict`].
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// A mark or end arrived for a call id with no active record.
    #[error("no active call with id {0}")]
    StaleOrMissingMark(String),

    /// `start_call` was given an id that is already being tracked.
    #[error("call id {0} is already being tracked")]
    DuplicateCall(String),
}

/// Audio-quality figures supplied at call end. Each is optional; absent
/// values are simply not observed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualitySample {
    /// Mean Opinion Score, typically 1.0–5.0.
    pub mos_score: Option<f64>,
    /// Audio jitter in milliseconds.
    pub jitter_ms: Option<f64>,
    /// Packet loss rate as a percentage.
    pub packet_loss_rate: Option<f64>,
}

/// Tracks active calls and finalizes completed ones into the sink.
///
/// Both locks guard brief map operations that never span an `.await`
/// point, making synchronous locks safe here and cheaper than their
/// tokio counterparts.
pub struct CallTracker {
    active: RwLock<HashMap<String, LatencyRecord>>,
    history: Mutex<CallHistory>,
    sink: Arc<MetricsSink>,
    mode: ValidationMode,
}

impl CallTracker {
    /// Creates a tracker in [`ValidationMode::Lenient`].
    pub fn new(sink: Arc<MetricsSink>) -> Self {
        Self::with_mode(sink, ValidationMode::Lenient)
    }

    pub fn with_mode(sink: Arc<MetricsSink>, mode: ValidationMode) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: Mutex::new(CallHistory::new()),
            sink,
            mode,
        }
    }

    /// Begins tracking a new call and returns the created record.
    ///
    /// In lenient mode a duplicate id replaces the prior record,
    /// discarding its partial timing; strict mode rejects it with
    /// [`TrackError::DuplicateCall`].
    pub fn start_call(&self, call_id: &str) -> Result<LatencyRecord, TrackError> {
        let record = LatencyRecord::new();

        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.contains_key(call_id) {
            if self.mode == ValidationMode::Strict {
                return Err(TrackError::DuplicateCall(call_id.to_string()));
            }
            tracing::warn!(call_id, "duplicate call id, replacing prior record");
        }
        active.insert(call_id.to_string(), record);
        self.sink.total_calls.inc();
        self.sink.active_calls.set(active.len() as f64);
        drop(active);

        tracing::info!(call_id, "started tracking call");
        Ok(record)
    }

    pub fn mark_stt_start(&self, call_id: &str) -> Result<(), TrackError> {
        self.mark(call_id, |r| r.stt_start = monotonic_secs())
    }

    pub fn mark_stt_end(&self, call_id: &str) -> Result<(), TrackError> {
        self.mark(call_id, |r| r.stt_end = monotonic_secs())
    }

    pub fn mark_llm_start(&self, call_id: &str) -> Result<(), TrackError> {
        self.mark(call_id, |r| r.llm_start = monotonic_secs())
    }

    pub fn mark_llm_end(&self, call_id: &str) -> Result<(), TrackError> {
        self.mark(call_id, |r| r.llm_end = monotonic_secs())
    }

    pub fn mark_tts_start(&self, call_id: &str) -> Result<(), TrackError> {
        self.mark(call_id, |r| r.tts_start = monotonic_secs())
    }

    pub fn mark_tts_end(&self, call_id: &str) -> Result<(), TrackError> {
        self.mark(call_id, |r| r.tts_end = monotonic_secs())
    }

    pub fn mark_audio_delivered(&self, call_id: &str) -> Result<(), TrackError> {
        self.mark(call_id, |r| r.audio_delivered = monotonic_secs())
    }

    /// Stops tracking `call_id`, finalizes its record into the sink and
    /// history, and observes any supplied quality figures.
    pub fn end_call(&self, call_id: &str, quality: QualitySample) -> Result<(), TrackError> {
        let removed = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            let removed = active.remove(call_id);
            if removed.is_some() {
                self.sink.active_calls.set(active.len() as f64);
            }
            removed
        };

        match removed {
            Some(record) => {
                self.finalize(call_id, record, quality);
                Ok(())
            }
            None => self.unknown(call_id),
        }
    }

    /// Stops tracking a call without observing it.
    ///
    /// For teardown of a call whose setup failed after `start_call`:
    /// the partial record is dropped rather than finalized, so a
    /// half-initialized call never lands in the latency series or the
    /// history buffer.
    pub fn discard_call(&self, call_id: &str) -> Result<(), TrackError> {
        let removed = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            let removed = active.remove(call_id);
            if removed.is_some() {
                self.sink.active_calls.set(active.len() as f64);
            }
            removed
        };

        match removed {
            Some(_) => {
                tracing::info!(call_id, "discarded call without finalizing");
                Ok(())
            }
            None => self.unknown(call_id),
        }
    }

    /// Counts a call that failed before a record could track it.
    pub fn record_failed_call_setup(&self) {
        self.sink.failed_call_setup.inc();
    }

    /// Number of calls currently being tracked.
    pub fn active_call_count(&self) -> usize {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Latency summary over the most recently completed calls.
    pub fn latency_stats(&self) -> LatencyStats {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latency_stats()
    }

    /// Snapshot of an active call's record, if present.
    pub fn active_record(&self, call_id: &str) -> Option<LatencyRecord> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(call_id)
            .copied()
    }

    /// Most recently completed record still retained in history.
    pub(crate) fn latest_completed(&self) -> Option<LatencyRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest()
            .copied()
    }

    /// Number of completed records currently retained.
    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn mark(
        &self,
        call_id: &str,
        set: impl FnOnce(&mut LatencyRecord),
    ) -> Result<(), TrackError> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        match active.get_mut(call_id) {
            Some(record) => {
                set(record);
                Ok(())
            }
            None => self.unknown(call_id),
        }
    }

    fn unknown(&self, call_id: &str) -> Result<(), TrackError> {
        match self.mode {
            ValidationMode::Strict => Err(TrackError::StaleOrMissingMark(call_id.to_string())),
            ValidationMode::Lenient => {
                tracing::debug!(call_id, "event for unknown call id, ignoring");
                Ok(())
            }
        }
    }

    /// Observes a completed record into every instrument and retains it.
    pub(crate) fn finalize(&self, call_id: &str, record: LatencyRecord, quality: QualitySample) {
        let end_to_end = record.end_to_end_latency_ms();
        self.sink.end_to_end_latency.observe(end_to_end);
        self.sink.response_time_avg.observe(end_to_end);
        self.sink.response_time_95p.observe(end_to_end);

        self.sink.stt_latency.observe(record.stt_latency_ms());
        self.sink.llm_latency.observe(record.llm_latency_ms());
        self.sink.tts_latency.observe(record.tts_latency_ms());

        if end_to_end < LATENCY_TARGET_MS {
            self.sink.latency_target_met.inc();
        } else {
            self.sink.latency_target_missed.inc();
        }

        if let Some(mos) = quality.mos_score {
            self.sink.mos_score.observe(mos);
        }
        if let Some(jitter) = quality.jitter_ms {
            self.sink.jitter_ms.observe(jitter);
        }
        if let Some(loss) = quality.packet_loss_rate {
            self.sink.packet_loss_rate.observe(loss);
        }

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);

        tracing::info!(call_id, end_to_end_ms = end_to_end, "ended call");
    }
}
