//! Per-call session driver.
//!
//! A [`VoiceSession`] is created when a participant joins a room and
//! torn down when the call ends. It owns the call id and translates the
//! runtime's pipeline callbacks into tracker marks, so the runtime never
//! touches the metrics crate directly.
//!
//! The tracker runs lenient by default, so a callback that fires after
//! teardown (providers flush asynchronously) is absorbed as a no-op
//! rather than failing the session.

use std::sync::Arc;

use chorus_metrics::{CallTracker, QualitySample};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::VoiceError;
use crate::knowledge::KnowledgeBase;
use crate::scripted::ScriptedReplies;

/// How a user turn was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// A scripted rule matched; speak `reply` without an LLM pass.
    Scripted { reply: String },
    /// The knowledge base answered; speak `reply`, crediting `source`.
    Knowledge { reply: String, source: String },
    /// No local answer; the default LLM pipeline handles the turn.
    Forward,
}

/// One tracked voice interaction, from speech detection to audio
/// delivery.
pub struct VoiceSession {
    call_id: String,
    tracker: Arc<CallTracker>,
    scripted: ScriptedReplies,
    knowledge: KnowledgeBase,
}

impl VoiceSession {
    /// Starts tracking a call for `room_name`.
    ///
    /// The call id is namespaced with a fresh UUID so two sessions in
    /// the same room can never collide in the tracker.
    pub fn begin(room_name: &str, tracker: Arc<CallTracker>) -> Result<Self, VoiceError> {
        let call_id = format!("call_{}_{}", room_name, Uuid::new_v4().simple());

        if let Err(e) = tracker.start_call(&call_id) {
            tracker.record_failed_call_setup();
            return Err(VoiceError::Session(e.to_string()));
        }

        info!(call_id = %call_id, room = room_name, "voice session started");

        Ok(Self {
            call_id,
            tracker,
            scripted: ScriptedReplies::new(),
            knowledge: KnowledgeBase::new(),
        })
    }

    /// Replaces the stock scripted rules.
    pub fn with_scripted(mut self, scripted: ScriptedReplies) -> Self {
        self.scripted = scripted;
        self
    }

    /// Installs a knowledge base consulted after the scripted rules.
    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Speech-to-text began transcribing the user's utterance.
    pub fn on_stt_started(&self) {
        let _ = self.tracker.mark_stt_start(&self.call_id);
    }

    /// Transcription is final.
    pub fn on_stt_completed(&self) {
        let _ = self.tracker.mark_stt_end(&self.call_id);
    }

    /// A completed user turn is ready to answer.
    ///
    /// Checks the scripted rules, then the knowledge base; a hit on
    /// either answers the turn directly and the LLM stage collapses to
    /// the lookup itself. Otherwise the turn is forwarded to the LLM
    /// and the caller reports completion via [`on_llm_completed`].
    ///
    /// [`on_llm_completed`]: VoiceSession::on_llm_completed
    pub fn on_user_turn_completed(&self, user_text: &str) -> TurnOutcome {
        let _ = self.tracker.mark_llm_start(&self.call_id);

        if let Some(reply) = self.scripted.reply_for(user_text) {
            // Synthesis starts immediately; there is no model pass.
            let _ = self.tracker.mark_tts_start(&self.call_id);
            let _ = self.tracker.mark_llm_end(&self.call_id);
            return TurnOutcome::Scripted {
                reply: reply.to_string(),
            };
        }

        if let Some(answer) = self.knowledge.search(user_text) {
            let _ = self.tracker.mark_tts_start(&self.call_id);
            let _ = self.tracker.mark_llm_end(&self.call_id);
            return TurnOutcome::Knowledge {
                reply: answer.text,
                source: answer.source,
            };
        }

        TurnOutcome::Forward
    }

    /// The LLM finished generating the reply for a forwarded turn.
    pub fn on_llm_completed(&self) {
        let _ = self.tracker.mark_llm_end(&self.call_id);
    }

    /// Text-to-speech began synthesizing the reply.
    pub fn on_tts_started(&self) {
        let _ = self.tracker.mark_tts_start(&self.call_id);
    }

    /// Synthesized audio has been published to the caller.
    pub fn on_tts_completed(&self) {
        let _ = self.tracker.mark_tts_end(&self.call_id);
        let _ = self.tracker.mark_audio_delivered(&self.call_id);
    }

    /// Ends the call normally, attaching any quality figures the
    /// transport reported.
    pub fn finish(self, quality: QualitySample) {
        let _ = self.tracker.end_call(&self.call_id, quality);
        info!(call_id = %self.call_id, "voice session finished");
    }

    /// Tears down a session whose setup failed partway.
    ///
    /// Counts the failed setup and drops the partial record without
    /// observing it, so a half-initialized call never skews the latency
    /// series.
    pub fn abort(self) {
        warn!(call_id = %self.call_id, "voice session aborted during setup");
        self.tracker.record_failed_call_setup();
        let _ = self.tracker.discard_call(&self.call_id);
    }
}
