//! Voice-session glue for the Chorus agent.
//!
//! Integrates with LiveKit for WebRTC/telephony transport and drives
//! the per-call latency instrumentation: every pipeline callback the
//! session runtime fires (speech detected, STT, LLM, TTS, audio
//! delivered) is translated into a tracker mark by [`VoiceSession`].
//!
//! Two local answer tiers sit in front of the LLM: [`ScriptedReplies`]
//! for canned keyword responses and [`KnowledgeBase`] for retrieval
//! lookups. Either answers a turn without an inference pass.

pub mod config;
pub mod error;
pub mod knowledge;
pub mod scripted;
pub mod service;
pub mod session;

pub use config::{LiveKitConfig, PipelineConfig};
pub use error::VoiceError;
pub use knowledge::{Answer, KnowledgeBase};
pub use scripted::{ScriptedReplies, ScriptedRule};
pub use service::RoomService;
pub use session::{TurnOutcome, VoiceSession};
