//! Transport credentials and speech-pipeline provider selection.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_token_ttl_secs() -> u64 {
    3600
}

/// LiveKit server credentials for the telephony/room transport.
///
/// The API secret signs join tokens, so it is excluded from serialized
/// output and from `Debug` formatting; a config dumped into a log never
/// carries it.
#[derive(Clone, Deserialize, Serialize)]
pub struct LiveKitConfig {
    /// Server URL, e.g. `ws://localhost:7880`. Leaving it empty
    /// disables room operations.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// Lifetime of minted join tokens, in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl LiveKitConfig {
    pub fn new(url: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            url: url.to_owned(),
            api_key: api_key.to_owned(),
            api_secret: api_secret.to_owned(),
            ..Self::default()
        }
    }

    /// Lifetime of minted join tokens.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // api_secret is deliberately absent.
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish_non_exhaustive()
    }
}

fn default_stt_model() -> String {
    "assemblyai/universal-streaming:en".to_string()
}

fn default_llm_model() -> String {
    "openai/gpt-4.1-mini".to_string()
}

fn default_tts_voice() -> String {
    "cartesia/sonic-2".to_string()
}

fn default_vad_enabled() -> bool {
    true
}

fn default_greeting() -> String {
    "Greet the user and offer your assistance.".to_string()
}

/// Provider descriptors for the speech pipeline. The actual providers
/// live in the session runtime; these strings select which ones it
/// loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Speech-to-text provider and model.
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// LLM provider and model.
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Text-to-speech provider and voice.
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,

    /// Whether voice activity detection gates the pipeline.
    #[serde(default = "default_vad_enabled")]
    pub vad_enabled: bool,

    /// Instruction for the opening reply of each call.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stt_model: default_stt_model(),
            llm_model: default_llm_model(),
            tts_voice: default_tts_voice(),
            vad_enabled: default_vad_enabled(),
            greeting: default_greeting(),
        }
    }
}
