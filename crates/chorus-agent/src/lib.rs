//! Chorus agent library logic.
//!
//! Assembles the metrics runtime and the voice-session layer from one
//! [`Config`] and tears both down in order on shutdown. The binary in
//! `main.rs` is a thin wrapper around [`Agent::start`].

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use chorus_metrics::{CallTracker, MetricsError, MetricsRuntime};
use chorus_voice::{RoomService, VoiceError, VoiceSession};

use config::Config;

/// A running agent: the metrics runtime plus the room service, with the
/// tracker shared between them.
pub struct Agent {
    metrics: MetricsRuntime,
    rooms: Arc<RoomService>,
}

impl Agent {
    /// Starts the metrics runtime (binding the exposition listener,
    /// spawning the system sampler) and constructs the room service.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Bind`] if the exposition port is taken.
    /// Metrics are part of the product's SLA, so the agent refuses to
    /// start without them.
    pub async fn start(config: &Config) -> Result<Self, MetricsError> {
        let metrics = MetricsRuntime::start(&config.metrics.to_metrics_config()).await?;
        let rooms = Arc::new(RoomService::new(config.livekit.clone()));

        if !rooms.is_enabled() {
            tracing::warn!("LiveKit URL not configured, room operations disabled");
        }

        tracing::info!(
            metrics_addr = %metrics.local_addr(),
            stt = %config.pipeline.stt_model,
            llm = %config.pipeline.llm_model,
            tts = %config.pipeline.tts_voice,
            "chorus agent started"
        );

        Ok(Self { metrics, rooms })
    }

    /// The shared call tracker.
    pub fn tracker(&self) -> Arc<CallTracker> {
        self.metrics.tracker()
    }

    /// The LiveKit room service.
    pub fn rooms(&self) -> Arc<RoomService> {
        self.rooms.clone()
    }

    /// Address of the metrics exposition endpoint.
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics.local_addr()
    }

    /// Opens a tracked voice session for a room.
    pub fn begin_session(&self, room_name: &str) -> Result<VoiceSession, VoiceError> {
        VoiceSession::begin(room_name, self.metrics.tracker())
    }

    /// Stops the sampler and the exposition listener.
    pub async fn shutdown(self) {
        self.metrics.shutdown().await;
        tracing::info!("chorus agent shut down");
    }
}
