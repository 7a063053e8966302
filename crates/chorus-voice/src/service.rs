//! Server-side LiveKit room management.
//!
//! Creates rooms, mints join tokens, and removes participants for
//! telephony sessions. Everything here goes through the LiveKit server
//! API; media never flows through this process.

use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;

use crate::config::LiveKitConfig;
use crate::error::VoiceError;

#[derive(Debug)]
pub struct RoomService {
    config: LiveKitConfig,
    client: RoomClient,
}

impl RoomService {
    pub fn new(config: LiveKitConfig) -> Self {
        let client = RoomClient::with_api_key(&config.url, &config.api_key, &config.api_secret);
        Self { config, client }
    }

    /// Room operations stay disabled until a LiveKit URL is configured.
    pub fn is_enabled(&self) -> bool {
        !self.config.url.is_empty()
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Creates `name` on the LiveKit server. Creating a name that
    /// already exists returns the existing room.
    pub async fn create_room(&self, name: &str) -> Result<Room, VoiceError> {
        self.client
            .create_room(name, CreateRoomOptions::default())
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }

    /// Mints a join token granting `identity` publish and subscribe
    /// access to `room_name`, valid for the configured TTL.
    pub fn join_token(
        &self,
        room_name: &str,
        identity: &str,
        display_name: &str,
    ) -> Result<String, VoiceError> {
        let grants = VideoGrants {
            room_join: true,
            room: room_name.to_owned(),
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
            ..VideoGrants::default()
        };

        AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(identity)
            .with_name(display_name)
            .with_grants(grants)
            .with_ttl(self.config.token_ttl())
            .to_jwt()
            .map_err(VoiceError::LiveKit)
    }

    /// Removes `identity` from `room`, ending its session.
    pub async fn remove_participant(&self, room: &str, identity: &str) -> Result<(), VoiceError> {
        self.client
            .remove_participant(room, identity)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))
    }
}
