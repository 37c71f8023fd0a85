use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::models::VideoRoom;

use super::IntegrationError;

pub trait RoomProvisioner: Send + Sync {
    fn create_room(&self, request_id: &Uuid) -> Result<VideoRoom, IntegrationError>;
}

/// Development rooms: deterministic Jitsi-style URLs, no provisioning call.
pub struct SimulatedRooms {
    base_url: String,
}

impl Default for SimulatedRooms {
    fn default() -> Self {
        Self {
            base_url: "https://meet.jit.si".into(),
        }
    }
}

impl RoomProvisioner for SimulatedRooms {
    fn create_room(&self, request_id: &Uuid) -> Result<VideoRoom, IntegrationError> {
        let room_name = format!("renova-{}", request_id.simple());
        debug!(request_id = %request_id, room = room_name, "simulated room created");
        Ok(VideoRoom {
            url: format!("{}/{room_name}", self.base_url),
            room_name,
        })
    }
}

#[derive(Deserialize)]
struct RoomResponse {
    url: String,
}

pub struct LiveRooms {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl LiveRooms {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("RENOVA_VIDEO_URL").unwrap_or_default(),
            std::env::var("RENOVA_VIDEO_API_KEY").unwrap_or_default(),
        )
    }
}

impl RoomProvisioner for LiveRooms {
    fn create_room(&self, request_id: &Uuid) -> Result<VideoRoom, IntegrationError> {
        if self.api_key.is_empty() {
            return Err(IntegrationError::Rejected {
                service: "video",
                reason: "missing API key".into(),
            });
        }
        let room_name = format!("renova-{}", request_id.simple());
        let response = self
            .client
            .post(format!("{}/rooms", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "name": room_name }))
            .send()?;
        if !response.status().is_success() {
            return Err(IntegrationError::Rejected {
                service: "video",
                reason: format!("status {}", response.status()),
            });
        }
        let room: RoomResponse = response.json()?;
        Ok(VideoRoom {
            room_name,
            url: room.url,
        })
    }
}
