use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ActorRole;

/// A chat message attached to a request. Visibility follows the parent
/// request's authorization rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub request_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_role: ActorRole,
    pub body: String,
    pub read: bool,
    pub created_at: NaiveDateTime,
}
