use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ActorRole;

/// Minimal account record: enough for authorization, fan-out to admins
/// and push delivery. Password/credential handling lives outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: ActorRole,
    pub active: bool,
    pub push_token: Option<String>,
}
