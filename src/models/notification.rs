use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NotificationCategory;

/// An in-app notification row. Created only by the dispatcher; after
/// creation only the `read` flag mutates, and only by the recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub related_request_id: Option<Uuid>,
    pub read: bool,
    pub created_at: NaiveDateTime,
}
