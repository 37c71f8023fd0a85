use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::enums::NotificationCategory;
use crate::models::Notification;

use super::{format_ts, parse_ts, parse_uuid};

pub fn insert_notification(
    conn: &Connection,
    notification: &Notification,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO notifications (id, recipient_id, title, message, category, \
         related_request_id, read, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            notification.id.to_string(),
            notification.recipient_id.to_string(),
            notification.title,
            notification.message,
            notification.category.as_str(),
            notification.related_request_id.map(|id| id.to_string()),
            notification.read,
            format_ts(notification.created_at),
        ],
    )?;
    Ok(())
}

/// Notifications for one recipient, newest first.
pub fn list_notifications_for(
    conn: &Connection,
    recipient_id: &Uuid,
) -> Result<Vec<Notification>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, title, message, category, related_request_id, read, created_at \
         FROM notifications WHERE recipient_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![recipient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, bool>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut notifications = Vec::new();
    for row in rows {
        let (id, recipient, title, message, category, related, read, created) = row?;
        notifications.push(Notification {
            id: parse_uuid(&id)?,
            recipient_id: parse_uuid(&recipient)?,
            title,
            message,
            category: NotificationCategory::from_str(&category)?,
            related_request_id: related.as_deref().map(parse_uuid).transpose()?,
            read,
            created_at: parse_ts(&created)?,
        });
    }
    Ok(notifications)
}

/// Mark read, scoped to the recipient so one user cannot touch another's rows.
pub fn mark_notification_read(
    conn: &Connection,
    notification_id: &Uuid,
    recipient_id: &Uuid,
) -> Result<(), StoreError> {
    let affected = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND recipient_id = ?2",
        params![notification_id.to_string(), recipient_id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound {
            entity: "notification".into(),
            id: notification_id.to_string(),
        });
    }
    Ok(())
}

pub fn count_unread(conn: &Connection, recipient_id: &Uuid) -> Result<i64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read = 0",
        params![recipient_id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}
