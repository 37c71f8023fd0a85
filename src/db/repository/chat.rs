use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::enums::ActorRole;
use crate::models::ChatMessage;

use super::{format_ts, parse_ts, parse_uuid};

pub fn insert_chat_message(conn: &Connection, message: &ChatMessage) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO chat_messages (id, request_id, sender_id, sender_name, sender_role, \
         body, read, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            message.id.to_string(),
            message.request_id.to_string(),
            message.sender_id.to_string(),
            message.sender_name,
            message.sender_role.as_str(),
            message.body,
            message.read,
            format_ts(message.created_at),
        ],
    )?;
    Ok(())
}

/// Full thread for a request, oldest first.
pub fn list_chat_messages(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<Vec<ChatMessage>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, sender_id, sender_name, sender_role, body, read, created_at \
         FROM chat_messages WHERE request_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![request_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, bool>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, request, sender, sender_name, sender_role, body, read, created) = row?;
        messages.push(ChatMessage {
            id: parse_uuid(&id)?,
            request_id: parse_uuid(&request)?,
            sender_id: parse_uuid(&sender)?,
            sender_name,
            sender_role: ActorRole::from_str(&sender_role)?,
            body,
            read,
            created_at: parse_ts(&created)?,
        });
    }
    Ok(messages)
}

/// Mark everything in the thread not sent by `reader` as read.
pub fn mark_chat_read(
    conn: &Connection,
    request_id: &Uuid,
    reader_id: &Uuid,
) -> Result<usize, StoreError> {
    let affected = conn.execute(
        "UPDATE chat_messages SET read = 1 WHERE request_id = ?1 AND sender_id != ?2 AND read = 0",
        params![request_id.to_string(), reader_id.to_string()],
    )?;
    Ok(affected)
}
