//! Persisted session store: opaque tokens in the `sessions` table with an
//! explicit expiry, checked on every resolution.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use uuid::Uuid;

use crate::db::repository::{format_ts, now, parse_ts, parse_uuid};
use crate::db::StoreError;
use crate::models::enums::ActorRole;
use crate::models::User;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub role: ActorRole,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

fn generate_token() -> String {
    // Two v4 UUIDs back to back: 256 bits of randomness, hex only.
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn create_session(
    conn: &Connection,
    user: &User,
    ttl_minutes: i64,
) -> Result<Session, StoreError> {
    let created_at = now();
    let session = Session {
        token: generate_token(),
        user_id: user.id,
        role: user.role,
        created_at,
        expires_at: created_at + Duration::minutes(ttl_minutes),
    };
    conn.execute(
        "INSERT INTO sessions (token, user_id, role, created_at, expires_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.token,
            session.user_id.to_string(),
            session.role.as_str(),
            format_ts(session.created_at),
            format_ts(session.expires_at),
        ],
    )?;
    Ok(session)
}

/// Resolve a token. Expired sessions are deleted on sight and resolve to None.
pub fn get_session(conn: &Connection, token: &str) -> Result<Option<Session>, StoreError> {
    let row = conn
        .query_row(
            "SELECT token, user_id, role, created_at, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((token, user_id, role, created_at, expires_at)) = row else {
        return Ok(None);
    };
    let session = Session {
        token,
        user_id: parse_uuid(&user_id)?,
        role: ActorRole::from_str(&role)?,
        created_at: parse_ts(&created_at)?,
        expires_at: parse_ts(&expires_at)?,
    };
    if session.expires_at <= now() {
        delete_session(conn, &session.token)?;
        return Ok(None);
    }
    Ok(Some(session))
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Sweep expired rows. Returns how many were removed.
pub fn purge_expired(conn: &Connection) -> Result<usize, StoreError> {
    let affected = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![format_ts(now())],
    )?;
    Ok(affected)
}
