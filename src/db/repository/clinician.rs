use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::enums::{ActorRole, ClinicianRole};
use crate::models::{Clinician, ClinicianProfile, User};

use super::parse_uuid;

// ─── users ───

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO users (id, name, role, active, push_token) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id.to_string(),
            user.name,
            user.role.as_str(),
            user.active,
            user.push_token,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, role, active, push_token FROM users WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, name, role, active, push_token)) => Ok(Some(User {
            id: parse_uuid(&id)?,
            name,
            role: ActorRole::from_str(&role)?,
            active,
            push_token,
        })),
        None => Ok(None),
    }
}

/// Active users with the given role, in account creation order.
pub fn list_users_by_role(conn: &Connection, role: ActorRole) -> Result<Vec<User>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, role, active, push_token FROM users \
         WHERE role = ?1 AND active = 1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![role.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut users = Vec::new();
    for row in rows {
        let (id, name, role, active, push_token) = row?;
        users.push(User {
            id: parse_uuid(&id)?,
            name,
            role: ActorRole::from_str(&role)?,
            active,
            push_token,
        });
    }
    Ok(users)
}

pub fn set_push_token(
    conn: &Connection,
    user_id: &Uuid,
    token: Option<&str>,
) -> Result<(), StoreError> {
    let affected = conn.execute(
        "UPDATE users SET push_token = ?1 WHERE id = ?2",
        params![token, user_id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound {
            entity: "user".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}

// ─── clinician profiles ───

pub fn insert_clinician_profile(
    conn: &Connection,
    profile: &ClinicianProfile,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO clinician_profiles (user_id, role, specialty, available, \
         active_case_count, total_completed_cases, rating, max_concurrent_cases) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            profile.user_id.to_string(),
            profile.role.as_str(),
            profile.specialty,
            profile.available,
            profile.active_case_count,
            profile.total_completed_cases,
            profile.rating,
            profile.max_concurrent_cases,
        ],
    )?;
    Ok(())
}

fn read_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, Option<String>, bool, i64, i64, f64, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn profile_from_parts(
    parts: (String, String, Option<String>, bool, i64, i64, f64, i64),
) -> Result<ClinicianProfile, StoreError> {
    let (user_id, role, specialty, available, active, completed, rating, max_cases) = parts;
    Ok(ClinicianProfile {
        user_id: parse_uuid(&user_id)?,
        role: ClinicianRole::from_str(&role)?,
        specialty,
        available,
        active_case_count: active,
        total_completed_cases: completed,
        rating,
        max_concurrent_cases: max_cases,
    })
}

const PROFILE_COLUMNS: &str = "user_id, role, specialty, available, \
     active_case_count, total_completed_cases, rating, max_concurrent_cases";

pub fn get_clinician_profile(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<ClinicianProfile>, StoreError> {
    let parts = conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM clinician_profiles WHERE user_id = ?1"),
            params![user_id.to_string()],
            read_profile,
        )
        .optional()?;
    parts.map(profile_from_parts).transpose()
}

/// Candidate scan for assignment: available clinicians of the given role,
/// joined with their display name. Rows come back in profile creation
/// order, which makes the assignment sort deterministic under ties.
pub fn list_available_clinicians(
    conn: &Connection,
    role: ClinicianRole,
    specialty: Option<&str>,
) -> Result<Vec<Clinician>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT cp.user_id, cp.role, cp.specialty, cp.available, cp.active_case_count, \
         cp.total_completed_cases, cp.rating, cp.max_concurrent_cases, u.name \
         FROM clinician_profiles cp JOIN users u ON u.id = cp.user_id \
         WHERE cp.role = ?1 AND cp.available = 1 AND u.active = 1 \
         AND (?2 IS NULL OR cp.specialty = ?2) \
         ORDER BY cp.rowid",
    ))?;
    let rows = stmt.query_map(params![role.as_str(), specialty], |row| {
        let parts = read_profile(row)?;
        let name: String = row.get(8)?;
        Ok((parts, name))
    })?;

    let mut clinicians = Vec::new();
    for row in rows {
        let (parts, name) = row?;
        clinicians.push(Clinician {
            profile: profile_from_parts(parts)?,
            name,
        });
    }
    Ok(clinicians)
}

pub fn set_availability(
    conn: &Connection,
    user_id: &Uuid,
    available: bool,
) -> Result<(), StoreError> {
    let affected = conn.execute(
        "UPDATE clinician_profiles SET available = ?1 WHERE user_id = ?2",
        params![available, user_id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound {
            entity: "clinician_profile".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}

/// Adjust the active case counter, clamped at zero on decrement.
pub fn adjust_active_cases(
    conn: &Connection,
    user_id: &Uuid,
    delta: i64,
) -> Result<(), StoreError> {
    let affected = conn.execute(
        "UPDATE clinician_profiles \
         SET active_case_count = MAX(0, active_case_count + ?1) WHERE user_id = ?2",
        params![delta, user_id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound {
            entity: "clinician_profile".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}

pub fn increment_completed_cases(conn: &Connection, user_id: &Uuid) -> Result<(), StoreError> {
    let affected = conn.execute(
        "UPDATE clinician_profiles \
         SET total_completed_cases = total_completed_cases + 1 WHERE user_id = ?1",
        params![user_id.to_string()],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound {
            entity: "clinician_profile".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}
