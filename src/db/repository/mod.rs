//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `&Connection`, one sub-module per entity. Enums are
//! persisted as their string form; structured payloads as JSON columns.

mod chat;
mod clinician;
mod notification;
mod request;

pub use chat::*;
pub use clinician::*;
pub use notification::*;
pub use request::*;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::StoreError;

/// Storage timestamp format. The fractional part keeps sub-second ordering
/// so the monotonic-timestamp invariant survives fast transitions.
pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_ts(t: NaiveDateTime) -> String {
    t.format(TS_FORMAT).to_string()
}

pub(crate) fn parse_ts(s: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{s}': {e}")))
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> Result<Option<NaiveDateTime>, StoreError> {
    s.map(|v| parse_ts(&v)).transpose()
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Corrupt(format!("bad uuid '{s}': {e}")))
}

/// Current wall-clock instant as stored in the database.
pub fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
