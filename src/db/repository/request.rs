use std::str::FromStr;

use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use crate::db::StoreError;
use crate::models::enums::{ClinicianRole, RequestStatus, RequestType};
use crate::models::{AssignedClinician, Request, RequestFilter, RequestPayload};

use super::{format_ts, parse_opt_ts, parse_ts, parse_uuid};

const REQUEST_COLUMNS: &str = "id, request_type, status, patient_id, patient_name, \
     clinician_id, clinician_name, clinician_role, price, payload_json, notes, \
     rejection_reason, signature_json, video_room_json, created_at, assigned_at, \
     approved_at, paid_at, signed_at, completed_at";

/// Raw row as stored; converted to `Request` outside the query closure so
/// enum/JSON parse failures surface as `StoreError`, not SQLite errors.
struct RequestRow {
    id: String,
    request_type: String,
    status: String,
    patient_id: String,
    patient_name: String,
    clinician_id: Option<String>,
    clinician_name: Option<String>,
    clinician_role: Option<String>,
    price: Option<f64>,
    payload_json: String,
    notes: Option<String>,
    rejection_reason: Option<String>,
    signature_json: Option<String>,
    video_room_json: Option<String>,
    created_at: String,
    assigned_at: Option<String>,
    approved_at: Option<String>,
    paid_at: Option<String>,
    signed_at: Option<String>,
    completed_at: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        request_type: row.get(1)?,
        status: row.get(2)?,
        patient_id: row.get(3)?,
        patient_name: row.get(4)?,
        clinician_id: row.get(5)?,
        clinician_name: row.get(6)?,
        clinician_role: row.get(7)?,
        price: row.get(8)?,
        payload_json: row.get(9)?,
        notes: row.get(10)?,
        rejection_reason: row.get(11)?,
        signature_json: row.get(12)?,
        video_room_json: row.get(13)?,
        created_at: row.get(14)?,
        assigned_at: row.get(15)?,
        approved_at: row.get(16)?,
        paid_at: row.get(17)?,
        signed_at: row.get(18)?,
        completed_at: row.get(19)?,
    })
}

fn from_row(raw: RequestRow) -> Result<Request, StoreError> {
    let assigned_clinician = match (raw.clinician_id, raw.clinician_name, raw.clinician_role) {
        (Some(id), Some(name), Some(role)) => Some(AssignedClinician {
            id: parse_uuid(&id)?,
            name,
            role: ClinicianRole::from_str(&role)?,
        }),
        _ => None,
    };

    let payload: RequestPayload = serde_json::from_str(&raw.payload_json)
        .map_err(|e| StoreError::Corrupt(format!("bad request payload: {e}")))?;
    let signature = raw
        .signature_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("bad signature data: {e}")))?;
    let video_room = raw
        .video_room_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("bad video room data: {e}")))?;

    Ok(Request {
        id: parse_uuid(&raw.id)?,
        request_type: RequestType::from_str(&raw.request_type)?,
        status: RequestStatus::from_str(&raw.status)?,
        patient_id: parse_uuid(&raw.patient_id)?,
        patient_name: raw.patient_name,
        assigned_clinician,
        price: raw.price,
        payload,
        notes: raw.notes,
        rejection_reason: raw.rejection_reason,
        signature,
        video_room,
        created_at: parse_ts(&raw.created_at)?,
        assigned_at: parse_opt_ts(raw.assigned_at)?,
        approved_at: parse_opt_ts(raw.approved_at)?,
        paid_at: parse_opt_ts(raw.paid_at)?,
        signed_at: parse_opt_ts(raw.signed_at)?,
        completed_at: parse_opt_ts(raw.completed_at)?,
    })
}

fn payload_json(request: &Request) -> Result<String, StoreError> {
    serde_json::to_string(&request.payload)
        .map_err(|e| StoreError::Corrupt(format!("unserializable payload: {e}")))
}

fn signature_json(request: &Request) -> Result<Option<String>, StoreError> {
    request
        .signature
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("unserializable signature: {e}")))
}

fn video_room_json(request: &Request) -> Result<Option<String>, StoreError> {
    request
        .video_room
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("unserializable video room: {e}")))
}

pub fn insert_request(conn: &Connection, request: &Request) -> Result<(), StoreError> {
    let clinician = request.assigned_clinician.as_ref();
    conn.execute(
        "INSERT INTO requests (id, request_type, status, patient_id, patient_name, \
         clinician_id, clinician_name, clinician_role, price, payload_json, notes, \
         rejection_reason, signature_json, video_room_json, created_at, assigned_at, \
         approved_at, paid_at, signed_at, completed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            request.id.to_string(),
            request.request_type.as_str(),
            request.status.as_str(),
            request.patient_id.to_string(),
            request.patient_name,
            clinician.map(|c| c.id.to_string()),
            clinician.map(|c| c.name.clone()),
            clinician.map(|c| c.role.as_str()),
            request.price,
            payload_json(request)?,
            request.notes,
            request.rejection_reason,
            signature_json(request)?,
            video_room_json(request)?,
            format_ts(request.created_at),
            request.assigned_at.map(format_ts),
            request.approved_at.map(format_ts),
            request.paid_at.map(format_ts),
            request.signed_at.map(format_ts),
            request.completed_at.map(format_ts),
        ],
    )?;
    Ok(())
}

pub fn get_request(conn: &Connection, id: &Uuid) -> Result<Option<Request>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(params![id.to_string()], read_row)?;
    match rows.next() {
        Some(raw) => Ok(Some(from_row(raw?)?)),
        None => Ok(None),
    }
}

/// Typed filter query. Field values become bound parameters; the SQL text
/// is assembled only from fixed clause fragments.
pub fn list_requests(conn: &Connection, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
    let mut sql = format!("SELECT {REQUEST_COLUMNS} FROM requests");
    let mut clauses: Vec<&str> = Vec::new();
    let mut bindings: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("status = ?");
        bindings.push(Box::new(status.as_str().to_string()));
    }
    if let Some(request_type) = filter.request_type {
        clauses.push("request_type = ?");
        bindings.push(Box::new(request_type.as_str().to_string()));
    }
    if let Some(exclude) = filter.exclude_type {
        clauses.push("request_type != ?");
        bindings.push(Box::new(exclude.as_str().to_string()));
    }
    if let Some(patient_id) = filter.patient_id {
        clauses.push("patient_id = ?");
        bindings.push(Box::new(patient_id.to_string()));
    }
    if let Some(clinician_id) = filter.assigned_clinician_id {
        clauses.push("clinician_id = ?");
        bindings.push(Box::new(clinician_id.to_string()));
    }
    if filter.unassigned_only {
        clauses.push("clinician_id IS NULL");
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(if filter.oldest_first {
        " ORDER BY created_at ASC"
    } else {
        " ORDER BY created_at DESC"
    });
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        bindings.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(bindings.iter().map(|b| b.as_ref())), read_row)?;

    let mut requests = Vec::new();
    for raw in rows {
        requests.push(from_row(raw?)?);
    }
    Ok(requests)
}

/// Conditional full-state update keyed on the previous status (the CAS the
/// lifecycle engine relies on). Returns false when the stored status no
/// longer matches `expected` — some other actor transitioned first.
pub fn update_request_cas(
    conn: &Connection,
    request: &Request,
    expected: RequestStatus,
) -> Result<bool, StoreError> {
    let clinician = request.assigned_clinician.as_ref();
    let affected = conn.execute(
        "UPDATE requests SET status = ?1, clinician_id = ?2, clinician_name = ?3, \
         clinician_role = ?4, price = ?5, notes = ?6, rejection_reason = ?7, \
         signature_json = ?8, video_room_json = ?9, assigned_at = ?10, approved_at = ?11, \
         paid_at = ?12, signed_at = ?13, completed_at = ?14 \
         WHERE id = ?15 AND status = ?16",
        params![
            request.status.as_str(),
            clinician.map(|c| c.id.to_string()),
            clinician.map(|c| c.name.clone()),
            clinician.map(|c| c.role.as_str()),
            request.price,
            request.notes,
            request.rejection_reason,
            signature_json(request)?,
            video_room_json(request)?,
            request.assigned_at.map(format_ts),
            request.approved_at.map(format_ts),
            request.paid_at.map(format_ts),
            request.signed_at.map(format_ts),
            request.completed_at.map(format_ts),
            request.id.to_string(),
            expected.as_str(),
        ],
    )?;
    Ok(affected > 0)
}

/// Count requests currently in any of the given statuses.
pub fn count_requests_in_statuses(
    conn: &Connection,
    statuses: &[RequestStatus],
) -> Result<i64, StoreError> {
    if statuses.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!("SELECT COUNT(*) FROM requests WHERE status IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let count = stmt.query_row(
        params_from_iter(statuses.iter().map(|s| s.as_str())),
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ActorRole;
    use crate::models::{MedicationItem, User};

    fn test_db() -> Connection {
        let conn = open_memory_database().unwrap();
        seed_patient(&conn);
        conn
    }

    fn patient_id() -> Uuid {
        Uuid::parse_str("00000000-0000-0000-0000-0000000000aa").unwrap()
    }

    fn seed_patient(conn: &Connection) {
        super::super::insert_user(
            conn,
            &User {
                id: patient_id(),
                name: "João".into(),
                role: ActorRole::Patient,
                active: true,
                push_token: None,
            },
        )
        .unwrap();
    }

    fn make_request(conn: &Connection, status: RequestStatus) -> Request {
        let request = Request {
            id: Uuid::new_v4(),
            request_type: RequestType::Prescription,
            status,
            patient_id: patient_id(),
            patient_name: "João".into(),
            assigned_clinician: None,
            price: Some(49.90),
            payload: RequestPayload::Prescription {
                medications: vec![MedicationItem {
                    name: "Losartana".into(),
                    dose: Some("50mg".into()),
                    instructions: None,
                }],
                prescription_images: vec![],
            },
            notes: None,
            rejection_reason: None,
            signature: None,
            video_room: None,
            created_at: super::super::now(),
            assigned_at: None,
            approved_at: None,
            paid_at: None,
            signed_at: None,
            completed_at: None,
        };
        insert_request(conn, &request).unwrap();
        request
    }

    #[test]
    fn insert_and_retrieve() {
        let conn = test_db();
        let request = make_request(&conn, RequestStatus::Submitted);
        let stored = get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Submitted);
        assert_eq!(stored.patient_name, "João");
        assert_eq!(stored.price, Some(49.90));
        assert!(stored.assigned_clinician.is_none());
        match stored.payload {
            RequestPayload::Prescription { medications, .. } => {
                assert_eq!(medications[0].name, "Losartana");
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn get_unknown_is_none() {
        let conn = test_db();
        assert!(get_request(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn cas_update_succeeds_on_expected_status() {
        let conn = test_db();
        let mut request = make_request(&conn, RequestStatus::Submitted);
        request.status = RequestStatus::InReview;
        let applied = update_request_cas(&conn, &request, RequestStatus::Submitted).unwrap();
        assert!(applied);
        let stored = get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::InReview);
    }

    #[test]
    fn cas_update_fails_on_stale_status() {
        let conn = test_db();
        let mut request = make_request(&conn, RequestStatus::InReview);
        request.status = RequestStatus::ApprovedPendingPayment;
        // Expecting `submitted`, but the row says `in_review`.
        let applied = update_request_cas(&conn, &request, RequestStatus::Submitted).unwrap();
        assert!(!applied);
        let stored = get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::InReview);
    }

    #[test]
    fn filter_by_status_and_unassigned() {
        let conn = test_db();
        make_request(&conn, RequestStatus::Submitted);
        make_request(&conn, RequestStatus::Submitted);
        make_request(&conn, RequestStatus::Paid);

        let submitted = list_requests(
            &conn,
            &RequestFilter {
                status: Some(RequestStatus::Submitted),
                unassigned_only: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(submitted.len(), 2);

        let paid = list_requests(
            &conn,
            &RequestFilter {
                status: Some(RequestStatus::Paid),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(paid.len(), 1);
    }

    #[test]
    fn filter_excludes_type_and_limits() {
        let conn = test_db();
        let first = make_request(&conn, RequestStatus::Submitted);
        std::thread::sleep(std::time::Duration::from_millis(2));
        make_request(&conn, RequestStatus::Submitted);

        let listed = list_requests(
            &conn,
            &RequestFilter {
                exclude_type: Some(RequestType::Exam),
                oldest_first: true,
                limit: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first.id);

        let none = list_requests(
            &conn,
            &RequestFilter {
                request_type: Some(RequestType::Exam),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn count_in_statuses() {
        let conn = test_db();
        make_request(&conn, RequestStatus::Submitted);
        make_request(&conn, RequestStatus::InReview);
        make_request(&conn, RequestStatus::Paid);

        let n = count_requests_in_statuses(
            &conn,
            &[RequestStatus::Submitted, RequestStatus::InReview],
        )
        .unwrap();
        assert_eq!(n, 2);
    }
}
