//! Clinician matching and the auto-assign sweep.
//!
//! Ranking: fewest active cases first, then highest rating, then most
//! completed cases. Candidates arrive in profile creation order, and the
//! sort is stable, so ties resolve deterministically.

use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repository;
use crate::db::StoreError;
use crate::error::EngineError;
use crate::lifecycle::{self, TransitionCtx};
use crate::models::enums::{Edge, RequestStatus, RequestType};
use crate::models::{Clinician, Request, RequestFilter};

/// Pick the best available clinician for a request, or None when nobody
/// matching has capacity.
pub fn find_best_clinician(
    conn: &Connection,
    request: &Request,
) -> Result<Option<Clinician>, StoreError> {
    let role = request.required_role_for_accept();
    let specialty = request.payload.specialty();
    let mut candidates: Vec<Clinician> =
        repository::list_available_clinicians(conn, role, specialty)?
            .into_iter()
            .filter(|c| c.profile.has_capacity())
            .collect();

    candidates.sort_by(|a, b| {
        a.profile
            .active_case_count
            .cmp(&b.profile.active_case_count)
            .then(b.profile.rating.total_cmp(&a.profile.rating))
            .then(
                b.profile
                    .total_completed_cases
                    .cmp(&a.profile.total_completed_cases),
            )
    });

    Ok(candidates.into_iter().next())
}

/// Outcome of one auto-assign sweep.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// (request, clinician) pairs that were assigned.
    pub assigned: Vec<(Uuid, Uuid)>,
    /// Requests that did not need this sweep: no candidate had capacity,
    /// or a concurrent manual accept claimed them first.
    pub skipped: Vec<Uuid>,
    /// Requests whose assignment attempt errored, with the error code.
    pub failed: Vec<(Uuid, String)>,
}

/// Assign pending submitted requests to the best available clinicians.
///
/// Exams are excluded: they wait for a nurse to triage them by hand.
/// Assignment reuses the accept edge, so workload counters and the write
/// race behave exactly as they do for a manual claim.
pub fn auto_assign_batch(conn: &Connection, limit: usize) -> Result<BatchReport, EngineError> {
    let pending = repository::list_requests(
        conn,
        &RequestFilter {
            status: Some(RequestStatus::Submitted),
            exclude_type: Some(RequestType::Exam),
            unassigned_only: true,
            oldest_first: true,
            limit: Some(limit),
            ..Default::default()
        },
    )?;

    let mut report = BatchReport::default();
    for request in pending {
        let Some(clinician) = find_best_clinician(conn, &request)? else {
            debug!(request_id = %request.id, "no clinician with capacity, skipping");
            report.skipped.push(request.id);
            continue;
        };
        let actor = lifecycle::clinician_actor(
            clinician.profile.user_id,
            &clinician.name,
            clinician.profile.role,
        );
        match lifecycle::transition(conn, &actor, &request.id, Edge::Accept, TransitionCtx::default())
        {
            Ok(_) => report.assigned.push((request.id, clinician.profile.user_id)),
            // Lost to a concurrent manual accept: the request got an owner
            // anyway, so it leaves the queue without being an error.
            Err(EngineError::ConcurrentModification) => report.skipped.push(request.id),
            Err(e) => report.failed.push((request.id, e.code().to_string())),
        }
    }

    info!(
        assigned = report.assigned.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "auto-assign sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        get_clinician_profile, insert_clinician_profile, insert_request, insert_user, now,
    };
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{ActorRole, ClinicianRole};
    use crate::models::{ClinicianProfile, RequestPayload, User};

    fn seed_patient(conn: &Connection) -> Uuid {
        let id = Uuid::new_v4();
        insert_user(
            conn,
            &User {
                id,
                name: "João".into(),
                role: ActorRole::Patient,
                active: true,
                push_token: None,
            },
        )
        .unwrap();
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn seed_doctor(
        conn: &Connection,
        name: &str,
        specialty: Option<&str>,
        active: i64,
        completed: i64,
        rating: f64,
        max_cases: i64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        insert_user(
            conn,
            &User {
                id,
                name: name.into(),
                role: ActorRole::Doctor,
                active: true,
                push_token: None,
            },
        )
        .unwrap();
        insert_clinician_profile(
            conn,
            &ClinicianProfile {
                user_id: id,
                role: ClinicianRole::Doctor,
                specialty: specialty.map(str::to_string),
                available: true,
                active_case_count: active,
                total_completed_cases: completed,
                rating,
                max_concurrent_cases: max_cases,
            },
        )
        .unwrap();
        id
    }

    fn seed_request(conn: &Connection, request_type: RequestType, patient: Uuid) -> Request {
        let payload = match request_type {
            RequestType::Prescription => RequestPayload::Prescription {
                medications: vec![],
                prescription_images: vec![],
            },
            RequestType::Exam => RequestPayload::Exam {
                exams: vec!["Hemograma".into()],
                description: None,
            },
            RequestType::Consultation => RequestPayload::Consultation {
                specialty: "Cardiologia".into(),
                duration_minutes: 30,
                scheduled_at: None,
            },
        };
        let request = Request {
            id: Uuid::new_v4(),
            request_type,
            status: RequestStatus::Submitted,
            patient_id: patient,
            patient_name: "João".into(),
            assigned_clinician: None,
            price: Some(49.90),
            payload,
            notes: None,
            rejection_reason: None,
            signature: None,
            video_room: None,
            created_at: now(),
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
    fn ranking_prefers_lowest_load_then_rating() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_doctor(&conn, "Busy", None, 3, 50, 5.0, 5);
        seed_doctor(&conn, "Ok", None, 1, 10, 4.0, 5);
        let best_id = seed_doctor(&conn, "Best", None, 1, 5, 4.9, 5);

        let request = seed_request(&conn, RequestType::Prescription, patient);
        let best = find_best_clinician(&conn, &request).unwrap().unwrap();
        // Load ties at 1; the 4.9 rating beats 4.0 despite fewer completions.
        assert_eq!(best.profile.user_id, best_id);
        assert_eq!(best.name, "Best");
    }

    #[test]
    fn ranking_tie_breaks_on_completed_cases() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_doctor(&conn, "Junior", None, 1, 5, 4.5, 5);
        let senior = seed_doctor(&conn, "Senior", None, 1, 120, 4.5, 5);

        let request = seed_request(&conn, RequestType::Prescription, patient);
        let best = find_best_clinician(&conn, &request).unwrap().unwrap();
        assert_eq!(best.profile.user_id, senior);
    }

    #[test]
    fn full_clinicians_are_excluded() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_doctor(&conn, "Full", None, 5, 100, 5.0, 5);

        let request = seed_request(&conn, RequestType::Prescription, patient);
        assert!(find_best_clinician(&conn, &request).unwrap().is_none());
    }

    #[test]
    fn consultation_matches_specialty() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_doctor(&conn, "Derm", Some("Dermatologia"), 0, 10, 5.0, 5);
        let cardio = seed_doctor(&conn, "Cardio", Some("Cardiologia"), 2, 10, 4.0, 5);

        let request = seed_request(&conn, RequestType::Consultation, patient);
        let best = find_best_clinician(&conn, &request).unwrap().unwrap();
        assert_eq!(best.profile.user_id, cardio);
    }

    #[test]
    fn sweep_assigns_and_skips_exams() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let doctor = seed_doctor(&conn, "Dra. Ana", None, 0, 0, 5.0, 5);
        let prescription = seed_request(&conn, RequestType::Prescription, patient);
        let exam = seed_request(&conn, RequestType::Exam, patient);

        let report = auto_assign_batch(&conn, 100).unwrap();
        assert_eq!(report.assigned, vec![(prescription.id, doctor)]);
        assert!(report.failed.is_empty());
        assert!(report.skipped.is_empty());

        // The exam still sits untouched in the nurse queue.
        let exam_row = repository::get_request(&conn, &exam.id).unwrap().unwrap();
        assert_eq!(exam_row.status, RequestStatus::Submitted);
        assert!(!exam_row.is_assigned());
    }

    #[test]
    fn sweep_spreads_load_as_counters_move() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let a = seed_doctor(&conn, "A", None, 0, 0, 5.0, 5);
        let b = seed_doctor(&conn, "B", None, 0, 0, 5.0, 5);
        for _ in 0..4 {
            seed_request(&conn, RequestType::Prescription, patient);
        }

        let report = auto_assign_batch(&conn, 100).unwrap();
        assert_eq!(report.assigned.len(), 4);
        // Counters move during the sweep, so work alternates.
        let load_a = get_clinician_profile(&conn, &a).unwrap().unwrap().active_case_count;
        let load_b = get_clinician_profile(&conn, &b).unwrap().unwrap().active_case_count;
        assert_eq!(load_a, 2);
        assert_eq!(load_b, 2);
    }

    #[test]
    fn sweep_reports_skips_when_everyone_is_full() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_doctor(&conn, "Full", None, 5, 0, 5.0, 5);
        let request = seed_request(&conn, RequestType::Prescription, patient);

        let report = auto_assign_batch(&conn, 100).unwrap();
        assert!(report.assigned.is_empty());
        assert_eq!(report.skipped, vec![request.id]);
    }

    #[test]
    fn sweep_respects_limit_oldest_first() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_doctor(&conn, "Dra. Ana", None, 0, 0, 5.0, 10);
        let first = seed_request(&conn, RequestType::Prescription, patient);
        std::thread::sleep(std::time::Duration::from_millis(2));
        seed_request(&conn, RequestType::Prescription, patient);

        let report = auto_assign_batch(&conn, 1).unwrap();
        assert_eq!(report.assigned.len(), 1);
        assert_eq!(report.assigned[0].0, first.id);
    }
}
