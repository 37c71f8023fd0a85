use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ClinicianRole, RequestStatus, RequestType};

/// One medication line on a prescription renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationItem {
    pub name: String,
    pub dose: Option<String>,
    pub instructions: Option<String>,
}

/// Type-specific structured data carried by a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestPayload {
    Prescription {
        medications: Vec<MedicationItem>,
        prescription_images: Vec<String>,
    },
    Exam {
        exams: Vec<String>,
        description: Option<String>,
    },
    Consultation {
        specialty: String,
        duration_minutes: u32,
        scheduled_at: Option<NaiveDateTime>,
    },
}

impl RequestPayload {
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Prescription { .. } => RequestType::Prescription,
            Self::Exam { .. } => RequestType::Exam,
            Self::Consultation { .. } => RequestType::Consultation,
        }
    }

    /// Specialty constraint for assignment, present only on consultations.
    pub fn specialty(&self) -> Option<&str> {
        match self {
            Self::Consultation { specialty, .. } => Some(specialty.as_str()),
            _ => None,
        }
    }
}

/// The clinician currently owning a request. At most one at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedClinician {
    pub id: Uuid,
    pub name: String,
    pub role: ClinicianRole,
}

/// Opaque signature data returned by the external signing service.
/// Stored as-is; cryptographic validity is never checked here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureData {
    pub signature_reference: String,
    pub document_hash: String,
    pub signer_name: String,
    pub signed_at: NaiveDateTime,
}

/// Joinable video room for a teleconsultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRoom {
    pub room_name: String,
    pub url: String,
}

/// A medical service request — the central entity. Created by patient
/// submission, mutated only through the lifecycle engine, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub assigned_clinician: Option<AssignedClinician>,
    pub price: Option<f64>,
    pub payload: RequestPayload,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub signature: Option<SignatureData>,
    pub video_room: Option<VideoRoom>,
    pub created_at: NaiveDateTime,
    pub assigned_at: Option<NaiveDateTime>,
    pub approved_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
    pub signed_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl Request {
    /// Which clinician role may claim this request in its current status.
    /// Exams are triaged by nurses first; a forwarded exam goes to a doctor.
    pub fn required_role_for_accept(&self) -> ClinicianRole {
        if self.status == RequestStatus::ForwardedToDoctor {
            return ClinicianRole::Doctor;
        }
        match self.request_type {
            RequestType::Exam => ClinicianRole::Nurse,
            RequestType::Prescription | RequestType::Consultation => ClinicianRole::Doctor,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_clinician.is_some()
    }

    pub fn is_assigned_to(&self, user_id: &Uuid) -> bool {
        self.assigned_clinician
            .as_ref()
            .map(|c| &c.id == user_id)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam_request(status: RequestStatus) -> Request {
        Request {
            id: Uuid::new_v4(),
            request_type: RequestType::Exam,
            status,
            patient_id: Uuid::new_v4(),
            patient_name: "Maria".into(),
            assigned_clinician: None,
            price: None,
            payload: RequestPayload::Exam {
                exams: vec!["Hemograma".into()],
                description: None,
            },
            notes: None,
            rejection_reason: None,
            signature: None,
            video_room: None,
            created_at: chrono::Utc::now().naive_utc(),
            assigned_at: None,
            approved_at: None,
            paid_at: None,
            signed_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn submitted_exam_requires_nurse() {
        let req = exam_request(RequestStatus::Submitted);
        assert_eq!(req.required_role_for_accept(), ClinicianRole::Nurse);
    }

    #[test]
    fn forwarded_exam_requires_doctor() {
        let req = exam_request(RequestStatus::ForwardedToDoctor);
        assert_eq!(req.required_role_for_accept(), ClinicianRole::Doctor);
    }

    #[test]
    fn payload_reports_its_type_and_specialty() {
        let payload = RequestPayload::Consultation {
            specialty: "Cardiologia".into(),
            duration_minutes: 30,
            scheduled_at: None,
        };
        assert_eq!(payload.request_type(), RequestType::Consultation);
        assert_eq!(payload.specialty(), Some("Cardiologia"));

        let exam = RequestPayload::Exam {
            exams: vec![],
            description: None,
        };
        assert_eq!(exam.specialty(), None);
    }

    #[test]
    fn payload_json_round_trip() {
        let payload = RequestPayload::Prescription {
            medications: vec![MedicationItem {
                name: "Metformina".into(),
                dose: Some("500mg".into()),
                instructions: None,
            }],
            prescription_images: vec![],
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: RequestPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_type(), RequestType::Prescription);
    }
}
