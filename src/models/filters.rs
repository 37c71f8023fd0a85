use uuid::Uuid;

use super::enums::{RequestStatus, RequestType};

/// Typed request query — the storage layer translates fields into
/// parameterized SQL, never string-assembled filters.
#[derive(Debug, Default, Clone)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub exclude_type: Option<RequestType>,
    pub patient_id: Option<Uuid>,
    pub assigned_clinician_id: Option<Uuid>,
    pub unassigned_only: bool,
    pub oldest_first: bool,
    pub limit: Option<usize>,
}
