use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ClinicianRole;

/// Per-clinician workload and matching data. Availability is toggled by
/// the clinician; case counts are mutated only by the lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicianProfile {
    pub user_id: Uuid,
    pub role: ClinicianRole,
    /// Matching constraint for consultations; doctors only.
    pub specialty: Option<String>,
    pub available: bool,
    pub active_case_count: i64,
    pub total_completed_cases: i64,
    pub rating: f64,
    pub max_concurrent_cases: i64,
}

impl ClinicianProfile {
    pub fn has_capacity(&self) -> bool {
        self.active_case_count < self.max_concurrent_cases
    }
}

/// A clinician profile joined with the user's display name, as produced
/// by the availability scan for assignment and notification fan-out.
#[derive(Debug, Clone)]
pub struct Clinician {
    pub profile: ClinicianProfile,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_check() {
        let mut profile = ClinicianProfile {
            user_id: Uuid::new_v4(),
            role: ClinicianRole::Doctor,
            specialty: Some("Clínico Geral".into()),
            available: true,
            active_case_count: 4,
            total_completed_cases: 10,
            rating: 4.8,
            max_concurrent_cases: 5,
        };
        assert!(profile.has_capacity());
        profile.active_case_count = 5;
        assert!(!profile.has_capacity());
    }
}
