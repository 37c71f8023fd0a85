use crate::db::StoreError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(RequestType {
    Prescription => "prescription",
    Exam => "exam",
    Consultation => "consultation",
});

str_enum!(ActorRole {
    Patient => "patient",
    Doctor => "doctor",
    Nurse => "nurse",
    Admin => "admin",
    System => "system",
});

str_enum!(ClinicianRole {
    Doctor => "doctor",
    Nurse => "nurse",
});

str_enum!(NotificationCategory {
    Info => "info",
    Success => "success",
    Warning => "warning",
    Error => "error",
    Payment => "payment",
    Consultation => "consultation",
    Prescription => "prescription",
    Exam => "exam",
});

str_enum!(Edge {
    Accept => "accept",
    Approve => "approve",
    Reject => "reject",
    ForwardToDoctor => "forward_to_doctor",
    ConfirmPayment => "confirm_payment",
    Sign => "sign",
    Start => "start",
    End => "end",
    Deliver => "deliver",
});

/// Request lifecycle status. Hand-written rather than macro-generated
/// because `completed` must parse as a read alias of `delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Submitted,
    InReview,
    ForwardedToDoctor,
    ApprovedPendingPayment,
    Paid,
    InProgress,
    Signed,
    Delivered,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::ForwardedToDoctor => "forwarded_to_doctor",
            Self::ApprovedPendingPayment => "approved_pending_payment",
            Self::Paid => "paid",
            Self::InProgress => "in_progress",
            Self::Signed => "signed",
            Self::Delivered => "delivered",
            Self::Rejected => "rejected",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Rejected)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "in_review" => Ok(Self::InReview),
            "forwarded_to_doctor" => Ok(Self::ForwardedToDoctor),
            "approved_pending_payment" => Ok(Self::ApprovedPendingPayment),
            "paid" => Ok(Self::Paid),
            "in_progress" => Ok(Self::InProgress),
            "signed" => Ok(Self::Signed),
            "delivered" | "completed" => Ok(Self::Delivered),
            "rejected" => Ok(Self::Rejected),
            _ => Err(StoreError::InvalidEnum {
                field: "RequestStatus".into(),
                value: s.into(),
            }),
        }
    }
}

impl ClinicianRole {
    pub fn as_actor_role(&self) -> ActorRole {
        match self {
            Self::Doctor => ActorRole::Doctor,
            Self::Nurse => ActorRole::Nurse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trip() {
        for (variant, s) in [
            (RequestStatus::Submitted, "submitted"),
            (RequestStatus::InReview, "in_review"),
            (RequestStatus::ForwardedToDoctor, "forwarded_to_doctor"),
            (RequestStatus::ApprovedPendingPayment, "approved_pending_payment"),
            (RequestStatus::Paid, "paid"),
            (RequestStatus::InProgress, "in_progress"),
            (RequestStatus::Signed, "signed"),
            (RequestStatus::Delivered, "delivered"),
            (RequestStatus::Rejected, "rejected"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(RequestStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn completed_is_read_alias_of_delivered() {
        assert_eq!(
            RequestStatus::from_str("completed").unwrap(),
            RequestStatus::Delivered
        );
        // Serialization always emits the canonical name.
        assert_eq!(RequestStatus::Delivered.as_str(), "delivered");
    }

    #[test]
    fn terminal_statuses() {
        assert!(RequestStatus::Delivered.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(!RequestStatus::Paid.is_terminal());
        assert!(!RequestStatus::Submitted.is_terminal());
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(RequestStatus::from_str("analyzing").is_err());
    }

    #[test]
    fn edge_round_trip() {
        for (variant, s) in [
            (Edge::Accept, "accept"),
            (Edge::Approve, "approve"),
            (Edge::Reject, "reject"),
            (Edge::ForwardToDoctor, "forward_to_doctor"),
            (Edge::ConfirmPayment, "confirm_payment"),
            (Edge::Sign, "sign"),
            (Edge::Start, "start"),
            (Edge::End, "end"),
            (Edge::Deliver, "deliver"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Edge::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn clinician_role_maps_to_actor_role() {
        assert_eq!(ClinicianRole::Doctor.as_actor_role(), ActorRole::Doctor);
        assert_eq!(ClinicianRole::Nurse.as_actor_role(), ActorRole::Nurse);
    }
}
