//! Who may see and act on a request. Pure decision logic over loaded
//! state; the service layer resolves actors and loads rows before asking.

use uuid::Uuid;

use crate::error::EngineError;
use crate::models::enums::{ActorRole, ClinicianRole, Edge, RequestStatus};
use crate::models::Request;

/// A resolved caller identity. Built from a session or, for webhook and
/// scheduler paths, via [`Actor::system`].
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            name: "system".into(),
            role: ActorRole::System,
        }
    }

    pub fn is_clinician(&self) -> bool {
        matches!(self.role, ActorRole::Doctor | ActorRole::Nurse)
    }
}

/// Read visibility. Patients see their own requests; a clinician sees
/// requests assigned to them plus the unassigned queue their role serves;
/// admins and the system see everything.
pub fn can_read(actor: &Actor, request: &Request) -> bool {
    match actor.role {
        ActorRole::Admin | ActorRole::System => true,
        ActorRole::Patient => request.patient_id == actor.id,
        ActorRole::Doctor | ActorRole::Nurse => {
            if request.is_assigned_to(&actor.id) {
                return true;
            }
            // Queue visibility: claimable work for this role, plus the
            // signing queue of paid requests without a doctor owner.
            claimable_by(actor, request)
                || (request.status == RequestStatus::Paid && signable_by(actor, request))
        }
    }
}

pub fn check_read(actor: &Actor, request: &Request) -> Result<(), EngineError> {
    if can_read(actor, request) {
        Ok(())
    } else {
        Err(EngineError::Forbidden)
    }
}

/// Whether the request sits in a queue this actor's role may claim from.
fn claimable_by(actor: &Actor, request: &Request) -> bool {
    let claim_status = matches!(
        request.status,
        RequestStatus::Submitted | RequestStatus::ForwardedToDoctor
    );
    claim_status && request.required_role_for_accept().as_actor_role() == actor.role
}

/// Whether this actor may put a signature on the request. A doctor-owned
/// request is signed by its owner only; a request that reached payment
/// without a doctor (a nurse-approved exam) may be signed by any doctor.
fn signable_by(actor: &Actor, request: &Request) -> bool {
    if actor.role != ActorRole::Doctor {
        return false;
    }
    match &request.assigned_clinician {
        Some(c) if c.role == ClinicianRole::Doctor => c.id == actor.id,
        _ => true,
    }
}

/// Role and ownership rules per edge. Status validity is the lifecycle
/// table's job; this answers only "may this actor pull this lever".
pub fn check_transition(actor: &Actor, request: &Request, edge: Edge) -> Result<(), EngineError> {
    let allowed = match edge {
        Edge::Accept => claimable_by(actor, request),
        Edge::ConfirmPayment => {
            // The paying patient, or the payment webhook.
            actor.role == ActorRole::System || request.patient_id == actor.id
        }
        Edge::ForwardToDoctor => {
            actor.role == ActorRole::Nurse && request.is_assigned_to(&actor.id)
        }
        Edge::Sign => signable_by(actor, request),
        Edge::Approve | Edge::Reject | Edge::Start | Edge::End | Edge::Deliver => {
            actor.is_clinician() && request.is_assigned_to(&actor.id)
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(EngineError::Forbidden)
    }
}
