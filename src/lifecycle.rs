//! Request lifecycle engine. All status changes go through [`transition`]:
//! load, authorize, validate the edge, apply effects, then commit with a
//! conditional update keyed on the previous status.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::db::repository;
use crate::error::EngineError;
use crate::models::enums::{ClinicianRole, Edge, RequestStatus, RequestType};
use crate::models::{AssignedClinician, Request, SignatureData, VideoRoom};

/// The full edge table. `None` means the edge does not exist from that
/// status for that request type.
pub fn next_status(
    request_type: RequestType,
    from: RequestStatus,
    edge: Edge,
) -> Option<RequestStatus> {
    use RequestStatus::*;
    match (from, edge) {
        (Submitted, Edge::Accept) => Some(InReview),
        (ForwardedToDoctor, Edge::Accept) => Some(InReview),
        (InReview, Edge::Approve) => Some(ApprovedPendingPayment),
        (InReview, Edge::Reject) => Some(Rejected),
        (InReview, Edge::ForwardToDoctor) if request_type == RequestType::Exam => {
            Some(ForwardedToDoctor)
        }
        (ApprovedPendingPayment, Edge::ConfirmPayment) => Some(Paid),
        (Paid, Edge::Sign) if request_type != RequestType::Consultation => Some(Signed),
        (Signed, Edge::Deliver) => Some(Delivered),
        (Paid, Edge::Start) if request_type == RequestType::Consultation => Some(InProgress),
        (InProgress, Edge::End) if request_type == RequestType::Consultation => Some(Delivered),
        _ => None,
    }
}

/// Caller-supplied data for a transition. Which fields matter depends on
/// the edge; unused fields are ignored.
#[derive(Debug, Default, Clone)]
pub struct TransitionCtx {
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    /// Exam price, set by the nurse at approval.
    pub price: Option<f64>,
    pub signature: Option<SignatureData>,
    pub video_room: Option<VideoRoom>,
}

/// Run one lifecycle transition and return the updated request.
///
/// Error cascade: unknown id is `NotFound`, an actor without rights gets
/// `Forbidden`, a bad edge `InvalidTransition`, missing edge data
/// `PreconditionFailed`. A lost write race surfaces as
/// `ConcurrentModification` after re-reading the row.
pub fn transition(
    conn: &Connection,
    actor: &Actor,
    request_id: &Uuid,
    edge: Edge,
    ctx: TransitionCtx,
) -> Result<Request, EngineError> {
    let request = repository::get_request(conn, request_id)?
        .ok_or_else(|| EngineError::not_found("request", request_id))?;

    authorization::check_transition(actor, &request, edge)?;

    let target = next_status(request.request_type, request.status, edge).ok_or(
        EngineError::InvalidTransition {
            from: request.status,
            edge,
        },
    )?;

    let expected = request.status;
    let mut updated = request;
    updated.status = target;
    let effects = apply_edge_effects(conn, actor, &mut updated, edge, ctx)?;

    // Writes grouped in one immediate transaction so the status change and
    // the workload counters can never be observed half-applied.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(crate::db::StoreError::from)?;
    let applied = repository::update_request_cas(&tx, &updated, expected)?;
    if applied {
        apply_counter_effects(&tx, &effects)?;
        tx.commit().map_err(crate::db::StoreError::from)?;
    } else {
        drop(tx);
        return match repository::get_request(conn, request_id)? {
            Some(_) => {
                warn!(
                    request_id = %request_id,
                    edge = edge.as_str(),
                    "transition lost write race"
                );
                Err(EngineError::ConcurrentModification)
            }
            None => Err(EngineError::not_found("request", request_id)),
        };
    }

    info!(
        request_id = %updated.id,
        edge = edge.as_str(),
        from = expected.as_str(),
        to = updated.status.as_str(),
        actor = %actor.id,
        "request transitioned"
    );
    Ok(updated)
}

/// Workload counter changes that must commit together with the CAS update.
#[derive(Debug, Default)]
struct CounterEffects {
    increment_active: Option<Uuid>,
    decrement_active: Option<Uuid>,
    increment_completed: Option<Uuid>,
}

fn apply_counter_effects(tx: &Connection, effects: &CounterEffects) -> Result<(), EngineError> {
    if let Some(id) = &effects.increment_active {
        repository::adjust_active_cases(tx, id, 1)?;
    }
    if let Some(id) = &effects.decrement_active {
        repository::adjust_active_cases(tx, id, -1)?;
    }
    if let Some(id) = &effects.increment_completed {
        repository::increment_completed_cases(tx, id)?;
    }
    Ok(())
}

/// Mutate the in-memory request per edge semantics and collect the counter
/// effects. Preconditions are verified here, before anything is written.
fn apply_edge_effects(
    conn: &Connection,
    actor: &Actor,
    request: &mut Request,
    edge: Edge,
    ctx: TransitionCtx,
) -> Result<CounterEffects, EngineError> {
    let mut effects = CounterEffects::default();
    let stamp = repository::now();

    match edge {
        Edge::Accept => {
            let profile = repository::get_clinician_profile(conn, &actor.id)?
                .ok_or_else(|| EngineError::not_found("clinician_profile", actor.id))?;
            if !profile.available {
                return Err(EngineError::PreconditionFailed(
                    "clinician is unavailable".into(),
                ));
            }
            if !profile.has_capacity() {
                return Err(EngineError::PreconditionFailed(
                    "clinician is at capacity".into(),
                ));
            }
            // A forwarded exam displaces the triaging nurse.
            if let Some(previous) = request.assigned_clinician.take() {
                if previous.id != actor.id {
                    effects.decrement_active = Some(previous.id);
                }
            }
            request.assigned_clinician = Some(AssignedClinician {
                id: actor.id,
                name: actor.name.clone(),
                role: profile.role,
            });
            request.assigned_at = Some(stamp);
            effects.increment_active = Some(actor.id);
        }
        Edge::Approve => {
            if request.request_type == RequestType::Exam && request.price.is_none() {
                let price = ctx.price.ok_or_else(|| {
                    EngineError::PreconditionFailed("exam approval requires a price".into())
                })?;
                request.price = Some(price);
            }
            if ctx.notes.is_some() {
                request.notes = ctx.notes;
            }
            request.approved_at = Some(stamp);
        }
        Edge::Reject => {
            let reason = ctx.rejection_reason.filter(|r| !r.trim().is_empty()).ok_or_else(|| {
                EngineError::PreconditionFailed("rejection requires a reason".into())
            })?;
            request.rejection_reason = Some(reason);
            if let Some(owner) = &request.assigned_clinician {
                effects.decrement_active = Some(owner.id);
            }
        }
        Edge::ForwardToDoctor => {
            if ctx.notes.is_some() {
                request.notes = ctx.notes;
            }
        }
        Edge::ConfirmPayment => {
            request.paid_at = Some(stamp);
        }
        Edge::Sign => {
            let signature = ctx.signature.ok_or_else(|| {
                EngineError::PreconditionFailed("signing requires signature data".into())
            })?;
            request.signature = Some(signature);
            request.signed_at = Some(stamp);
        }
        Edge::Start => {
            let room = ctx.video_room.ok_or_else(|| {
                EngineError::PreconditionFailed("starting a consultation requires a room".into())
            })?;
            request.video_room = Some(room);
        }
        Edge::End | Edge::Deliver => {
            request.completed_at = Some(stamp);
            if let Some(owner) = &request.assigned_clinician {
                effects.decrement_active = Some(owner.id);
                effects.increment_completed = Some(owner.id);
            }
        }
    }
    Ok(effects)
}

/// Convenience for assignment and tests: an actor standing for a clinician.
pub fn clinician_actor(id: Uuid, name: &str, role: ClinicianRole) -> Actor {
    Actor {
        id,
        name: name.into(),
        role: role.as_actor_role(),
    }
}
