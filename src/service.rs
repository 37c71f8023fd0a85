//! The orchestration layer: resolves actors, runs lifecycle transitions,
//! enriches edges with integration results and fans out notifications.
//! Hosting API layers call this and nothing below it.

use std::path::Path;

use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::config::{EngineConfig, IntegrationMode};
use crate::db::repository;
use crate::db::sqlite::{open_database, open_memory_database};
use crate::error::EngineError;
use crate::integrations::{
    self, PaymentCharge, PaymentGateway, RoomProvisioner, SignatureService,
};
use crate::lifecycle::{self, TransitionCtx};
use crate::models::enums::{ActorRole, ClinicianRole, Edge, RequestStatus, RequestType};
use crate::models::{ChatMessage, Notification, Request, RequestFilter, RequestPayload, User};
use crate::notify::{Dispatcher, ExpoPush, TemplateData, TemplateKey};
use crate::session::{self, Session};

/// Caller-supplied data for a transition. The engine itself supplies
/// signatures and video rooms; callers never pass them in.
#[derive(Debug, Default, Clone)]
pub struct TransitionInput {
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    /// Exam price, required at nurse approval.
    pub price: Option<f64>,
}

/// Operational dashboard numbers: requests per lifecycle status, staffing
/// and how long the submitted queue has been waiting.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueueStats {
    pub submitted: i64,
    pub in_review: i64,
    pub forwarded_to_doctor: i64,
    pub awaiting_payment: i64,
    pub paid: i64,
    pub in_progress: i64,
    pub signed: i64,
    pub delivered: i64,
    pub rejected: i64,
    pub available_doctors: usize,
    pub available_nurses: usize,
    /// Mean age of the submitted queue, zero when it is empty.
    pub avg_submitted_wait_minutes: f64,
}

pub struct RequestService {
    conn: Connection,
    config: EngineConfig,
    dispatcher: Dispatcher,
    payment: Box<dyn PaymentGateway>,
    signature: Box<dyn SignatureService>,
    video: Box<dyn RoomProvisioner>,
}

impl RequestService {
    /// Wire a service from configuration; integrations follow their modes.
    pub fn new(conn: Connection, config: EngineConfig) -> Self {
        let dispatcher = match config.push_mode {
            IntegrationMode::Live => Dispatcher::new(Box::new(ExpoPush::new())),
            IntegrationMode::Simulated => Dispatcher::simulated().0,
        };
        let payment = integrations::payment_gateway(config.payment_mode);
        let signature = integrations::signature_service(config.signature_mode);
        let video = integrations::room_provisioner(config.video_mode);
        Self::with_parts(conn, config, dispatcher, payment, signature, video)
    }

    /// Explicit wiring, used by tests to keep handles on simulated parts.
    pub fn with_parts(
        conn: Connection,
        config: EngineConfig,
        dispatcher: Dispatcher,
        payment: Box<dyn PaymentGateway>,
        signature: Box<dyn SignatureService>,
        video: Box<dyn RoomProvisioner>,
    ) -> Self {
        Self {
            conn,
            config,
            dispatcher,
            payment,
            signature,
            video,
        }
    }

    pub fn open(path: &Path, config: EngineConfig) -> Result<Self, EngineError> {
        let conn = open_database(path)?;
        Ok(Self::new(conn, config))
    }

    pub fn in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        let conn = open_memory_database()?;
        Ok(Self::new(conn, config))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ═══════════════════════ sessions ═══════════════════════

    /// Open a session for an active user.
    pub fn start_session(&self, user_id: &Uuid) -> Result<Session, EngineError> {
        let user = repository::get_user(&self.conn, user_id)?
            .ok_or_else(|| EngineError::not_found("user", user_id))?;
        if !user.active {
            return Err(EngineError::Forbidden);
        }
        Ok(session::create_session(
            &self.conn,
            &user,
            self.config.session_ttl_minutes,
        )?)
    }

    /// Resolve a token to an actor. Expired or unknown tokens are Forbidden.
    pub fn resolve_session(&self, token: &str) -> Result<Actor, EngineError> {
        let Some(session) = session::get_session(&self.conn, token)? else {
            return Err(EngineError::Forbidden);
        };
        let user = repository::get_user(&self.conn, &session.user_id)?
            .ok_or(EngineError::Forbidden)?;
        if !user.active {
            return Err(EngineError::Forbidden);
        }
        Ok(Actor {
            id: user.id,
            name: user.name,
            role: user.role,
        })
    }

    pub fn end_session(&self, token: &str) -> Result<(), EngineError> {
        session::delete_session(&self.conn, token)?;
        Ok(())
    }

    // ═══════════════════════ requests ═══════════════════════

    /// Create a request from a patient submission. Prescription and
    /// consultation prices come from configuration; exams are priced by
    /// the nurse at approval.
    pub fn submit_request(
        &self,
        actor: &Actor,
        payload: RequestPayload,
        notes: Option<String>,
    ) -> Result<Request, EngineError> {
        if actor.role != ActorRole::Patient {
            return Err(EngineError::Forbidden);
        }
        let request_type = payload.request_type();
        let price = match request_type {
            RequestType::Prescription => Some(self.config.prescription_price),
            RequestType::Consultation => Some(self.config.consultation_price),
            RequestType::Exam => None,
        };
        let request = Request {
            id: Uuid::new_v4(),
            request_type,
            status: RequestStatus::Submitted,
            patient_id: actor.id,
            patient_name: actor.name.clone(),
            assigned_clinician: None,
            price,
            payload,
            notes,
            rejection_reason: None,
            signature: None,
            video_room: None,
            created_at: repository::now(),
            assigned_at: None,
            approved_at: None,
            paid_at: None,
            signed_at: None,
            completed_at: None,
        };
        repository::insert_request(&self.conn, &request)?;
        info!(
            request_id = %request.id,
            request_type = request_type.as_str(),
            "request submitted"
        );

        // The patient gets a receipt; new work pings the pool that can
        // claim it, and the admins.
        let data = TemplateData {
            request_label: Some(request_label(request_type).into()),
            ..Default::default()
        };
        self.dispatcher.notify_user(
            &self.conn,
            &actor.id,
            TemplateKey::RequestReceived,
            &data,
            Some(request.id),
        )?;
        self.dispatcher.notify_available_clinicians(
            &self.conn,
            request.required_role_for_accept(),
            None,
            TemplateKey::NewRequest,
            &data,
            Some(request.id),
        )?;
        self.dispatcher.notify_role(
            &self.conn,
            ActorRole::Admin,
            TemplateKey::NewRequest,
            &data,
            Some(request.id),
        )?;
        Ok(request)
    }

    pub fn get_request(&self, actor: &Actor, id: &Uuid) -> Result<Request, EngineError> {
        let request = repository::get_request(&self.conn, id)?
            .ok_or_else(|| EngineError::not_found("request", id))?;
        authorization::check_read(actor, &request)?;
        Ok(request)
    }

    /// List requests, narrowed to what the actor may see. Patients are
    /// pinned to their own requests regardless of the filter they pass.
    pub fn list_requests(
        &self,
        actor: &Actor,
        mut filter: RequestFilter,
    ) -> Result<Vec<Request>, EngineError> {
        if actor.role == ActorRole::Patient {
            filter.patient_id = Some(actor.id);
        }
        let mut requests = repository::list_requests(&self.conn, &filter)?;
        requests.retain(|r| authorization::can_read(actor, r));
        Ok(requests)
    }

    /// Run one lifecycle edge. Signing and consultation start are enriched
    /// with integration results before the state machine runs.
    pub fn transition(
        &self,
        actor: &Actor,
        request_id: &Uuid,
        edge: Edge,
        input: TransitionInput,
    ) -> Result<Request, EngineError> {
        let mut ctx = TransitionCtx {
            notes: input.notes,
            rejection_reason: input.rejection_reason,
            price: input.price,
            signature: None,
            video_room: None,
        };

        // Enriched edges check the transition table before calling out, so
        // an illegal edge never produces an external signature or room. A
        // race lost after this point wastes at most one integration call.
        match edge {
            Edge::Sign => {
                let request = self.get_request(actor, request_id)?;
                authorization::check_transition(actor, &request, edge)?;
                if lifecycle::next_status(request.request_type, request.status, edge).is_none() {
                    return Err(EngineError::InvalidTransition {
                        from: request.status,
                        edge,
                    });
                }
                let signature = self
                    .signature
                    .sign(&request, &actor.name)
                    .map_err(|e| EngineError::PreconditionFailed(e.to_string()))?;
                ctx.signature = Some(signature);
            }
            Edge::Start => {
                let request = self.get_request(actor, request_id)?;
                authorization::check_transition(actor, &request, edge)?;
                if lifecycle::next_status(request.request_type, request.status, edge).is_none() {
                    return Err(EngineError::InvalidTransition {
                        from: request.status,
                        edge,
                    });
                }
                let room = self
                    .video
                    .create_room(request_id)
                    .map_err(|e| EngineError::PreconditionFailed(e.to_string()))?;
                ctx.video_room = Some(room);
            }
            _ => {}
        }

        let request = lifecycle::transition(&self.conn, actor, request_id, edge, ctx)?;
        if let Err(e) = self.fan_out(&request, edge) {
            // The transition committed; a notification failure must not
            // roll it back or mask the result.
            warn!(request_id = %request.id, error = %e, "notification fan-out failed");
        }
        Ok(request)
    }

    /// Payment webhook entry point: the gateway confirmed a charge.
    pub fn confirm_payment(&self, request_id: &Uuid) -> Result<Request, EngineError> {
        self.transition(
            &Actor::system(),
            request_id,
            Edge::ConfirmPayment,
            TransitionInput::default(),
        )
    }

    /// Create a charge for an approved request.
    pub fn create_charge(
        &self,
        actor: &Actor,
        request_id: &Uuid,
    ) -> Result<PaymentCharge, EngineError> {
        let request = self.get_request(actor, request_id)?;
        if request.status != RequestStatus::ApprovedPendingPayment {
            return Err(EngineError::InvalidTransition {
                from: request.status,
                edge: Edge::ConfirmPayment,
            });
        }
        let amount = request.price.ok_or_else(|| {
            EngineError::PreconditionFailed("request has no price".into())
        })?;
        self.payment
            .create_charge(request_id, amount)
            .map_err(|e| EngineError::PreconditionFailed(e.to_string()))
    }

    /// Assign pending requests and tell the affected patients.
    pub fn auto_assign(&self) -> Result<crate::assignment::BatchReport, EngineError> {
        let report = crate::assignment::auto_assign_batch(&self.conn, self.config.auto_assign_limit)?;
        for (request_id, _) in &report.assigned {
            if let Some(request) = repository::get_request(&self.conn, request_id)? {
                self.dispatcher.notify_user(
                    &self.conn,
                    &request.patient_id,
                    TemplateKey::RequestAccepted,
                    &TemplateData {
                        request_label: Some(request_label(request.request_type).into()),
                        clinician_name: request.assigned_clinician.map(|c| c.name),
                        ..Default::default()
                    },
                    Some(*request_id),
                )?;
            }
        }
        Ok(report)
    }

    pub fn queue_stats(&self) -> Result<QueueStats, EngineError> {
        let count = |status| -> Result<i64, EngineError> {
            Ok(repository::count_requests_in_statuses(
                &self.conn,
                &[status],
            )?)
        };
        let pending = repository::list_requests(
            &self.conn,
            &RequestFilter {
                status: Some(RequestStatus::Submitted),
                ..Default::default()
            },
        )?;
        let avg_submitted_wait_minutes = if pending.is_empty() {
            0.0
        } else {
            let reference = repository::now();
            let total_secs: i64 = pending
                .iter()
                .map(|r| (reference - r.created_at).num_seconds().max(0))
                .sum();
            total_secs as f64 / 60.0 / pending.len() as f64
        };

        Ok(QueueStats {
            submitted: count(RequestStatus::Submitted)?,
            in_review: count(RequestStatus::InReview)?,
            forwarded_to_doctor: count(RequestStatus::ForwardedToDoctor)?,
            awaiting_payment: count(RequestStatus::ApprovedPendingPayment)?,
            paid: count(RequestStatus::Paid)?,
            in_progress: count(RequestStatus::InProgress)?,
            signed: count(RequestStatus::Signed)?,
            delivered: count(RequestStatus::Delivered)?,
            rejected: count(RequestStatus::Rejected)?,
            available_doctors: repository::list_available_clinicians(
                &self.conn,
                ClinicianRole::Doctor,
                None,
            )?
            .len(),
            available_nurses: repository::list_available_clinicians(
                &self.conn,
                ClinicianRole::Nurse,
                None,
            )?
            .len(),
            avg_submitted_wait_minutes,
        })
    }

    // ═══════════════════════ chat ═══════════════════════

    pub fn send_chat_message(
        &self,
        actor: &Actor,
        request_id: &Uuid,
        body: &str,
    ) -> Result<ChatMessage, EngineError> {
        if body.trim().is_empty() {
            return Err(EngineError::PreconditionFailed("empty message".into()));
        }
        let request = self.get_request(actor, request_id)?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            request_id: request.id,
            sender_id: actor.id,
            sender_name: actor.name.clone(),
            sender_role: actor.role,
            body: body.to_string(),
            read: false,
            created_at: repository::now(),
        };
        repository::insert_chat_message(&self.conn, &message)?;

        // Tell the other side of the thread.
        let counterpart = if actor.id == request.patient_id {
            request.assigned_clinician.as_ref().map(|c| c.id)
        } else {
            Some(request.patient_id)
        };
        if let Some(recipient) = counterpart {
            if let Err(e) = self.dispatcher.notify_user(
                &self.conn,
                &recipient,
                TemplateKey::NewChatMessage,
                &TemplateData {
                    sender_name: Some(actor.name.clone()),
                    ..Default::default()
                },
                Some(request.id),
            ) {
                warn!(request_id = %request.id, error = %e, "chat notification failed");
            }
        }
        Ok(message)
    }

    pub fn list_chat(
        &self,
        actor: &Actor,
        request_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, EngineError> {
        self.get_request(actor, request_id)?;
        Ok(repository::list_chat_messages(&self.conn, request_id)?)
    }

    pub fn mark_chat_read(&self, actor: &Actor, request_id: &Uuid) -> Result<usize, EngineError> {
        self.get_request(actor, request_id)?;
        Ok(repository::mark_chat_read(&self.conn, request_id, &actor.id)?)
    }

    // ═══════════════════════ clinicians & notifications ═══════════════════════

    pub fn set_availability(&self, actor: &Actor, available: bool) -> Result<(), EngineError> {
        if !actor.is_clinician() {
            return Err(EngineError::Forbidden);
        }
        repository::set_availability(&self.conn, &actor.id, available)?;
        info!(clinician = %actor.id, available, "availability changed");
        Ok(())
    }

    pub fn register_push_token(&self, actor: &Actor, token: Option<&str>) -> Result<(), EngineError> {
        repository::set_push_token(&self.conn, &actor.id, token)?;
        Ok(())
    }

    pub fn notifications(&self, actor: &Actor) -> Result<Vec<Notification>, EngineError> {
        Ok(repository::list_notifications_for(&self.conn, &actor.id)?)
    }

    pub fn mark_notification_read(
        &self,
        actor: &Actor,
        notification_id: &Uuid,
    ) -> Result<(), EngineError> {
        repository::mark_notification_read(&self.conn, notification_id, &actor.id)?;
        Ok(())
    }

    pub fn register_user(&self, user: &User) -> Result<(), EngineError> {
        repository::insert_user(&self.conn, user)?;
        Ok(())
    }

    // ═══════════════════════ fan-out ═══════════════════════

    fn fan_out(&self, request: &Request, edge: Edge) -> Result<(), EngineError> {
        let label = request_label(request.request_type);
        let data = TemplateData {
            patient_name: Some(request.patient_name.clone()),
            // Once signed, the signer is the name the patient cares about;
            // a nurse-owned exam is signed by a doctor who never claims it.
            clinician_name: request
                .signature
                .as_ref()
                .map(|s| s.signer_name.clone())
                .or_else(|| request.assigned_clinician.as_ref().map(|c| c.name.clone())),
            request_label: Some(label.into()),
            price: request.price,
            reason: request.rejection_reason.clone(),
            url: request.video_room.as_ref().map(|r| r.url.clone()),
            ..Default::default()
        };
        let related = Some(request.id);

        match edge {
            Edge::Accept => {
                self.dispatcher.notify_user(
                    &self.conn,
                    &request.patient_id,
                    TemplateKey::RequestAccepted,
                    &data,
                    related,
                )?;
            }
            Edge::Approve => {
                self.dispatcher.notify_user(
                    &self.conn,
                    &request.patient_id,
                    TemplateKey::RequestApproved,
                    &data,
                    related,
                )?;
            }
            Edge::Reject => {
                self.dispatcher.notify_user(
                    &self.conn,
                    &request.patient_id,
                    TemplateKey::RequestRejected,
                    &data,
                    related,
                )?;
            }
            Edge::ForwardToDoctor => {
                self.dispatcher.notify_available_clinicians(
                    &self.conn,
                    ClinicianRole::Doctor,
                    None,
                    TemplateKey::ExamForwarded,
                    &data,
                    related,
                )?;
            }
            Edge::ConfirmPayment => {
                if let Some(clinician) = &request.assigned_clinician {
                    self.dispatcher.notify_user(
                        &self.conn,
                        &clinician.id,
                        TemplateKey::PaymentConfirmed,
                        &data,
                        related,
                    )?;
                }
            }
            Edge::Sign => {
                self.dispatcher.notify_user(
                    &self.conn,
                    &request.patient_id,
                    TemplateKey::PrescriptionReady,
                    &data,
                    related,
                )?;
            }
            Edge::Start => {
                self.dispatcher.notify_user(
                    &self.conn,
                    &request.patient_id,
                    TemplateKey::ConsultationStarted,
                    &data,
                    related,
                )?;
            }
            Edge::End | Edge::Deliver => {
                self.dispatcher.notify_user(
                    &self.conn,
                    &request.patient_id,
                    TemplateKey::RequestDelivered,
                    &data,
                    related,
                )?;
            }
        }
        Ok(())
    }
}

fn request_label(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::Prescription => "receita",
        RequestType::Exam => "exame",
        RequestType::Consultation => "consulta",
    }
}
