//! External collaborators behind traits: payment, document signing and
//! video rooms. Each has a live client and a built-in simulation; the
//! configured [`IntegrationMode`] picks one at startup and the rest of
//! the engine never branches on it again.

pub mod payment;
pub mod signature;
pub mod video;

pub use payment::{ChargeStatus, PaymentCharge, PaymentGateway, SimulatedPayment};
pub use signature::{SignatureService, SimulatedSignature};
pub use video::{RoomProvisioner, SimulatedRooms};

use thiserror::Error;

use crate::config::IntegrationMode;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("integration request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} rejected the request: {reason}")]
    Rejected { service: &'static str, reason: String },
}

pub fn payment_gateway(mode: IntegrationMode) -> Box<dyn PaymentGateway> {
    match mode {
        IntegrationMode::Live => Box::new(payment::LivePayment::from_env()),
        IntegrationMode::Simulated => Box::new(SimulatedPayment),
    }
}

pub fn signature_service(mode: IntegrationMode) -> Box<dyn SignatureService> {
    match mode {
        IntegrationMode::Live => Box::new(signature::LiveSignature::from_env()),
        IntegrationMode::Simulated => Box::new(SimulatedSignature),
    }
}

pub fn room_provisioner(mode: IntegrationMode) -> Box<dyn RoomProvisioner> {
    match mode {
        IntegrationMode::Live => Box::new(video::LiveRooms::from_env()),
        IntegrationMode::Simulated => Box::new(SimulatedRooms::default()),
    }
}
