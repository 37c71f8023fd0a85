//! Renova core: the request lifecycle and assignment engine behind the
//! Renova telehealth service.
//!
//! A patient submits a prescription renewal, an exam order or a
//! teleconsultation booking; the engine routes it through review,
//! payment, signing and delivery, assigns clinicians by workload and
//! keeps everyone informed along the way. Hosting API layers talk to
//! [`service::RequestService`]; everything below it is plumbing.

pub mod assignment;
pub mod authorization;
pub mod config;
pub mod db;
pub mod error;
pub mod integrations;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod service;
pub mod session;

pub use authorization::Actor;
pub use config::{EngineConfig, IntegrationMode};
pub use error::EngineError;
pub use service::{RequestService, TransitionInput};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default filter. Call once at startup; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
