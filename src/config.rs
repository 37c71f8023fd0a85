use serde::{Deserialize, Serialize};

/// Engine-level constants
pub const ENGINE_NAME: &str = "Renova";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "renova_core=info"
}

/// How an external collaborator is wired: a real client or the built-in
/// development simulation. Chosen once at startup; call sites never branch
/// on configuration state themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationMode {
    Live,
    Simulated,
}

/// Engine configuration, injected by the hosting API layer.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub payment_mode: IntegrationMode,
    pub push_mode: IntegrationMode,
    pub signature_mode: IntegrationMode,
    pub video_mode: IntegrationMode,
    /// Maximum requests processed per auto-assign sweep.
    pub auto_assign_limit: usize,
    /// Session lifetime for the persisted token store.
    pub session_ttl_minutes: i64,
    /// Base price stamped on prescription requests at submission.
    pub prescription_price: f64,
    /// Base price stamped on consultation requests at submission.
    pub consultation_price: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payment_mode: IntegrationMode::Simulated,
            push_mode: IntegrationMode::Simulated,
            signature_mode: IntegrationMode::Simulated,
            video_mode: IntegrationMode::Simulated,
            auto_assign_limit: 100,
            session_ttl_minutes: 12 * 60,
            prescription_price: 49.90,
            consultation_price: 79.90,
        }
    }
}
