use thiserror::Error;

use crate::db::StoreError;
use crate::models::enums::{Edge, RequestStatus};

/// Engine-level error taxonomy. Every variant maps to a distinct, stable
/// machine code via [`EngineError::code`] so API clients can branch
/// without string matching.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transition '{}' is not valid from status '{}'", edge.as_str(), from.as_str())]
    InvalidTransition { from: RequestStatus, edge: Edge },

    #[error("access denied")]
    Forbidden,

    /// The conditional update lost a race: another actor transitioned the
    /// request first. Callers should re-fetch; the API layer may retry once.
    #[error("request was modified concurrently; re-fetch and retry")]
    ConcurrentModification,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Forbidden => "forbidden",
            Self::ConcurrentModification => "concurrent_modification",
            Self::NotFound { .. } => "not_found",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::Store(_) => "store_error",
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
