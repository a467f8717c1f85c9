//! Engine errors.
//!
//! Four classes: referential lookups (fatal, never retried), accumulated
//! validation failures (user-facing), evaluation failures (fatal during
//! instantiation, warning-only inside the simulator walk), and
//! projection failures from the path runtime. Trigger handler errors are
//! never surfaced here -- the trigger manager converts them into error
//! responses instead.

use waymark_model::{ModelError, ValidationError};

use crate::enrich::EnrichError;
use crate::patch::ProjectionError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Unknown scenario/state/action/actor key.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Accumulated field-scoped validation failures.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Enrichment failed while instantiating a state -- fatal for the
    /// call, wrapped with state and process context.
    #[error("failed to instantiate state '{state}' of process '{process}': {message}")]
    Instantiate {
        state: String,
        process: String,
        message: String,
    },

    /// Enrichment failed outside state instantiation.
    #[error(transparent)]
    Enrich(#[from] EnrichError),

    /// The path runtime rejected or failed a projection.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// A precondition on the call itself was violated.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl EngineError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument {
            message: message.into(),
        }
    }
}
