//! Model-level errors: referential lookups and malformed data.

use crate::validation::ValidationError;

/// Errors raised by the data model. Referential variants are fatal to the
/// call that raised them and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("unknown state '{key}'")]
    UnknownState { key: String },

    #[error("unknown action '{key}'")]
    UnknownAction { key: String },

    #[error("unknown actor '{key}'")]
    UnknownActor { key: String },

    #[error("invalid duration '{value}': {message}")]
    InvalidDuration { value: String, message: String },

    #[error("invalid data: {message}")]
    InvalidData { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ModelError {
    pub(crate) fn invalid_data(err: impl std::fmt::Display) -> Self {
        ModelError::InvalidData {
            message: err.to_string(),
        }
    }
}
