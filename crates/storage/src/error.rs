/// All errors a storage backend can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record with the given id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A record with this id already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// The record could not be encoded or decoded.
    #[error("serialization failure for {kind} {id}: {message}")]
    Serialization {
        kind: &'static str,
        id: String,
        message: String,
    },

    /// A backend-specific failure (connection, I/O, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::AlreadyExists {
            kind,
            id: id.into(),
        }
    }
}
