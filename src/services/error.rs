//! Errors returned by the counter and event services.

use crate::model::EntityKind;
use crate::storage::StorageError;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors a service operation can surface to its caller.
///
/// Cache failures never appear here; they are logged where they occur.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => ServiceError::NotFound { kind, id },
            other => ServiceError::StoreUnavailable(other),
        }
    }
}

impl ServiceError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        ServiceError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Reject an empty required argument before any store or cache access.
pub fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ServiceError::InvalidArgument(format!("{} is required", field)));
    }
    Ok(())
}
