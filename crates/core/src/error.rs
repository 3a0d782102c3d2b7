use thiserror::Error;

use crate::document::validate::ValidationError;

/// Errors surfaced by the document managers.
///
/// The HTTP layer maps each variant to a status code; nothing here is
/// swallowed on the way out except best-effort file cleanup and notifications.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A stored record violates an invariant the schema should have enforced.
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl DocumentError {
    pub fn document_not_found(id: uuid::Uuid) -> Self {
        DocumentError::NotFound(format!("document {id}"))
    }

    pub fn share_not_found(id: uuid::Uuid) -> Self {
        DocumentError::NotFound(format!("share {id}"))
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;
