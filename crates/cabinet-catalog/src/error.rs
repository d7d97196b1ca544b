//! Error types for the catalog crate.

use cabinet_types::{ErrorKind, Predicate, Ticket};

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No record exists for the ticket.
    #[error("ticket not found in catalog: {0}")]
    NotFound(Ticket),

    /// The ticket is already registered (or already present, on restore).
    #[error("ticket already registered: {0}")]
    DuplicateTicket(Ticket),

    /// The caller required at least one match and got none.
    #[error("no registered dataset matches {predicate}")]
    QueryTooNarrow { predicate: String },

    /// The catalog lock was poisoned by a panicking writer.
    #[error("catalog lock poisoned: {0}")]
    LockPoisoned(String),
}

impl CatalogError {
    pub(crate) fn too_narrow(predicate: &Predicate) -> Self {
        Self::QueryTooNarrow {
            predicate: predicate.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateTicket(_) => ErrorKind::DuplicateTicket,
            Self::QueryTooNarrow { .. } => ErrorKind::QueryTooNarrow,
            Self::LockPoisoned(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = Result<T, CatalogError>;
