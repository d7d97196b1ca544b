use cabinet_types::{ErrorKind, Ticket};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No payload is stored under the ticket.
    #[error("payload not found: {0}")]
    NotFound(Ticket),

    /// A payload already exists under the ticket.
    #[error("ticket already holds a payload: {0}")]
    DuplicateTicket(Ticket),

    /// The payload cannot be normalized into a table.
    #[error("unsupported payload: {reason}")]
    UnsupportedPayload { reason: String },

    /// The issuer could not find a free ticket.
    #[error("no free ticket after {attempts} attempts")]
    TicketSpaceExhausted { attempts: usize },

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedPayload {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateTicket(_) => ErrorKind::DuplicateTicket,
            Self::UnsupportedPayload { .. } => ErrorKind::UnsupportedPayloadKind,
            Self::TicketSpaceExhausted { .. } | Self::LockPoisoned(_) => ErrorKind::Internal,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
