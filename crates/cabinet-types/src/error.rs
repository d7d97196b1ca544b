use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("invalid cabinet id: {0}")]
    InvalidCabinetId(String),

    #[error("unsupported value for {field}: {reason}")]
    UnsupportedValue { field: String, reason: String },

    #[error("invalid assignment {0:?}: expected key=value")]
    InvalidAssignment(String),
}
