use std::fmt;

use cabinet_types::{ErrorKind, TypeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error as it travels over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(subject) = &self.subject {
            write!(f, " ({subject})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame type: {0}")]
    InvalidFrameType(u8),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Rejected at the boundary before reaching a component.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A component failed; the body carries its kind and subject.
    #[error("{0}")]
    Service(ErrorBody),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Service(body) => body.kind,
            Self::InvalidRequest(_) | Self::InvalidFrameType(_) | Self::FramingError(_) => {
                ErrorKind::InvalidRequest
            }
            Self::FrameTooLarge { .. }
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::Transport(_) => ErrorKind::Internal,
        }
    }

    /// The wire form of this error.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::Service(body) => body.clone(),
            other => ErrorBody::new(other.kind(), other.to_string()),
        }
    }
}

impl From<TypeError> for ProtocolError {
    fn from(e: TypeError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<ErrorBody> for ProtocolError {
    fn from(body: ErrorBody) -> Self {
        Self::Service(body)
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
