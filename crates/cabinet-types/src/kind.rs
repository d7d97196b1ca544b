use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of every failure the cabinet can report.
///
/// Each crate keeps its own error enum; all of them map onto one of these
/// kinds so the service boundary can report a stable tag regardless of which
/// component failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DuplicateTicket,
    NotFound,
    UnsupportedPayloadKind,
    UnknownLoader,
    LoaderInvocationError,
    LoaderTimeout,
    AlreadyOpen,
    NotOpen,
    QueryTooNarrow,
    DestroyNotConfirmed,
    /// Request rejected at the transport boundary before reaching a component.
    InvalidRequest,
    /// Backing-location I/O, serialization or corruption.
    Storage,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateTicket => "DuplicateTicket",
            Self::NotFound => "NotFound",
            Self::UnsupportedPayloadKind => "UnsupportedPayloadKind",
            Self::UnknownLoader => "UnknownLoader",
            Self::LoaderInvocationError => "LoaderInvocationError",
            Self::LoaderTimeout => "LoaderTimeout",
            Self::AlreadyOpen => "AlreadyOpen",
            Self::NotOpen => "NotOpen",
            Self::QueryTooNarrow => "QueryTooNarrow",
            Self::DestroyNotConfirmed => "DestroyNotConfirmed",
            Self::InvalidRequest => "InvalidRequest",
            Self::Storage => "Storage",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
