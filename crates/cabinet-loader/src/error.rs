use cabinet_types::ErrorKind;

use crate::definition::LoaderId;

/// Why a single loader invocation failed.
///
/// Cloneable so one failure can be handed to every waiter of a shared
/// invocation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadFailure {
    /// The bound arguments do not fit the loader.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Reading or fetching the source failed.
    #[error("source error: {0}")]
    Source(String),

    /// The source produced data that cannot be normalized into a table.
    #[error("unusable data: {0}")]
    Data(String),
}

impl LoadFailure {
    pub fn arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments(reason.into())
    }

    pub fn source_error(reason: impl ToString) -> Self {
        Self::Source(reason.to_string())
    }
}

/// Errors from the loader registry.
#[derive(Clone, Debug, thiserror::Error)]
pub enum LoaderError {
    /// The loader reference is not in the allow-list.
    #[error("unknown loader: {0}")]
    UnknownLoader(LoaderId),

    /// No definition is installed under the name.
    #[error("no dataset named {0:?} is installed")]
    UnknownDataset(String),

    /// The loader ran and failed.
    #[error("loading {name:?} failed: {source}")]
    Invocation {
        name: String,
        #[source]
        source: LoadFailure,
    },

    /// The loader did not finish within the configured timeout.
    #[error("loading {name:?} timed out after {after_ms} ms")]
    Timeout { name: String, after_ms: u64 },

    /// A registry lock was poisoned by a panicking writer.
    #[error("loader registry lock poisoned: {0}")]
    LockPoisoned(String),
}

impl LoaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownLoader(_) => ErrorKind::UnknownLoader,
            Self::UnknownDataset(_) => ErrorKind::NotFound,
            Self::Invocation { .. } => ErrorKind::LoaderInvocationError,
            Self::Timeout { .. } => ErrorKind::LoaderTimeout,
            Self::LockPoisoned(_) => ErrorKind::Internal,
        }
    }

    /// The dataset name or loader id the error is about.
    pub fn subject(&self) -> Option<String> {
        match self {
            Self::UnknownLoader(id) => Some(id.to_string()),
            Self::UnknownDataset(name)
            | Self::Invocation { name, .. }
            | Self::Timeout { name, .. } => Some(name.clone()),
            Self::LockPoisoned(_) => None,
        }
    }
}

/// Convenience alias for loader registry results.
pub type LoaderResult<T> = Result<T, LoaderError>;
