use std::path::PathBuf;

use cabinet_catalog::CatalogError;
use cabinet_loader::LoaderError;
use cabinet_store::StoreError;
use cabinet_types::{CabinetId, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CabinetError {
    #[error("cabinet is already open")]
    AlreadyOpen,

    #[error("cabinet is not open")]
    NotOpen,

    #[error("refusing to destroy {0} without confirmation")]
    DestroyNotConfirmed(PathBuf),

    #[error("location {location} belongs to cabinet {found}, not {expected}")]
    LocationClaimed {
        location: PathBuf,
        expected: CabinetId,
        found: CabinetId,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt data at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CabinetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyOpen => ErrorKind::AlreadyOpen,
            Self::NotOpen => ErrorKind::NotOpen,
            Self::DestroyNotConfirmed(_) => ErrorKind::DestroyNotConfirmed,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Store(e) => e.kind(),
            Self::Catalog(e) => e.kind(),
            Self::Loader(e) => e.kind(),
            Self::LocationClaimed { .. } | Self::Io { .. } | Self::Corrupt { .. } => {
                ErrorKind::Storage
            }
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The ticket, dataset name, predicate or path the error is about.
    pub fn subject(&self) -> Option<String> {
        match self {
            Self::Store(StoreError::NotFound(t) | StoreError::DuplicateTicket(t))
            | Self::Catalog(CatalogError::NotFound(t) | CatalogError::DuplicateTicket(t)) => {
                Some(t.to_string())
            }
            Self::Catalog(CatalogError::QueryTooNarrow { predicate }) => Some(predicate.clone()),
            Self::Loader(e) => e.subject(),
            Self::DestroyNotConfirmed(path)
            | Self::LocationClaimed { location: path, .. }
            | Self::Io { path, .. }
            | Self::Corrupt { path, .. } => Some(path.display().to_string()),
            _ => None,
        }
    }
}

pub type CabinetResult<T> = Result<T, CabinetError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_types::Ticket;

    #[test]
    fn component_kinds_pass_through() {
        let t = Ticket::new();
        let err = CabinetError::from(StoreError::NotFound(t));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.subject(), Some(t.to_string()));

        let err = CabinetError::from(CatalogError::DuplicateTicket(t));
        assert_eq!(err.kind(), ErrorKind::DuplicateTicket);

        let err = CabinetError::from(LoaderError::UnknownDataset("titanic".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.subject().as_deref(), Some("titanic"));
    }

    #[test]
    fn storage_kinds() {
        let err = CabinetError::corrupt("/tmp/x", "bad magic");
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.subject().as_deref(), Some("/tmp/x"));
    }
}
