use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Publication state of a dataset record.
///
/// A payload that has been put but not yet registered is `Unregistered`;
/// only `Registered` records are visible to queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Unregistered,
    Registered,
}

impl RecordStatus {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "unregistered"),
            Self::Registered => write!(f, "registered"),
        }
    }
}

/// Whether a record survives a close/open cycle of its cabinet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    /// Dropped when the cabinet closes.
    Ephemeral,
    /// Written to the backing location on close, restored on open.
    #[default]
    Persistent,
}

impl Persistence {
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent)
    }
}

impl fmt::Display for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ephemeral => write!(f, "ephemeral"),
            Self::Persistent => write!(f, "persistent"),
        }
    }
}

impl FromStr for Persistence {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ephemeral" => Ok(Self::Ephemeral),
            "persistent" => Ok(Self::Persistent),
            other => Err(TypeError::UnsupportedValue {
                field: "persistence".into(),
                reason: format!("expected ephemeral or persistent, got {other:?}"),
            }),
        }
    }
}

/// A transition on one of the two record axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "axis", content = "value", rename_all = "snake_case")]
pub enum StatusChange {
    Status(RecordStatus),
    Persistence(Persistence),
}

impl fmt::Display for StatusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(s) => write!(f, "status={s}"),
            Self::Persistence(p) => write!(f, "persistence={p}"),
        }
    }
}
