use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable identity of a cabinet.
///
/// A named cabinet derives its id deterministically (UUID v5 over the DNS
/// namespace), so the same name always maps to the same id in every process.
/// An unnamed cabinet gets a random id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CabinetId(uuid::Uuid);

impl CabinetId {
    /// Derive the id for a named cabinet.
    pub fn derive(name: &str) -> Self {
        Self(uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_DNS, name.as_bytes()))
    }

    /// A random id for an anonymous cabinet.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Named cabinets derive their id; anonymous ones are random.
    pub fn for_name(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self::derive(name),
            None => Self::random(),
        }
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short identifier (first 8 characters).
    pub fn short_id(&self) -> String {
        format!("cab:{}", &self.0.simple().to_string()[..8])
    }

    /// Parse the hyphenated or simple UUID text form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("cab:").unwrap_or(s);
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidCabinetId(e.to_string()))
    }
}

impl fmt::Debug for CabinetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CabinetId({})", self.short_id())
    }
}

impl fmt::Display for CabinetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
