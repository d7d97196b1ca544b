use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque retrieval handle for one stored dataset.
///
/// Tickets are UUID v7 values: a millisecond timestamp prefix followed by
/// random bits. They stay unique across cabinet restarts without any shared
/// counter, and sort roughly by issue time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(uuid::Uuid);

impl Ticket {
    /// Mint a fresh time-ordered ticket.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }

    /// Parse the hyphenated text form.
    ///
    /// Only the canonical hyphenated layout is accepted so that tickets have
    /// exactly one spelling on the wire and on disk.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        if trimmed.len() != 36 {
            return Err(TypeError::InvalidTicket(s.to_string()));
        }
        uuid::Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| TypeError::InvalidTicket(s.to_string()))
    }
}

impl Default for Ticket {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Ticket {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({})", self.short_id())
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
