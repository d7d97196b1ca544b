//! A single catalog entry.

use cabinet_types::{Metadata, Persistence, RecordStatus, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One dataset known to the catalog.
///
/// `seq` orders records for queries. It is bumped when a staged record is
/// published, so query order is registration order rather than put order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub ticket: Ticket,
    pub metadata: Metadata,
    pub status: RecordStatus,
    pub persistence: Persistence,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl DatasetRecord {
    /// A freshly staged record: no metadata, not yet visible to queries.
    pub fn staged(ticket: Ticket, persistence: Persistence, seq: u64) -> Self {
        Self {
            ticket,
            metadata: Metadata::new(),
            status: RecordStatus::Unregistered,
            persistence,
            seq,
            created_at: Utc::now(),
            registered_at: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.status.is_registered()
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_persistent()
    }

    pub(crate) fn publish(&mut self, metadata: Metadata, seq: u64) {
        self.metadata = metadata;
        self.status = RecordStatus::Registered;
        self.seq = seq;
        self.registered_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_record_is_unregistered_and_empty() {
        let r = DatasetRecord::staged(Ticket::new(), Persistence::Ephemeral, 3);
        assert!(!r.is_registered());
        assert!(!r.is_persistent());
        assert!(r.metadata.is_empty());
        assert!(r.registered_at.is_none());
    }

    #[test]
    fn publish_sets_metadata_and_timestamp() {
        let mut r = DatasetRecord::staged(Ticket::new(), Persistence::Persistent, 0);
        r.publish(Metadata::new().with("a", 1i64), 7);
        assert!(r.is_registered());
        assert_eq!(r.seq, 7);
        assert!(r.registered_at.is_some());
    }

    #[test]
    fn json_roundtrip() {
        let mut r = DatasetRecord::staged(Ticket::new(), Persistence::Persistent, 1);
        r.publish(Metadata::new().with("name", "titanic"), 2);
        let json = serde_json::to_string(&r).unwrap();
        let back: DatasetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
