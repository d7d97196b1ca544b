use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use cabinet_types::Ticket;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::issuer::TicketIssuer;
use crate::table::Table;
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Tables are held behind a `RwLock` and shared with readers through `Arc`,
/// so a `get` never copies the payload.
pub struct InMemoryObjectStore {
    tables: RwLock<HashMap<Ticket, Arc<Table>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tables currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_map()?.is_empty())
    }

    /// Total rows across all stored tables.
    pub fn total_rows(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.values().map(|t| t.num_rows()).sum())
    }

    /// Remove every table.
    pub fn clear(&self) -> StoreResult<()> {
        self.write_map()?.clear();
        Ok(())
    }

    /// Keep only the tables whose ticket satisfies `keep`. Returns the
    /// number removed.
    pub fn retain(&self, keep: impl Fn(&Ticket) -> bool) -> StoreResult<usize> {
        let mut map = self.write_map()?;
        let before = map.len();
        map.retain(|ticket, _| keep(ticket));
        Ok(before - map.len())
    }

    fn read_map(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<Ticket, Arc<Table>>>> {
        self.tables
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_map(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<Ticket, Arc<Table>>>> {
        self.tables
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, issuer: &TicketIssuer, table: Table) -> StoreResult<Ticket> {
        let mut map = self.write_map()?;
        let ticket = issuer.issue(|t| map.contains_key(t))?;
        debug!(%ticket, rows = table.num_rows(), cols = table.num_columns(), "stored payload");
        map.insert(ticket, Arc::new(table));
        Ok(ticket)
    }

    fn insert(&self, ticket: Ticket, table: Arc<Table>) -> StoreResult<()> {
        let mut map = self.write_map()?;
        if map.contains_key(&ticket) {
            return Err(StoreError::DuplicateTicket(ticket));
        }
        map.insert(ticket, table);
        Ok(())
    }

    fn get(&self, ticket: &Ticket) -> StoreResult<Arc<Table>> {
        self.read_map()?
            .get(ticket)
            .cloned()
            .ok_or(StoreError::NotFound(*ticket))
    }

    fn delete(&self, ticket: &Ticket) -> StoreResult<bool> {
        Ok(self.write_map()?.remove(ticket).is_some())
    }

    fn contains(&self, ticket: &Ticket) -> StoreResult<bool> {
        Ok(self.read_map()?.contains_key(ticket))
    }

    fn tickets(&self) -> StoreResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self.read_map()?.keys().copied().collect();
        tickets.sort();
        Ok(tickets)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("InMemoryObjectStore")
            .field("table_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Payload;
    use cabinet_types::Scalar;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn payload(values: &[i64]) -> Payload {
        Payload::Array {
            name: None,
            values: values.iter().map(|v| json!(v)).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get() {
        let store = InMemoryObjectStore::new();
        let issuer = TicketIssuer::new();
        let ticket = store.put_payload(&issuer, &payload(&[1, 2])).unwrap();
        let table = store.get(&ticket).unwrap();
        assert_eq!(
            table.column("values").unwrap().values(),
            &[Scalar::Int(1), Scalar::Int(2)]
        );
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = InMemoryObjectStore::new();
        let ticket = Ticket::new();
        assert!(matches!(store.get(&ticket), Err(StoreError::NotFound(t)) if t == ticket));
    }

    #[test]
    fn put_unsupported_payload_stores_nothing() {
        let store = InMemoryObjectStore::new();
        let bad = Payload::Matrix { rows: vec![vec![json!(1)], vec![]] };
        assert!(store.put_payload(&TicketIssuer::new(), &bad).is_err());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn identical_payloads_get_distinct_tickets() {
        let store = InMemoryObjectStore::new();
        let issuer = TicketIssuer::new();
        let a = store.put_payload(&issuer, &payload(&[7])).unwrap();
        let b = store.put_payload(&issuer, &payload(&[7])).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len().unwrap(), 2);
    }

    // -----------------------------------------------------------------------
    // Insert / Delete
    // -----------------------------------------------------------------------

    #[test]
    fn insert_rejects_live_ticket() {
        let store = InMemoryObjectStore::new();
        let ticket = Ticket::new();
        store.insert(ticket, Arc::new(Table::empty())).unwrap();
        assert!(matches!(
            store.insert(ticket, Arc::new(Table::empty())),
            Err(StoreError::DuplicateTicket(_))
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let ticket = store.put_payload(&TicketIssuer::new(), &payload(&[1])).unwrap();
        assert!(store.delete(&ticket).unwrap());
        assert!(!store.delete(&ticket).unwrap());
        assert!(!store.contains(&ticket).unwrap());
    }

    #[test]
    fn retain_reports_removed_count() {
        let store = InMemoryObjectStore::new();
        let issuer = TicketIssuer::new();
        let keep = store.put_payload(&issuer, &payload(&[1])).unwrap();
        store.put_payload(&issuer, &payload(&[2])).unwrap();
        assert_eq!(store.retain(|t| *t == keep).unwrap(), 1);
        assert_eq!(store.tickets().unwrap(), vec![keep]);
    }

    #[test]
    fn total_rows_and_clear() {
        let store = InMemoryObjectStore::new();
        let issuer = TicketIssuer::new();
        store.put_payload(&issuer, &payload(&[1, 2, 3])).unwrap();
        store.put_payload(&issuer, &payload(&[4])).unwrap();
        assert_eq!(store.total_rows().unwrap(), 4);
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_puts_yield_unique_tickets() {
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let issuer = TicketIssuer::new();
                    (0..16)
                        .map(|j| store.put_payload(&issuer, &payload(&[i, j])).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for ticket in h.join().expect("thread should not panic") {
                assert!(seen.insert(ticket));
            }
        }
        assert_eq!(store.len().unwrap(), 128);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("table_count"));
    }

    proptest! {
        #[test]
        fn get_after_put_matches_normalized_input(values in proptest::collection::vec(-1000i64..1000, 0..32)) {
            let store = InMemoryObjectStore::new();
            let p = payload(&values);
            let ticket = store.put_payload(&TicketIssuer::new(), &p).unwrap();
            let got = store.get(&ticket).unwrap();
            prop_assert_eq!(got.as_ref(), &p.normalize().unwrap());
        }
    }
}
