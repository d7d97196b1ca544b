//! The catalog itself: record storage plus the exact-match query engine.
//!
//! Records live in a `HashMap` keyed by ticket behind a `std::sync::RwLock`.
//! The lock is held only for the map operation; nothing here performs I/O.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cabinet_types::{Metadata, Persistence, Predicate, StatusChange, Ticket};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::record::DatasetRecord;

#[derive(Default)]
struct CatalogState {
    records: HashMap<Ticket, DatasetRecord>,
    next_seq: u64,
}

impl CatalogState {
    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn ordered(&self, keep: impl Fn(&DatasetRecord) -> bool) -> Vec<&DatasetRecord> {
        let mut records: Vec<&DatasetRecord> =
            self.records.values().filter(|r| keep(r)).collect();
        records.sort_by_key(|r| r.seq);
        records
    }
}

/// Ticket to record map with registration-ordered queries.
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.len().unwrap_or_default();
        f.debug_struct("Catalog").field("records", &len).finish()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
        }
    }

    /// Total records, registered or not.
    pub fn len(&self) -> CatalogResult<usize> {
        Ok(self.read()?.records.len())
    }

    pub fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.read()?.records.is_empty())
    }

    pub fn registered_count(&self) -> CatalogResult<usize> {
        Ok(self.read()?.records.values().filter(|r| r.is_registered()).count())
    }

    pub fn contains(&self, ticket: &Ticket) -> CatalogResult<bool> {
        Ok(self.read()?.records.contains_key(ticket))
    }

    pub fn get(&self, ticket: &Ticket) -> CatalogResult<DatasetRecord> {
        self.read()?
            .records
            .get(ticket)
            .cloned()
            .ok_or(CatalogError::NotFound(*ticket))
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Add an unregistered record for a ticket whose payload was just stored.
    pub fn stage(&self, ticket: Ticket, persistence: Persistence) -> CatalogResult<()> {
        let mut state = self.write()?;
        if state.records.contains_key(&ticket) {
            return Err(CatalogError::DuplicateTicket(ticket));
        }
        let seq = state.bump_seq();
        state
            .records
            .insert(ticket, DatasetRecord::staged(ticket, persistence, seq));
        debug!(%ticket, %persistence, "staged record");
        Ok(())
    }

    /// Publish a record with its metadata.
    ///
    /// A staged record is upgraded in place; an unseen ticket gets a new
    /// record with default persistence. A ticket that is already registered
    /// fails with `DuplicateTicket` and its record is left as it was.
    pub fn register(&self, ticket: Ticket, metadata: Metadata) -> CatalogResult<DatasetRecord> {
        let mut state = self.write()?;
        if state.records.get(&ticket).is_some_and(|r| r.is_registered()) {
            return Err(CatalogError::DuplicateTicket(ticket));
        }
        let seq = state.bump_seq();
        let record = state
            .records
            .entry(ticket)
            .or_insert_with(|| DatasetRecord::staged(ticket, Persistence::default(), seq));
        record.publish(metadata, seq);
        debug!(%ticket, seq, "registered record");
        Ok(record.clone())
    }

    /// Insert a record exactly as given, keeping its `seq`. Used when
    /// rehydrating from the backing location.
    pub fn restore(&self, record: DatasetRecord) -> CatalogResult<()> {
        let mut state = self.write()?;
        if state.records.contains_key(&record.ticket) {
            return Err(CatalogError::DuplicateTicket(record.ticket));
        }
        state.next_seq = state.next_seq.max(record.seq + 1);
        state.records.insert(record.ticket, record);
        Ok(())
    }

    /// Apply a status change to one record.
    pub fn set_status(&self, ticket: &Ticket, change: StatusChange) -> CatalogResult<()> {
        let mut state = self.write()?;
        let record = state
            .records
            .get_mut(ticket)
            .ok_or(CatalogError::NotFound(*ticket))?;
        apply(record, change);
        debug!(%ticket, %change, "status changed");
        Ok(())
    }

    /// Apply a status change to every registered record matching
    /// `predicate`. Fails with `QueryTooNarrow` if none match.
    pub fn set_where(
        &self,
        predicate: &Predicate,
        change: StatusChange,
    ) -> CatalogResult<Vec<Ticket>> {
        let mut state = self.write()?;
        let tickets: Vec<Ticket> = state
            .ordered(|r| r.is_registered() && predicate.matches(&r.metadata))
            .into_iter()
            .map(|r| r.ticket)
            .collect();
        if tickets.is_empty() {
            return Err(CatalogError::too_narrow(predicate));
        }
        for ticket in &tickets {
            if let Some(record) = state.records.get_mut(ticket) {
                apply(record, change);
            }
        }
        debug!(%predicate, %change, count = tickets.len(), "status changed by predicate");
        Ok(tickets)
    }

    pub fn remove(&self, ticket: &Ticket) -> CatalogResult<Option<DatasetRecord>> {
        Ok(self.write()?.records.remove(ticket))
    }

    /// Remove every record for which `evict` holds, returning them in
    /// registration order.
    pub fn evict(&self, evict: impl Fn(&DatasetRecord) -> bool) -> CatalogResult<Vec<DatasetRecord>> {
        let mut state = self.write()?;
        let tickets: Vec<Ticket> = state.ordered(&evict).into_iter().map(|r| r.ticket).collect();
        Ok(tickets
            .iter()
            .filter_map(|t| state.records.remove(t))
            .collect())
    }

    pub fn clear(&self) -> CatalogResult<()> {
        let mut state = self.write()?;
        state.records.clear();
        state.next_seq = 0;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Tickets of registered records matching `predicate`, in registration
    /// order. The empty predicate returns every registered record.
    pub fn query(&self, predicate: &Predicate) -> CatalogResult<Vec<Ticket>> {
        let state = self.read()?;
        Ok(state
            .ordered(|r| r.is_registered() && predicate.matches(&r.metadata))
            .into_iter()
            .map(|r| r.ticket)
            .collect())
    }

    /// Like [`Catalog::query`], but an empty result is `QueryTooNarrow`.
    pub fn query_required(&self, predicate: &Predicate) -> CatalogResult<Vec<Ticket>> {
        let tickets = self.query(predicate)?;
        if tickets.is_empty() {
            return Err(CatalogError::too_narrow(predicate));
        }
        Ok(tickets)
    }

    /// Full registered records matching `predicate`, in registration order.
    pub fn records(&self, predicate: &Predicate) -> CatalogResult<Vec<DatasetRecord>> {
        let state = self.read()?;
        Ok(state
            .ordered(|r| r.is_registered() && predicate.matches(&r.metadata))
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every record, registered or not, in sequence order.
    pub fn snapshot(&self) -> CatalogResult<Vec<DatasetRecord>> {
        let state = self.read()?;
        Ok(state.ordered(|_| true).into_iter().cloned().collect())
    }

    fn read(&self) -> CatalogResult<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|e| CatalogError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> CatalogResult<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|e| CatalogError::LockPoisoned(e.to_string()))
    }
}

fn apply(record: &mut DatasetRecord, change: StatusChange) {
    match change {
        StatusChange::Status(status) => record.status = status,
        StatusChange::Persistence(persistence) => record.persistence = persistence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabinet_types::RecordStatus;
    use std::sync::Arc;

    fn meta(pairs: &[(&str, i64)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), (*v).into()))
            .collect()
    }

    fn pred(pairs: &[(&str, i64)]) -> Predicate {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), (*v).into()))
            .collect()
    }

    fn registered(catalog: &Catalog, pairs: &[(&str, i64)]) -> Ticket {
        let t = Ticket::new();
        catalog.register(t, meta(pairs)).unwrap();
        t
    }

    // ---------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------

    #[test]
    fn register_unseen_ticket_inserts_registered_record() {
        let catalog = Catalog::new();
        let t = registered(&catalog, &[("a", 1)]);
        let r = catalog.get(&t).unwrap();
        assert_eq!(r.status, RecordStatus::Registered);
        assert_eq!(r.persistence, Persistence::Persistent);
    }

    #[test]
    fn duplicate_registration_keeps_first_metadata() {
        let catalog = Catalog::new();
        let t = registered(&catalog, &[("a", 1)]);
        let err = catalog.register(t, meta(&[("a", 2)])).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateTicket(x) if x == t));
        assert_eq!(catalog.get(&t).unwrap().metadata, meta(&[("a", 1)]));
    }

    #[test]
    fn staged_record_is_hidden_until_registered() {
        let catalog = Catalog::new();
        let t = Ticket::new();
        catalog.stage(t, Persistence::Ephemeral).unwrap();
        assert!(catalog.query(&Predicate::all()).unwrap().is_empty());

        catalog.register(t, meta(&[("a", 1)])).unwrap();
        assert_eq!(catalog.query(&Predicate::all()).unwrap(), vec![t]);
        assert_eq!(catalog.get(&t).unwrap().persistence, Persistence::Ephemeral);
    }

    #[test]
    fn stage_rejects_known_ticket() {
        let catalog = Catalog::new();
        let t = Ticket::new();
        catalog.stage(t, Persistence::Persistent).unwrap();
        assert!(matches!(
            catalog.stage(t, Persistence::Persistent),
            Err(CatalogError::DuplicateTicket(_))
        ));
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    #[test]
    fn query_exactness() {
        let catalog = Catalog::new();
        let t1 = registered(&catalog, &[("a", 1), ("b", 2)]);
        let t2 = registered(&catalog, &[("a", 1), ("b", 3)]);

        assert_eq!(catalog.query(&pred(&[("a", 1)])).unwrap(), vec![t1, t2]);
        assert_eq!(catalog.query(&pred(&[("a", 1), ("b", 3)])).unwrap(), vec![t2]);
        assert!(catalog.query(&pred(&[("c", 5)])).unwrap().is_empty());
    }

    #[test]
    fn identical_metadata_returns_all_tickets() {
        let catalog = Catalog::new();
        let t1 = registered(&catalog, &[("a", 1)]);
        let t2 = registered(&catalog, &[("a", 1)]);
        assert_eq!(catalog.query(&pred(&[("a", 1)])).unwrap(), vec![t1, t2]);
    }

    #[test]
    fn order_follows_registration_not_staging() {
        let catalog = Catalog::new();
        let first_put = Ticket::new();
        let second_put = Ticket::new();
        catalog.stage(first_put, Persistence::Persistent).unwrap();
        catalog.stage(second_put, Persistence::Persistent).unwrap();
        catalog.register(second_put, Metadata::new()).unwrap();
        catalog.register(first_put, Metadata::new()).unwrap();
        assert_eq!(
            catalog.query(&Predicate::all()).unwrap(),
            vec![second_put, first_put]
        );
    }

    #[test]
    fn query_required_reports_too_narrow() {
        let catalog = Catalog::new();
        registered(&catalog, &[("a", 1)]);
        let err = catalog.query_required(&pred(&[("a", 2)])).unwrap_err();
        assert!(matches!(err, CatalogError::QueryTooNarrow { .. }));
        assert_eq!(catalog.query_required(&pred(&[("a", 1)])).unwrap().len(), 1);
    }

    #[test]
    fn records_returns_full_entries() {
        let catalog = Catalog::new();
        registered(&catalog, &[("a", 1)]);
        registered(&catalog, &[("a", 2)]);
        let records = catalog.records(&pred(&[("a", 2)])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata, meta(&[("a", 2)]));
    }

    // ---------------------------------------------------------------
    // Status changes
    // ---------------------------------------------------------------

    #[test]
    fn set_status_unknown_ticket_is_not_found() {
        let catalog = Catalog::new();
        let err = catalog
            .set_status(&Ticket::new(), StatusChange::Status(RecordStatus::Registered))
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn axes_change_independently() {
        let catalog = Catalog::new();
        let t = registered(&catalog, &[("a", 1)]);
        catalog
            .set_status(&t, StatusChange::Persistence(Persistence::Ephemeral))
            .unwrap();
        let r = catalog.get(&t).unwrap();
        assert_eq!(r.persistence, Persistence::Ephemeral);
        assert_eq!(r.status, RecordStatus::Registered);

        catalog
            .set_status(&t, StatusChange::Status(RecordStatus::Unregistered))
            .unwrap();
        assert!(catalog.query(&Predicate::all()).unwrap().is_empty());
        assert_eq!(catalog.get(&t).unwrap().persistence, Persistence::Ephemeral);
    }

    #[test]
    fn set_where_updates_matches_only() {
        let catalog = Catalog::new();
        let t1 = registered(&catalog, &[("a", 1)]);
        let t2 = registered(&catalog, &[("a", 2)]);
        let changed = catalog
            .set_where(&pred(&[("a", 1)]), StatusChange::Persistence(Persistence::Ephemeral))
            .unwrap();
        assert_eq!(changed, vec![t1]);
        assert_eq!(catalog.get(&t2).unwrap().persistence, Persistence::Persistent);
    }

    #[test]
    fn set_where_without_match_is_too_narrow() {
        let catalog = Catalog::new();
        registered(&catalog, &[("a", 1)]);
        let err = catalog
            .set_where(&pred(&[("a", 9)]), StatusChange::Persistence(Persistence::Ephemeral))
            .unwrap_err();
        assert!(matches!(err, CatalogError::QueryTooNarrow { .. }));
    }

    // ---------------------------------------------------------------
    // Removal and restore
    // ---------------------------------------------------------------

    #[test]
    fn evict_removes_matching_records() {
        let catalog = Catalog::new();
        let keep = registered(&catalog, &[("a", 1)]);
        let gone = registered(&catalog, &[("a", 2)]);
        catalog
            .set_status(&gone, StatusChange::Persistence(Persistence::Ephemeral))
            .unwrap();

        let evicted = catalog.evict(|r| !r.is_persistent()).unwrap();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].ticket, gone);
        assert!(catalog.contains(&keep).unwrap());
        assert!(!catalog.contains(&gone).unwrap());
    }

    #[test]
    fn restore_keeps_order_and_advances_seq() {
        let source = Catalog::new();
        let t1 = registered(&source, &[("a", 1)]);
        let t2 = registered(&source, &[("a", 1)]);
        let mut records = source.snapshot().unwrap();
        records.reverse();

        let target = Catalog::new();
        for r in records {
            target.restore(r).unwrap();
        }
        let t3 = registered(&target, &[("a", 1)]);
        assert_eq!(target.query(&pred(&[("a", 1)])).unwrap(), vec![t1, t2, t3]);
    }

    #[test]
    fn restore_rejects_present_ticket() {
        let catalog = Catalog::new();
        let t = registered(&catalog, &[]);
        let record = catalog.get(&t).unwrap();
        assert!(matches!(
            catalog.restore(record),
            Err(CatalogError::DuplicateTicket(_))
        ));
    }

    #[test]
    fn remove_and_clear() {
        let catalog = Catalog::new();
        let t = registered(&catalog, &[]);
        assert!(catalog.remove(&t).unwrap().is_some());
        assert!(catalog.remove(&t).unwrap().is_none());
        registered(&catalog, &[]);
        catalog.clear().unwrap();
        assert!(catalog.is_empty().unwrap());
    }

    // ---------------------------------------------------------------
    // Concurrency
    // ---------------------------------------------------------------

    #[test]
    fn concurrent_readers_and_writers() {
        use std::thread;

        let catalog = Arc::new(Catalog::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || {
                    for _ in 0..25 {
                        catalog.register(Ticket::new(), meta(&[("w", i)])).unwrap();
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || {
                    for _ in 0..25 {
                        catalog.query(&Predicate::all()).unwrap();
                    }
                })
            })
            .collect();
        for h in writers.into_iter().chain(readers) {
            h.join().expect("thread should not panic");
        }
        assert_eq!(catalog.registered_count().unwrap(), 100);
        assert_eq!(catalog.query(&pred(&[("w", 2)])).unwrap().len(), 25);
    }
}
