use std::sync::Arc;

use cabinet_types::Ticket;

use crate::error::StoreResult;
use crate::issuer::TicketIssuer;
use crate::payload::Payload;
use crate::table::Table;

/// Ticket-keyed table storage.
///
/// All implementations must satisfy these invariants:
/// - A ticket returned by `put` was not live at any point before the call.
/// - Stored tables are immutable; `get` hands out shared references.
/// - `delete` is idempotent.
/// - Concurrent reads never block each other for longer than a map lookup.
pub trait ObjectStore: Send + Sync {
    /// Store an already-normalized table under a newly issued ticket.
    fn put(&self, issuer: &TicketIssuer, table: Table) -> StoreResult<Ticket>;

    /// Store a table under a known ticket (used when rehydrating).
    ///
    /// Fails with `DuplicateTicket` if the ticket already holds a payload.
    fn insert(&self, ticket: Ticket, table: Arc<Table>) -> StoreResult<()>;

    /// Fetch a table. Fails with `NotFound` if the ticket is unknown.
    fn get(&self, ticket: &Ticket) -> StoreResult<Arc<Table>>;

    /// Remove a table. Returns `true` if it was present.
    fn delete(&self, ticket: &Ticket) -> StoreResult<bool>;

    fn contains(&self, ticket: &Ticket) -> StoreResult<bool>;

    /// All stored tickets, sorted.
    fn tickets(&self) -> StoreResult<Vec<Ticket>>;

    /// Normalize a payload and store it.
    fn put_payload(&self, issuer: &TicketIssuer, payload: &Payload) -> StoreResult<Ticket> {
        let table = payload.normalize()?;
        self.put(issuer, table)
    }
}
