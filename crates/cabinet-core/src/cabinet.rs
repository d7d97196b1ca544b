use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use cabinet_catalog::{Catalog, DatasetRecord};
use cabinet_loader::{LoaderRegistry, NamedDatasetDefinition};
use cabinet_store::{InMemoryObjectStore, ObjectStore, Payload, StoreError, Table, TicketIssuer};
use cabinet_types::{
    CabinetId, Metadata, Persistence, Predicate, StatusChange, Ticket,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::config::CabinetConfig;
use crate::error::{CabinetError, CabinetResult};
use crate::layout::{Layout, LoadedRecords};

/// Metadata key naming the dataset a loaded record came from.
pub const DATASET_KEY: &str = "dataset";
/// Metadata key naming the loader that produced a loaded record.
pub const LOADER_KEY: &str = "loader";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Closed,
    Open,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReport {
    /// Records rehydrated from the backing location.
    pub restored: usize,
    /// Records skipped because they failed validation.
    pub skipped: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReport {
    /// Persistent records written to the backing location.
    pub written: usize,
    /// Stale on-disk records removed.
    pub removed: usize,
    /// Ephemeral records evicted from memory.
    pub evicted: usize,
}

/// Named dataset definitions plus registered tickets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub datasets: Vec<NamedDatasetDefinition>,
    pub tickets: Vec<Ticket>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub ticket: Ticket,
    /// `true` if an existing registered record was returned instead of
    /// loading again.
    pub reused: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinetStatus {
    pub id: CabinetId,
    pub name: Option<String>,
    pub location: PathBuf,
    pub open: bool,
    pub records: usize,
    pub registered: usize,
    pub persistent: usize,
    pub definitions: usize,
}

// ---------------------------------------------------------------------------
// Cabinet
// ---------------------------------------------------------------------------

/// A filing cabinet: catalog, object store and loader registry bound to one
/// backing location.
///
/// The lifecycle lock is a `tokio::sync::RwLock`. Data-plane operations hold
/// it shared; `open`, `close` and `destroy` hold it exclusively, so a close
/// waits for in-flight readers and blocks new operations until it is done.
pub struct Cabinet {
    id: CabinetId,
    config: CabinetConfig,
    layout: Layout,
    state: Arc<RwLock<Lifecycle>>,
    catalog: Arc<Catalog>,
    store: Arc<InMemoryObjectStore>,
    loaders: LoaderRegistry,
    issuer: TicketIssuer,
    load_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for Cabinet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cabinet")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("location", &self.config.location)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl Cabinet {
    /// Build a closed cabinet.
    ///
    /// A named cabinet derives its id from the name. An anonymous cabinet
    /// adopts the id recorded at its location, or a random one if the
    /// location is unclaimed.
    pub fn new(config: CabinetConfig) -> CabinetResult<Self> {
        let layout = Layout::new(&config.location);
        let id = match &config.name {
            Some(name) => CabinetId::derive(name),
            None => layout
                .read_manifest()?
                .map(|m| m.id)
                .unwrap_or_else(CabinetId::random),
        };
        let loaders = LoaderRegistry::with_builtins(config.loader_timeout());
        debug!(%id, location = %config.location.display(), "cabinet constructed");
        Ok(Self {
            id,
            config,
            layout,
            state: Arc::new(RwLock::new(Lifecycle::Closed)),
            catalog: Arc::new(Catalog::new()),
            store: Arc::new(InMemoryObjectStore::new()),
            loaders,
            issuer: TicketIssuer::new(),
            load_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> CabinetId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    pub fn location(&self) -> &Path {
        self.layout.root()
    }

    pub fn config(&self) -> &CabinetConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &InMemoryObjectStore {
        &self.store
    }

    /// The loader registry. Extension loaders are added here.
    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    pub async fn is_open(&self) -> bool {
        *self.state.read().await == Lifecycle::Open
    }

    // ---- Lifecycle ----

    /// Open the cabinet, rehydrating every persistent record found at the
    /// backing location.
    pub async fn open(&self) -> CabinetResult<OpenReport> {
        let mut state = Arc::clone(&self.state).write_owned().await;
        if *state == Lifecycle::Open {
            return Err(CabinetError::AlreadyOpen);
        }
        let transition = self.transition();
        blocking(move || {
            let report = transition.open()?;
            *state = Lifecycle::Open;
            Ok(report)
        })
        .await
    }

    /// Close the cabinet.
    ///
    /// Persistent records are written first; ephemeral records are evicted
    /// only once every write has succeeded. On failure the cabinet stays
    /// open with memory untouched. Once started, a close runs to completion
    /// and keeps the lifecycle lock even if the caller stops waiting.
    pub async fn close(&self) -> CabinetResult<CloseReport> {
        let mut state = Arc::clone(&self.state).write_owned().await;
        if *state != Lifecycle::Open {
            return Err(CabinetError::NotOpen);
        }
        let transition = self.transition();
        blocking(move || {
            let report = transition.close()?;
            *state = Lifecycle::Closed;
            Ok(report)
        })
        .await
    }

    /// Irreversibly remove the backing location and everything in memory.
    pub async fn destroy(&self, confirm: bool) -> CabinetResult<()> {
        if !confirm {
            return Err(CabinetError::DestroyNotConfirmed(self.config.location.clone()));
        }
        let mut state = Arc::clone(&self.state).write_owned().await;
        let transition = self.transition();
        blocking(move || {
            transition.destroy()?;
            *state = Lifecycle::Closed;
            Ok(())
        })
        .await
    }

    // ---- Data plane ----

    /// Normalize and store a payload under a new ticket, staging an
    /// unregistered record for it.
    pub async fn put(&self, payload: &Payload, persistence: Option<Persistence>) -> CabinetResult<Ticket> {
        let _open = self.read_open().await?;
        let table = payload.normalize()?;
        self.put_table(table, persistence)
    }

    /// Publish a stored ticket with its metadata.
    pub async fn register(&self, ticket: Ticket, metadata: Metadata) -> CabinetResult<DatasetRecord> {
        let _open = self.read_open().await?;
        if !self.store.contains(&ticket)? {
            return Err(StoreError::NotFound(ticket).into());
        }
        Ok(self.catalog.register(ticket, metadata)?)
    }

    pub async fn get(&self, ticket: &Ticket) -> CabinetResult<Arc<Table>> {
        let _open = self.read_open().await?;
        Ok(self.store.get(ticket)?)
    }

    pub async fn record(&self, ticket: &Ticket) -> CabinetResult<DatasetRecord> {
        let _open = self.read_open().await?;
        Ok(self.catalog.get(ticket)?)
    }

    /// Registered tickets matching `predicate`, in registration order.
    pub async fn query(&self, predicate: &Predicate, require_match: bool) -> CabinetResult<Vec<Ticket>> {
        let _open = self.read_open().await?;
        let tickets = if require_match {
            self.catalog.query_required(predicate)?
        } else {
            self.catalog.query(predicate)?
        };
        Ok(tickets)
    }

    /// Registered records matching `predicate`, in registration order.
    pub async fn records(&self, predicate: &Predicate) -> CabinetResult<Vec<DatasetRecord>> {
        let _open = self.read_open().await?;
        Ok(self.catalog.records(predicate)?)
    }

    /// Installed definitions and registered tickets. Never invokes a loader.
    pub async fn list(&self) -> CabinetResult<Listing> {
        let _open = self.read_open().await?;
        Ok(Listing {
            datasets: self.loaders.definitions()?,
            tickets: self.catalog.query(&Predicate::all())?,
        })
    }

    pub async fn set_status(&self, ticket: &Ticket, change: StatusChange) -> CabinetResult<()> {
        let _open = self.read_open().await?;
        Ok(self.catalog.set_status(ticket, change)?)
    }

    /// Apply a status change to every registered record matching a
    /// non-empty predicate.
    pub async fn set_status_where(
        &self,
        predicate: &Predicate,
        change: StatusChange,
    ) -> CabinetResult<Vec<Ticket>> {
        if predicate.is_empty() {
            return Err(CabinetError::InvalidRequest(
                "set_status_where requires a non-empty predicate".into(),
            ));
        }
        let _open = self.read_open().await?;
        Ok(self.catalog.set_where(predicate, change)?)
    }

    // ---- Named datasets ----

    /// Install or replace a named dataset definition. Allowed while closed.
    pub fn install(&self, definition: NamedDatasetDefinition) -> CabinetResult<()> {
        Ok(self.loaders.install(definition)?)
    }

    /// Invoke a named dataset's loader without storing the result.
    pub async fn materialize(&self, name: &str) -> CabinetResult<Arc<Table>> {
        Ok(self.loaders.materialize(name).await?)
    }

    /// Materialize a named dataset and register it.
    ///
    /// If a registered record already carries `dataset = name`, its ticket is
    /// returned instead. Loads of one name are serialized, so concurrent
    /// callers never register the same dataset twice. The lifecycle lock is
    /// not held while the loader runs.
    pub async fn load(&self, name: &str, persistence: Option<Persistence>) -> CabinetResult<LoadOutcome> {
        let definition = self.loaders.definition(name)?;
        let lock = self.load_lock(name)?;
        let _serial = lock.lock().await;

        let marker = Predicate::all().with(DATASET_KEY, name);
        {
            let _open = self.read_open().await?;
            if let Some(ticket) = self.catalog.query(&marker)?.into_iter().next() {
                debug!(name, %ticket, "dataset already registered");
                return Ok(LoadOutcome {
                    ticket,
                    reused: true,
                });
            }
        }

        let table = self.loaders.materialize(name).await?;

        let _open = self.read_open().await?;
        let ticket = self.put_table(Arc::unwrap_or_clone(table), persistence)?;
        let metadata = Metadata::new()
            .with(DATASET_KEY, name)
            .with(LOADER_KEY, definition.loader.as_str());
        if let Err(e) = self.catalog.register(ticket, metadata) {
            self.discard(&ticket);
            return Err(e.into());
        }
        info!(name, %ticket, "loaded dataset");
        Ok(LoadOutcome {
            ticket,
            reused: false,
        })
    }

    // ---- Introspection ----

    pub async fn status(&self) -> CabinetResult<CabinetStatus> {
        let open = self.is_open().await;
        let snapshot = self.catalog.snapshot()?;
        Ok(CabinetStatus {
            id: self.id,
            name: self.config.name.clone(),
            location: self.config.location.clone(),
            open,
            records: snapshot.len(),
            registered: snapshot.iter().filter(|r| r.is_registered()).count(),
            persistent: snapshot.iter().filter(|r| r.is_persistent()).count(),
            definitions: self.loaders.definitions()?.len(),
        })
    }

    // ---- Internals ----

    fn transition(&self) -> Transition {
        Transition {
            id: self.id,
            name: self.config.name.clone(),
            location: self.config.location.clone(),
            layout: self.layout.clone(),
            catalog: Arc::clone(&self.catalog),
            store: Arc::clone(&self.store),
            compression_level: self.config.compression_level,
        }
    }

    async fn read_open(&self) -> CabinetResult<RwLockReadGuard<'_, Lifecycle>> {
        let state = self.state.read().await;
        if *state != Lifecycle::Open {
            return Err(CabinetError::NotOpen);
        }
        Ok(state)
    }

    /// Store a table and stage its record. The caller holds the lifecycle
    /// read lock.
    fn put_table(&self, table: Table, persistence: Option<Persistence>) -> CabinetResult<Ticket> {
        let persistence = persistence.unwrap_or(self.config.default_persistence);
        let ticket = self.store.put(&self.issuer, table)?;
        if let Err(e) = self.catalog.stage(ticket, persistence) {
            self.discard(&ticket);
            return Err(e.into());
        }
        Ok(ticket)
    }

    /// Best-effort rollback of a half-finished put.
    fn discard(&self, ticket: &Ticket) {
        if let Err(e) = self.catalog.remove(ticket) {
            warn!(%ticket, error = %e, "rollback: catalog remove failed");
        }
        if let Err(e) = self.store.delete(ticket) {
            warn!(%ticket, error = %e, "rollback: store delete failed");
        }
    }

    fn load_lock(&self, name: &str) -> CabinetResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .load_locks
            .lock()
            .map_err(|e| CabinetError::Internal(format!("load lock poisoned: {e}")))?;
        Ok(Arc::clone(locks.entry(name.to_string()).or_default()))
    }
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------

/// What a lifecycle transition touches, detached from the cabinet so the
/// transition runs on a blocking thread together with the owned write guard.
struct Transition {
    id: CabinetId,
    name: Option<String>,
    location: PathBuf,
    layout: Layout,
    catalog: Arc<Catalog>,
    store: Arc<InMemoryObjectStore>,
    compression_level: i32,
}

impl Transition {
    fn open(&self) -> CabinetResult<OpenReport> {
        self.layout.prepare(self.id, self.name.as_deref())?;
        self.layout.clean_temp()?;
        let loaded: LoadedRecords = self.layout.load_records()?;

        self.catalog.clear()?;
        self.store.clear()?;
        let skipped = loaded.skipped;
        let mut restored = 0;
        for (record, table) in loaded.records {
            self.store.insert(record.ticket, Arc::new(table))?;
            self.catalog.restore(record)?;
            restored += 1;
        }
        info!(id = %self.id, restored, skipped, "cabinet opened");
        Ok(OpenReport { restored, skipped })
    }

    fn close(&self) -> CabinetResult<CloseReport> {
        let mut keep: Vec<(DatasetRecord, Arc<Table>)> = Vec::new();
        for record in self.catalog.snapshot()? {
            if record.is_persistent() {
                let table = self.store.get(&record.ticket)?;
                keep.push((record, table));
            }
        }

        let live: BTreeSet<Ticket> = keep.iter().map(|(r, _)| r.ticket).collect();
        for (record, table) in &keep {
            self.layout.write_record(record, table, self.compression_level)?;
        }
        let mut removed = 0;
        for ticket in self.layout.stored_tickets()? {
            if !live.contains(&ticket) && self.layout.remove_record(&ticket)? {
                removed += 1;
            }
        }

        let evicted = self.catalog.evict(|r| !r.is_persistent())?;
        for record in &evicted {
            self.store.delete(&record.ticket)?;
        }

        let report = CloseReport {
            written: keep.len(),
            removed,
            evicted: evicted.len(),
        };
        info!(
            id = %self.id,
            written = report.written,
            removed,
            evicted = report.evicted,
            "cabinet closed"
        );
        Ok(report)
    }

    fn destroy(&self) -> CabinetResult<()> {
        self.layout.destroy()?;
        self.catalog.clear()?;
        self.store.clear()?;
        warn!(id = %self.id, location = %self.location.display(), "cabinet destroyed");
        Ok(())
    }
}

/// Run `f` on the blocking pool. A started task is never cancelled: if the
/// caller is dropped the task still runs to completion.
async fn blocking<T, F>(f: F) -> CabinetResult<T>
where
    F: FnOnce() -> CabinetResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CabinetError::Internal(format!("blocking task failed: {e}")))?
}
