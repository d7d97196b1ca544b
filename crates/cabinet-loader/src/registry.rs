use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use cabinet_store::{Payload, Table};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::builtin::builtin_loaders;
use crate::definition::{LoaderId, NamedDatasetDefinition};
use crate::error::{LoadFailure, LoaderError, LoaderResult};
use crate::loader::Loader;

/// Timeout applied to a loader invocation when none is configured.
pub const DEFAULT_LOADER_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// LoaderHook
// ---------------------------------------------------------------------------

/// A definition resolved against the allow-list, ready to invoke.
pub struct LoaderHook {
    definition: NamedDatasetDefinition,
    loader: Arc<dyn Loader>,
}

impl LoaderHook {
    pub fn definition(&self) -> &NamedDatasetDefinition {
        &self.definition
    }

    /// Run the loader with the bound arguments.
    pub async fn invoke(&self) -> Result<Payload, LoadFailure> {
        self.loader.load(&self.definition.arguments).await
    }
}

impl std::fmt::Debug for LoaderHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderHook")
            .field("name", &self.definition.name)
            .field("loader", &self.definition.loader)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LoaderRegistry
// ---------------------------------------------------------------------------

struct Installed {
    definition: NamedDatasetDefinition,
    /// Bumped on every install so in-flight loads of a replaced definition
    /// are never joined by callers of the new one.
    generation: u64,
    hook: Option<Arc<LoaderHook>>,
}

type FlightKey = (String, u64);
type Flight = Arc<OnceCell<LoaderResult<Arc<Table>>>>;

/// Allow-listed loaders, installed dataset definitions, and the machinery to
/// materialize them.
pub struct LoaderRegistry {
    loaders: RwLock<BTreeMap<LoaderId, Arc<dyn Loader>>>,
    installed: RwLock<BTreeMap<String, Installed>>,
    inflight: Mutex<HashMap<FlightKey, Flight>>,
    next_generation: Mutex<u64>,
    timeout: Duration,
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("loaders", &self.loader_ids().map(|l| l.len()).unwrap_or_default())
            .field("definitions", &self.definitions().map(|d| d.len()).unwrap_or_default())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LoaderRegistry {
    /// A registry with an empty allow-list.
    pub fn new(timeout: Duration) -> Self {
        Self {
            loaders: RwLock::new(BTreeMap::new()),
            installed: RwLock::new(BTreeMap::new()),
            inflight: Mutex::new(HashMap::new()),
            next_generation: Mutex::new(0),
            timeout,
        }
    }

    /// A registry whose allow-list holds the built-in loaders.
    pub fn with_builtins(timeout: Duration) -> Self {
        let registry = Self::new(timeout);
        if let Ok(mut loaders) = registry.loaders.write() {
            loaders.extend(builtin_loaders());
        }
        registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Add (or replace) an extension loader on the allow-list.
    pub fn register_loader(&self, id: LoaderId, loader: Arc<dyn Loader>) -> LoaderResult<()> {
        info!(loader = %id, "registered loader");
        self.write_loaders()?.insert(id, loader);
        Ok(())
    }

    /// Allow-listed loader ids with their descriptions.
    pub fn loader_ids(&self) -> LoaderResult<Vec<(LoaderId, String)>> {
        Ok(self
            .read_loaders()?
            .iter()
            .map(|(id, loader)| (id.clone(), loader.description().to_string()))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// Install or replace a named dataset definition.
    ///
    /// Replacement swaps the definition and drops its cached hook under one
    /// write lock.
    pub fn install(&self, definition: NamedDatasetDefinition) -> LoaderResult<()> {
        if !self.read_loaders()?.contains_key(&definition.loader) {
            return Err(LoaderError::UnknownLoader(definition.loader));
        }
        let generation = {
            let mut next = self
                .next_generation
                .lock()
                .map_err(|e| LoaderError::LockPoisoned(e.to_string()))?;
            *next += 1;
            *next
        };
        info!(name = %definition.name, loader = %definition.loader, "installed dataset definition");
        self.write_installed()?.insert(
            definition.name.clone(),
            Installed {
                definition,
                generation,
                hook: None,
            },
        );
        Ok(())
    }

    pub fn definition(&self, name: &str) -> LoaderResult<NamedDatasetDefinition> {
        self.read_installed()?
            .get(name)
            .map(|i| i.definition.clone())
            .ok_or_else(|| LoaderError::UnknownDataset(name.to_string()))
    }

    /// All installed definitions, sorted by name. Never triggers a load.
    pub fn definitions(&self) -> LoaderResult<Vec<NamedDatasetDefinition>> {
        Ok(self
            .read_installed()?
            .values()
            .map(|i| i.definition.clone())
            .collect())
    }

    /// Whether the hook for `name` has been resolved and cached.
    pub fn is_resolved(&self, name: &str) -> LoaderResult<bool> {
        Ok(self
            .read_installed()?
            .get(name)
            .is_some_and(|i| i.hook.is_some()))
    }

    /// Resolve the hook for `name`, caching it until the next install.
    pub fn hook(&self, name: &str) -> LoaderResult<Arc<LoaderHook>> {
        self.resolve(name).map(|(hook, _)| hook)
    }

    fn resolve(&self, name: &str) -> LoaderResult<(Arc<LoaderHook>, u64)> {
        {
            let installed = self.read_installed()?;
            let entry = installed
                .get(name)
                .ok_or_else(|| LoaderError::UnknownDataset(name.to_string()))?;
            if let Some(hook) = &entry.hook {
                return Ok((Arc::clone(hook), entry.generation));
            }
        }

        let mut installed = self.write_installed()?;
        let entry = installed
            .get_mut(name)
            .ok_or_else(|| LoaderError::UnknownDataset(name.to_string()))?;
        if let Some(hook) = &entry.hook {
            return Ok((Arc::clone(hook), entry.generation));
        }
        let loader = self
            .read_loaders()?
            .get(&entry.definition.loader)
            .cloned()
            .ok_or_else(|| LoaderError::UnknownLoader(entry.definition.loader.clone()))?;
        let hook = Arc::new(LoaderHook {
            definition: entry.definition.clone(),
            loader,
        });
        entry.hook = Some(Arc::clone(&hook));
        debug!(name, generation = entry.generation, "resolved loader hook");
        Ok((hook, entry.generation))
    }

    // -----------------------------------------------------------------------
    // Materialization
    // -----------------------------------------------------------------------

    /// Invoke the loader behind `name` and normalize its output.
    ///
    /// Concurrent callers for the same name share one invocation and all
    /// receive its result, success or failure. The shared slot is released
    /// once the invocation completes, so a later call loads afresh.
    pub async fn materialize(&self, name: &str) -> LoaderResult<Arc<Table>> {
        let (hook, generation) = self.resolve(name)?;
        let key: FlightKey = (name.to_string(), generation);

        let flight = {
            let mut inflight = self.lock_inflight()?;
            Arc::clone(inflight.entry(key.clone()).or_default())
        };
        let result = flight.get_or_init(|| self.invoke(name, &hook)).await.clone();

        {
            let mut inflight = self.lock_inflight()?;
            if inflight.get(&key).is_some_and(|f| Arc::ptr_eq(f, &flight)) {
                inflight.remove(&key);
            }
        }
        result
    }

    async fn invoke(&self, name: &str, hook: &LoaderHook) -> LoaderResult<Arc<Table>> {
        let started = Instant::now();
        debug!(name, loader = %hook.definition.loader, "invoking loader");

        let payload = match tokio::time::timeout(self.timeout, hook.invoke()).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(source)) => {
                warn!(name, error = %source, "loader failed");
                return Err(LoaderError::Invocation {
                    name: name.to_string(),
                    source,
                });
            }
            Err(_) => {
                let after_ms = saturating_millis(self.timeout);
                warn!(name, after_ms, "loader timed out");
                return Err(LoaderError::Timeout {
                    name: name.to_string(),
                    after_ms,
                });
            }
        };

        let table = payload.normalize().map_err(|e| LoaderError::Invocation {
            name: name.to_string(),
            source: LoadFailure::Data(e.to_string()),
        })?;
        info!(
            name,
            rows = table.num_rows(),
            columns = table.num_columns(),
            elapsed_ms = saturating_millis(started.elapsed()),
            "materialized dataset"
        );
        Ok(Arc::new(table))
    }

    // -----------------------------------------------------------------------
    // Lock helpers
    // -----------------------------------------------------------------------

    fn read_loaders(&self) -> LoaderResult<RwLockReadGuard<'_, BTreeMap<LoaderId, Arc<dyn Loader>>>> {
        self.loaders
            .read()
            .map_err(|e| LoaderError::LockPoisoned(e.to_string()))
    }

    fn write_loaders(
        &self,
    ) -> LoaderResult<RwLockWriteGuard<'_, BTreeMap<LoaderId, Arc<dyn Loader>>>> {
        self.loaders
            .write()
            .map_err(|e| LoaderError::LockPoisoned(e.to_string()))
    }

    fn read_installed(&self) -> LoaderResult<RwLockReadGuard<'_, BTreeMap<String, Installed>>> {
        self.installed
            .read()
            .map_err(|e| LoaderError::LockPoisoned(e.to_string()))
    }

    fn write_installed(&self) -> LoaderResult<RwLockWriteGuard<'_, BTreeMap<String, Installed>>> {
        self.installed
            .write()
            .map_err(|e| LoaderError::LockPoisoned(e.to_string()))
    }

    fn lock_inflight(&self) -> LoaderResult<MutexGuard<'_, HashMap<FlightKey, Flight>>> {
        self.inflight
            .lock()
            .map_err(|e| LoaderError::LockPoisoned(e.to_string()))
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_builtins(DEFAULT_LOADER_TIMEOUT)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::LoaderArgs;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts invocations and sleeps before answering.
    struct CountingLoader {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    impl CountingLoader {
        fn new(delay: Duration, fail: bool) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let loader = Arc::new(Self {
                calls: Arc::clone(&calls),
                delay,
                fail,
            });
            (loader, calls)
        }
    }

    #[async_trait]
    impl Loader for CountingLoader {
        fn description(&self) -> &str {
            "test loader"
        }

        async fn load(&self, _args: &LoaderArgs) -> Result<Payload, LoadFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(LoadFailure::source_error("boom"));
            }
            Ok(Payload::Array {
                name: None,
                values: vec![json!(1), json!(2)],
            })
        }
    }

    fn registry_with(loader: Arc<dyn Loader>, timeout: Duration) -> LoaderRegistry {
        let registry = LoaderRegistry::with_builtins(timeout);
        registry.register_loader(LoaderId::new("counting"), loader).unwrap();
        registry
            .install(NamedDatasetDefinition::new("x", "counting"))
            .unwrap();
        registry
    }

    // -----------------------------------------------------------------------
    // Install / resolve
    // -----------------------------------------------------------------------

    #[test]
    fn builtins_are_allow_listed() {
        let registry = LoaderRegistry::default();
        let ids: Vec<String> = registry
            .loader_ids()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        for builtin in [
            LoaderId::INLINE,
            LoaderId::SEQUENCE,
            LoaderId::CSV_FILE,
            LoaderId::JSON_ROWS_FILE,
            LoaderId::HTTP_CSV,
        ] {
            assert!(ids.iter().any(|id| id == builtin), "missing {builtin}");
        }
    }

    #[test]
    fn install_rejects_unknown_loader() {
        let registry = LoaderRegistry::default();
        let err = registry
            .install(NamedDatasetDefinition::new("x", "os.system"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::UnknownLoader(_)));
        assert!(registry.definitions().unwrap().is_empty());
    }

    #[test]
    fn reinstall_replaces_definition_and_drops_hook() {
        let registry = LoaderRegistry::default();
        registry
            .install(NamedDatasetDefinition::new("n", "sequence").with_arg("stop", 3))
            .unwrap();
        registry.hook("n").unwrap();
        assert!(registry.is_resolved("n").unwrap());

        registry
            .install(NamedDatasetDefinition::new("n", "sequence").with_arg("stop", 5))
            .unwrap();
        assert!(!registry.is_resolved("n").unwrap());
        assert_eq!(registry.definition("n").unwrap().arguments["stop"], json!(5));
        assert_eq!(registry.definitions().unwrap().len(), 1);
    }

    #[test]
    fn hook_is_cached() {
        let registry = LoaderRegistry::default();
        registry
            .install(NamedDatasetDefinition::new("n", "sequence").with_arg("stop", 3))
            .unwrap();
        let a = registry.hook("n").unwrap();
        let b = registry.hook("n").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn listing_does_not_resolve() {
        let registry = LoaderRegistry::default();
        registry
            .install(NamedDatasetDefinition::new("n", "sequence").with_arg("stop", 3))
            .unwrap();
        registry.definitions().unwrap();
        assert!(!registry.is_resolved("n").unwrap());
    }

    // -----------------------------------------------------------------------
    // Materialize
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn materialize_builtin() {
        let registry = LoaderRegistry::default();
        registry
            .install(NamedDatasetDefinition::new("n", "sequence").with_arg("stop", 3))
            .unwrap();
        let table = registry.materialize("n").await.unwrap();
        assert_eq!(table.num_rows(), 3);
    }

    #[tokio::test]
    async fn materialize_unknown_name() {
        let registry = LoaderRegistry::default();
        let err = registry.materialize("nope").await.unwrap_err();
        assert!(matches!(err, LoaderError::UnknownDataset(_)));
        assert_eq!(err.subject().as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn unnormalizable_output_is_an_invocation_error() {
        let registry = LoaderRegistry::default();
        registry
            .install(
                NamedDatasetDefinition::new("bad", "inline")
                    .with_arg("payload", json!({"kind": "matrix", "rows": [[1], [1, 2]]})),
            )
            .unwrap();
        let err = registry.materialize("bad").await.unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Invocation { source: LoadFailure::Data(_), .. }
        ));
    }

    #[tokio::test]
    async fn slow_loader_times_out() {
        let (loader, _) = CountingLoader::new(Duration::from_secs(5), false);
        let registry = registry_with(loader, Duration::from_millis(20));
        let err = registry.materialize("x").await.unwrap_err();
        assert!(matches!(err, LoaderError::Timeout { after_ms: 20, .. }));
    }

    #[test]
    fn millis_saturate_for_huge_durations() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    // -----------------------------------------------------------------------
    // Single-flight
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_materialize_invokes_once() {
        let (loader, calls) = CountingLoader::new(Duration::from_millis(100), false);
        let registry = Arc::new(registry_with(loader, DEFAULT_LOADER_TIMEOUT));

        let a = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.materialize("x").await }
        });
        let b = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.materialize("x").await }
        });
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_are_shared() {
        let (loader, calls) = CountingLoader::new(Duration::from_millis(100), true);
        let registry = Arc::new(registry_with(loader, DEFAULT_LOADER_TIMEOUT));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.materialize("x").await })
            })
            .collect();
        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(matches!(err, LoaderError::Invocation { .. }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_is_released_after_completion() {
        let (loader, calls) = CountingLoader::new(Duration::from_millis(1), false);
        let registry = registry_with(loader, DEFAULT_LOADER_TIMEOUT);
        registry.materialize("x").await.unwrap();
        registry.materialize("x").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
