//! # Offline Engine Facade
//!
//! The single object the application layer talks to. One engine instance is
//! constructed at process start and passed by reference to consumers: an
//! explicit instance, not a hidden singleton, so tests and multi-profile
//! hosts can run several side by side.
//!
//! ## Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OfflineEngine Wiring                             │
//! │                                                                         │
//! │  OfflineEngineBuilder                                                  │
//! │    .with_store(...)   - durable KV backend (host-provided)             │
//! │    .with_remote(...)  - backend API client (host-provided)             │
//! │    .with_probe(...)   - connectivity sampling (optional)               │
//! │    .build()                                                            │
//! │                                                                         │
//! │  engine.start()                                                        │
//! │    ├── wires NetworkMonitor's reconnect signal                         │
//! │    ├── spawns the reconnect watcher → orchestrator.drain()             │
//! │    └── spawns the probe loop (when a probe was supplied)               │
//! │                                                                         │
//! │  WRITE PATH (execute_or_enqueue)                                       │
//! │    online  ──► direct remote call under with_backoff                   │
//! │    │             │ success → Applied(server value)                     │
//! │    │             │ failure → fall through                              │
//! │    offline ──► enqueue → Queued(action), delivered by a later drain    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use darzi_core::validation::validate_draft;
use darzi_core::{
    ActionDraft, ActionKind, CacheEntry, CacheSyncStatus, ConflictResolution, OfflineAction,
    OfflineData, OfflineDataPatch, ResolutionChoice, SyncReport, SyncStatusRecord,
};
use darzi_store::{
    ActionQueue, CacheStore, DurableStore, OfflineDataStore, SyncStatusStore,
};

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::network::{
    spawn_probe_loop, ConnectivityProbe, NetworkMonitor, NetworkState, ProbeLoopHandle,
    SubscriptionId,
};
use crate::orchestrator::SyncOrchestrator;
use crate::remote::RemoteApi;
use crate::resolver::ConflictResolver;
use crate::retry::with_backoff;

// =============================================================================
// Direct Outcome
// =============================================================================

/// Result of the online-first write path.
#[derive(Debug, Clone)]
pub enum DirectOutcome {
    /// The remote call succeeded; here is the server's representation.
    Applied(Value),

    /// The mutation was queued for a later drain.
    Queued(OfflineAction),
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for creating an [`OfflineEngine`] with its host collaborators.
pub struct OfflineEngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn DurableStore>>,
    remote: Option<Arc<dyn RemoteApi>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl OfflineEngineBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: EngineConfig) -> Self {
        OfflineEngineBuilder {
            config,
            store: None,
            remote: None,
            probe: None,
        }
    }

    /// Sets the durable store backend (required).
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the remote API client (required).
    pub fn with_remote(mut self, remote: Arc<dyn RemoteApi>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the connectivity probe (optional; without it the host pushes
    /// states via [`OfflineEngine::publish_network_state`]).
    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> SyncResult<OfflineEngine> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or_else(|| SyncError::InvalidConfig("Durable store required".into()))?;
        let remote = self
            .remote
            .ok_or_else(|| SyncError::InvalidConfig("Remote API client required".into()))?;

        let queue = ActionQueue::with_max_retries(store.clone(), self.config.sync.max_retries);
        let cache = CacheStore::new(store.clone());
        let aggregate = OfflineDataStore::new(store.clone());
        let status = SyncStatusStore::new(store);
        let monitor = Arc::new(NetworkMonitor::new());

        let orchestrator = Arc::new(SyncOrchestrator::new(
            queue.clone(),
            status.clone(),
            monitor.clone(),
            remote.clone(),
        ));

        Ok(OfflineEngine {
            config: self.config,
            queue,
            cache,
            aggregate,
            status,
            monitor,
            orchestrator,
            resolver: ConflictResolver::new(),
            remote,
            probe: StdMutex::new(self.probe),
            tasks: StdMutex::new(RunningTasks::default()),
        })
    }
}

// =============================================================================
// Offline Engine
// =============================================================================

#[derive(Default)]
struct RunningTasks {
    watcher_shutdown: Option<mpsc::Sender<()>>,
    probe_loop: Option<ProbeLoopHandle>,
}

/// The offline-first engine: durable queue, cache, network awareness, and
/// drain coordination behind one API.
pub struct OfflineEngine {
    config: EngineConfig,
    queue: ActionQueue,
    cache: CacheStore,
    aggregate: OfflineDataStore,
    status: SyncStatusStore,
    monitor: Arc<NetworkMonitor>,
    orchestrator: Arc<SyncOrchestrator>,
    resolver: ConflictResolver,
    remote: Arc<dyn RemoteApi>,

    /// Probe handed over to the loop on start.
    probe: StdMutex<Option<Arc<dyn ConnectivityProbe>>>,

    /// Background task handles, populated by `start`.
    tasks: StdMutex<RunningTasks>,
}

impl OfflineEngine {
    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Starts background work: the reconnect watcher that turns an
    /// offline→online edge into a drain, and the probe loop when a probe was
    /// supplied. Calling `start` on a running engine is a no-op.
    pub async fn start(&self) -> SyncResult<()> {
        {
            let tasks = self
                .tasks
                .lock()
                .map_err(|_| SyncError::ChannelError("Task registry poisoned".into()))?;
            if tasks.watcher_shutdown.is_some() {
                debug!("Engine already started");
                return Ok(());
            }
        }

        info!(device = %self.config.device.name, "Starting offline engine");

        // Reconnect watcher: the monitor's push lands here and becomes a drain
        let (reconnect_tx, mut reconnect_rx) = mpsc::channel::<()>(4);
        self.monitor.set_reconnect_notifier(Some(reconnect_tx));

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = reconnect_rx.recv() => {
                        if received.is_none() {
                            break;
                        }
                        match orchestrator.drain().await {
                            Ok(report) => debug!(
                                synced = report.synced_actions,
                                failed = report.failed_actions.len(),
                                "Reconnect drain finished"
                            ),
                            Err(e) => error!(?e, "Reconnect drain failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            debug!("Reconnect watcher stopped");
        });

        // Probe loop (optional)
        let probe = self
            .probe
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let probe_loop = probe.map(|probe| {
            spawn_probe_loop(
                self.monitor.clone(),
                probe,
                Duration::from_secs(self.config.sync.probe_interval_secs),
                self.config.sync.probe_failure,
            )
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| SyncError::ChannelError("Task registry poisoned".into()))?;
        tasks.watcher_shutdown = Some(shutdown_tx);
        tasks.probe_loop = probe_loop;

        Ok(())
    }

    /// Stops background work gracefully.
    pub async fn shutdown(&self) {
        info!("Shutting down offline engine");
        self.monitor.set_reconnect_notifier(None);

        let (watcher, probe_loop) = match self.tasks.lock() {
            Ok(mut tasks) => (tasks.watcher_shutdown.take(), tasks.probe_loop.take()),
            Err(_) => (None, None),
        };

        if let Some(tx) = watcher {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = probe_loop {
            handle.shutdown().await;
        }
    }

    // -------------------------------------------------------------------------
    // Queue Surface
    // -------------------------------------------------------------------------

    /// Queues a mutation for delivery and refreshes the pending counter.
    pub async fn enqueue(&self, draft: ActionDraft) -> SyncResult<OfflineAction> {
        let action = self.queue.enqueue(draft).await?;
        let pending = self.queue.size().await as u32;
        self.status.record_pending(pending).await?;
        Ok(action)
    }

    /// All queued actions in delivery order.
    pub async fn list_pending(&self) -> Vec<OfflineAction> {
        self.queue.list().await
    }

    /// Queue depth.
    pub async fn pending_count(&self) -> usize {
        self.queue.size().await
    }

    // -------------------------------------------------------------------------
    // Network Surface
    // -------------------------------------------------------------------------

    /// True iff connected and internet-reachable.
    pub async fn is_online(&self) -> bool {
        self.monitor.is_online().await
    }

    /// Current connectivity snapshot.
    pub async fn network_state(&self) -> NetworkState {
        self.monitor.current_state().await
    }

    /// Pushes a platform connectivity notification into the monitor
    /// (hosts without a probe call this from their platform hook).
    pub async fn publish_network_state(&self, state: NetworkState) {
        self.monitor.publish(state).await;
    }

    /// Registers a network listener; invoked on every published state.
    pub fn subscribe_network<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&NetworkState) + Send + Sync + 'static,
    {
        self.monitor.subscribe(listener)
    }

    /// Removes a network listener.
    pub fn unsubscribe_network(&self, id: SubscriptionId) {
        self.monitor.unsubscribe(id);
    }

    // -------------------------------------------------------------------------
    // Sync Surface
    // -------------------------------------------------------------------------

    /// Runs a drain now (manual "sync now" button, periodic timers).
    pub async fn drain_now(&self) -> SyncResult<SyncReport> {
        self.orchestrator.drain().await
    }

    /// Registers a sync listener; invoked with every completed drain report.
    pub fn subscribe_sync<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SyncReport) + Send + Sync + 'static,
    {
        self.orchestrator.subscribe(listener)
    }

    /// Removes a sync listener.
    pub fn unsubscribe_sync(&self, id: SubscriptionId) {
        self.orchestrator.unsubscribe(id);
    }

    /// The persisted sync status record (pending badge, last sync times).
    pub async fn sync_status(&self) -> SyncStatusRecord {
        self.status.load().await
    }

    /// Settles a conflict and returns the payload for the caller to persist.
    ///
    /// For Local/Server/Merge the settled action is removed from the queue;
    /// `Manual` records nothing and keeps the action queued for a later
    /// decision.
    pub async fn resolve_conflict(
        &self,
        conflict: &mut ConflictResolution,
        choice: ResolutionChoice,
        merged: Option<Value>,
    ) -> SyncResult<Value> {
        let resolved = self.resolver.resolve(conflict, choice, merged);

        if choice != ResolutionChoice::Manual {
            self.queue.remove(&conflict.action_id).await?;
            let pending = self.queue.size().await as u32;
            self.status.record_pending(pending).await?;
        }
        Ok(resolved)
    }

    // -------------------------------------------------------------------------
    // Online-First Write Path
    // -------------------------------------------------------------------------

    /// Tries the remote directly when online (with caller-level backoff);
    /// falls back to the queue on any failure or when offline.
    ///
    /// A version conflict on the direct call also falls back to the queue:
    /// the queued action will surface the conflict through the next drain's
    /// report, where the normal resolution flow picks it up.
    pub async fn execute_or_enqueue(&self, draft: ActionDraft) -> SyncResult<DirectOutcome> {
        validate_draft(&draft)?;

        if self.is_online().await {
            let draft_ref = &draft;
            let remote_ref = &self.remote;
            let result = with_backoff(&self.config.remote, move || {
                let remote = Arc::clone(remote_ref);
                async move {
                    match draft_ref.kind {
                        ActionKind::Create => {
                            remote.create(draft_ref.entity, &draft_ref.payload).await
                        }
                        ActionKind::Update => {
                            let id = draft_ref.original_id.as_deref().unwrap_or_default();
                            remote.update(draft_ref.entity, id, &draft_ref.payload).await
                        }
                        ActionKind::Delete => {
                            let id = draft_ref.original_id.as_deref().unwrap_or_default();
                            remote.delete(draft_ref.entity, id).await.map(|_| Value::Null)
                        }
                    }
                }
            })
            .await;

            match result {
                Ok(value) => return Ok(DirectOutcome::Applied(value)),
                Err(e) => {
                    warn!(error = %e, entity = %draft.entity, "Direct call failed, queueing");
                }
            }
        }

        let action = self.enqueue(draft).await?;
        Ok(DirectOutcome::Queued(action))
    }

    // -------------------------------------------------------------------------
    // Cache Surface
    // -------------------------------------------------------------------------

    /// Reads a cache entry (absent once expired).
    pub async fn get_cached<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> SyncResult<Option<CacheEntry<T>>> {
        Ok(self.cache.get(key).await?)
    }

    /// Writes a cache entry, stamping `Synced` when online and `Pending`
    /// when offline.
    pub async fn set_cached<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl: Option<Duration>,
    ) -> SyncResult<()> {
        let status = if self.is_online().await {
            CacheSyncStatus::Synced
        } else {
            CacheSyncStatus::Pending
        };
        Ok(self.cache.set(key, data, ttl, status).await?)
    }

    /// Clears the cache namespace (queue and aggregate snapshot untouched).
    pub async fn clear_cache(&self) -> SyncResult<()> {
        Ok(self.cache.clear_all().await?)
    }

    /// Typed per-entity cache wrappers.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    // -------------------------------------------------------------------------
    // Aggregate Snapshot Surface
    // -------------------------------------------------------------------------

    /// Merges a partial update into the aggregate snapshot.
    pub async fn save_offline_data(&self, patch: OfflineDataPatch) -> SyncResult<OfflineData> {
        Ok(self.aggregate.save(patch).await?)
    }

    /// The aggregate snapshot (empty when never written).
    pub async fn load_offline_data(&self) -> OfflineData {
        self.aggregate.load_or_default().await
    }
}

// =============================================================================
// Tests
// =============================================================================
