//! # Sync Orchestrator
//!
//! Drains the action queue against the remote API. Single-flight, strictly
//! FIFO, with a bounded retry ceiling per action.
//!
//! ## Drain Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Drain Cycle                                 │
//! │                                                                         │
//! │  drain()                                                               │
//! │    │  offline?            ──► SyncReport::skipped()                    │
//! │    │  already running?    ──► SyncReport::skipped()                    │
//! │    ▼                                                                    │
//! │  snapshot = queue.list()        (insertion order, never reordered)     │
//! │    │                                                                    │
//! │    ▼  for each action, dispatch Create/Update/Delete:                  │
//! │  ┌───────────────────┬──────────────────────┬────────────────────────┐ │
//! │  │ Ok                │ VersionConflict      │ Transient              │ │
//! │  │ remove(id)        │ record conflict,     │ retry_count += 1;      │ │
//! │  │ synced += 1       │ action STAYS queued  │ at ceiling: remove +   │ │
//! │  │                   │                      │ report as failed       │ │
//! │  │                   ├──────────────────────┤                        │ │
//! │  │                   │ Rejected             │                        │ │
//! │  │                   │ remove + report as   │                        │ │
//! │  │                   │ failed (no retries   │                        │ │
//! │  │                   │ consumed)            │                        │ │
//! │  └───────────────────┴──────────────────────┴────────────────────────┘ │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  record last_sync_attempt (+ last_successful_sync if synced > 0)       │
//! │  notify listeners (panics isolated per listener)                       │
//! │                                                                         │
//! │  STORAGE ERROR mid-cycle: abort with Err. Writes that already          │
//! │  committed (removed actions, bumped retries) stay committed.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why no delay between retries here?
//! Retries of one action across drains are naturally rate-limited by what
//! triggers drains: reconnect events and manual sync requests. Time-based
//! backoff belongs to the direct-call path ([`crate::retry::with_backoff`]),
//! one layer up.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tracing::{debug, error, info, warn};

use darzi_core::{ActionKind, ConflictResolution, OfflineAction, SyncReport};
use darzi_store::{ActionQueue, SyncStatusStore};

use crate::error::SyncResult;
use crate::network::{NetworkMonitor, SubscriptionId};
use crate::remote::{RemoteApi, RemoteError};

type SyncListener = Box<dyn Fn(&SyncReport) + Send + Sync>;

// =============================================================================
// Sync Orchestrator
// =============================================================================

/// Drains the durable action queue when online.
///
/// State machine: Idle → Running → Idle. Exactly one Running instance may
/// exist; a drain requested while Running returns a skipped report instead of
/// queuing a second run, so an in-flight action can never be delivered twice
/// by overlapping drains.
pub struct SyncOrchestrator {
    queue: ActionQueue,

    status: SyncStatusStore,

    monitor: Arc<NetworkMonitor>,

    remote: Arc<dyn RemoteApi>,

    /// Sync listener registry (id → callback).
    listeners: StdMutex<HashMap<u64, SyncListener>>,

    next_listener_id: AtomicU64,

    /// The single-flight flag.
    running: AtomicBool,
}

/// Resets the running flag even on early return paths.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncOrchestrator {
    pub fn new(
        queue: ActionQueue,
        status: SyncStatusStore,
        monitor: Arc<NetworkMonitor>,
        remote: Arc<dyn RemoteApi>,
    ) -> Self {
        SyncOrchestrator {
            queue,
            status,
            monitor,
            remote,
            listeners: StdMutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
            running: AtomicBool::new(false),
        }
    }

    /// Registers a listener invoked with every completed drain's report.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SyncReport) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, Box::new(listener));
        }
        SubscriptionId(id)
    }

    /// Removes a listener. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&id.0);
        }
    }

    /// Runs one drain cycle.
    ///
    /// Returns a skipped report when offline or when a drain is already in
    /// flight; returns `Err` only for storage failures, which abort the
    /// cycle. Remote failures never surface here; they are folded into the
    /// report.
    pub async fn drain(&self) -> SyncResult<SyncReport> {
        // Offline guard: zero remote calls, zero queue mutations
        if !self.monitor.is_online().await {
            debug!("Drain requested while offline, skipping");
            return Ok(SyncReport::skipped());
        }

        // Single-flight guard
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain already in flight, skipping");
            return Ok(SyncReport::skipped());
        }
        let guard = RunningGuard(&self.running);

        let outcome = self.run_cycle().await;
        drop(guard);

        let report = outcome?;
        self.notify(&report);
        Ok(report)
    }

    async fn run_cycle(&self) -> SyncResult<SyncReport> {
        let snapshot = self.queue.list().await;
        info!(pending = snapshot.len(), "Drain starting");

        let mut report = SyncReport::default();

        for action in snapshot {
            match self.dispatch(&action).await {
                Ok(()) => {
                    self.queue.remove(&action.id).await?;
                    report.synced_actions += 1;
                    debug!(id = %action.id, entity = %action.entity, "Action synced");
                }

                Err(RemoteError::VersionConflict { server }) => {
                    info!(
                        id = %action.id,
                        entity = %action.entity,
                        "Version conflict, deferring resolution"
                    );
                    // The action stays queued until the conflict is settled
                    report.conflicts.push(ConflictResolution {
                        action_id: action.id.clone(),
                        entity: action.entity,
                        entity_id: conflicted_entity_id(&action),
                        local_data: action.payload.clone(),
                        server_data: server,
                        resolution: None,
                        resolved_data: None,
                    });
                }

                Err(RemoteError::Rejected(reason)) => {
                    // Retrying a rejected payload can never succeed: drop now
                    warn!(id = %action.id, %reason, "Action rejected, dropping");
                    self.queue.remove(&action.id).await?;
                    report.failed_actions.push(action);
                }

                Err(RemoteError::Transient(reason)) => {
                    let attempts = action.retry_count + 1;
                    if attempts >= action.max_retries {
                        warn!(
                            id = %action.id,
                            attempts,
                            %reason,
                            "Retries exhausted, dropping"
                        );
                        self.queue.remove(&action.id).await?;
                        let mut exhausted = action;
                        exhausted.retry_count = attempts;
                        report.failed_actions.push(exhausted);
                    } else {
                        debug!(id = %action.id, attempts, %reason, "Transient failure, will retry");
                        self.queue.update_retry(&action.id, attempts).await?;
                    }
                }
            }
        }

        let pending = self.queue.size().await as u32;
        self.status
            .record_attempt(report.synced_actions > 0, pending)
            .await?;

        // Success means the cycle completed without crashing; per-action
        // failures and conflicts are visible in the counts
        report.success = true;

        info!(
            synced = report.synced_actions,
            failed = report.failed_actions.len(),
            conflicts = report.conflicts.len(),
            pending,
            "Drain finished"
        );
        Ok(report)
    }

    /// Dispatches one action to the entity-appropriate remote call.
    async fn dispatch(&self, action: &OfflineAction) -> Result<(), RemoteError> {
        match action.kind {
            ActionKind::Create => {
                self.remote.create(action.entity, &action.payload).await?;
            }
            ActionKind::Update => {
                let id = action.original_id.as_deref().unwrap_or_default();
                self.remote.update(action.entity, id, &action.payload).await?;
            }
            ActionKind::Delete => {
                let id = action.original_id.as_deref().unwrap_or_default();
                self.remote.delete(action.entity, id).await?;
            }
        }
        Ok(())
    }

    fn notify(&self, report: &SyncReport) {
        let Ok(listeners) = self.listeners.lock() else {
            warn!("Sync listener registry poisoned, skipping notification");
            return;
        };
        for (id, listener) in listeners.iter() {
            // A panicking listener must not rob the remaining listeners of
            // their notification
            if catch_unwind(AssertUnwindSafe(|| listener(report))).is_err() {
                error!(listener = id, "Sync listener panicked");
            }
        }
    }
}

/// The entity id a conflict refers to: the action's target for
/// Update/Delete, otherwise whatever id the payload carries.
fn conflicted_entity_id(action: &OfflineAction) -> String {
    action
        .original_id
        .clone()
        .or_else(|| {
            action
                .payload
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    use darzi_core::{ActionDraft, EntityKind};
    use darzi_store::{DurableStore, MemoryStore, StoreError, StoreResult};

    use crate::network::NetworkState;

    // -------------------------------------------------------------------------
    // Scripted remote API
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    struct CallRecord {
        op: &'static str,
        payload: Value,
    }

    type Responder = Box<dyn Fn(usize, &Value) -> Result<Value, RemoteError> + Send + Sync>;

    struct ScriptedRemote {
        calls: StdMutex<Vec<CallRecord>>,
        respond: Responder,
        delay: Option<Duration>,
    }

    impl ScriptedRemote {
        fn ok() -> Self {
            ScriptedRemote::with(|_, payload| Ok(payload.clone()))
        }

        fn with<F>(respond: F) -> Self
        where
            F: Fn(usize, &Value) -> Result<Value, RemoteError> + Send + Sync + 'static,
        {
            ScriptedRemote {
                calls: StdMutex::new(Vec::new()),
                respond: Box::new(respond),
                delay: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            let mut remote = ScriptedRemote::ok();
            remote.delay = Some(delay);
            remote
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn recorded(&self) -> Vec<CallRecord> {
            self.calls.lock().unwrap().clone()
        }

        async fn record(&self, op: &'static str, payload: &Value) -> Result<Value, RemoteError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(CallRecord {
                    op,
                    payload: payload.clone(),
                });
                calls.len() - 1
            };
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.respond)(index, payload)
        }
    }

    #[async_trait]
    impl RemoteApi for ScriptedRemote {
        async fn create(&self, _entity: EntityKind, payload: &Value) -> Result<Value, RemoteError> {
            self.record("create", payload).await
        }

        async fn update(
            &self,
            _entity: EntityKind,
            _id: &str,
            payload: &Value,
        ) -> Result<Value, RemoteError> {
            self.record("update", payload).await
        }

        async fn delete(&self, _entity: EntityKind, _id: &str) -> Result<(), RemoteError> {
            self.record("delete", &Value::Null).await.map(|_| ())
        }
    }

    // -------------------------------------------------------------------------
    // Harness
    // -------------------------------------------------------------------------

    struct Harness {
        orchestrator: Arc<SyncOrchestrator>,
        queue: ActionQueue,
        status: SyncStatusStore,
        monitor: Arc<NetworkMonitor>,
        remote: Arc<ScriptedRemote>,
    }

    async fn harness_with(remote: ScriptedRemote, max_retries: u32) -> Harness {
        harness_on_store(Arc::new(MemoryStore::new()), remote, max_retries).await
    }

    async fn harness_on_store(
        store: Arc<dyn DurableStore>,
        remote: ScriptedRemote,
        max_retries: u32,
    ) -> Harness {
        let queue = ActionQueue::with_max_retries(store.clone(), max_retries);
        let status = SyncStatusStore::new(store);
        let monitor = Arc::new(NetworkMonitor::new());
        monitor
            .publish(NetworkState {
                connected: true,
                internet_reachable: true,
                transport: crate::network::NetworkTransport::Wifi,
            })
            .await;
        let remote = Arc::new(remote);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            queue.clone(),
            status.clone(),
            monitor.clone(),
            remote.clone() as Arc<dyn RemoteApi>,
        ));
        Harness {
            orchestrator,
            queue,
            status,
            monitor,
            remote,
        }
    }

    async fn enqueue_creates(queue: &ActionQueue, count: usize) {
        for n in 0..count {
            queue
                .enqueue(ActionDraft::create(EntityKind::Bill, json!({"seq": n})))
                .await
                .unwrap();
        }
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_fifo_delivery_empties_queue() {
        let h = harness_with(ScriptedRemote::ok(), 3).await;
        enqueue_creates(&h.queue, 4).await;

        let report = h.orchestrator.drain().await.unwrap();

        assert!(report.success);
        assert_eq!(report.synced_actions, 4);
        assert!(report.failed_actions.is_empty());
        assert_eq!(h.queue.size().await, 0);

        // Remote was invoked in exact enqueue order
        let recorded = h.remote.recorded();
        assert!(recorded.iter().all(|c| c.op == "create"));
        let seqs: Vec<i64> = recorded
            .iter()
            .map(|c| c.payload["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_retry_ceiling_drops_action_exactly_once() {
        let h = harness_with(
            ScriptedRemote::with(|_, _| Err(RemoteError::Transient("server down".into()))),
            3,
        )
        .await;
        enqueue_creates(&h.queue, 1).await;

        // Attempts 1 and 2: bumped, still queued
        for expected_retry in 1..=2u32 {
            let report = h.orchestrator.drain().await.unwrap();
            assert!(report.failed_actions.is_empty());
            let listed = h.queue.list().await;
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].retry_count, expected_retry);
        }

        // Attempt 3 reaches the ceiling: dropped and reported exactly once
        let report = h.orchestrator.drain().await.unwrap();
        assert_eq!(report.failed_actions.len(), 1);
        assert_eq!(report.failed_actions[0].retry_count, 3);
        assert_eq!(h.queue.size().await, 0);
        assert_eq!(h.remote.call_count(), 3);

        // Nothing left to attempt
        let report = h.orchestrator.drain().await.unwrap();
        assert_eq!(report.synced_actions, 0);
        assert_eq!(h.remote.call_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_flight_skips_concurrent_drain() {
        let h = harness_with(ScriptedRemote::slow(Duration::from_millis(100)), 3).await;
        enqueue_creates(&h.queue, 1).await;

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.drain().await.unwrap() })
        };
        // Give the first drain time to take the flag and park in the remote
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = h.orchestrator.drain().await.unwrap();

        // The overlapping request is a no-op, not queued behind the first
        assert!(!second.success);
        assert_eq!(second.synced_actions, 0);

        let first = first.await.unwrap();
        assert_eq!(first.synced_actions, 1);

        // The action was delivered exactly once
        assert_eq!(h.remote.call_count(), 1);
        assert_eq!(h.queue.size().await, 0);
    }

    #[tokio::test]
    async fn test_offline_guard_touches_nothing() {
        let h = harness_with(ScriptedRemote::ok(), 3).await;
        enqueue_creates(&h.queue, 2).await;
        h.monitor.publish(NetworkState::offline()).await;

        let report = h.orchestrator.drain().await.unwrap();

        assert!(!report.success);
        assert_eq!(report.synced_actions, 0);
        assert_eq!(h.remote.call_count(), 0);
        assert_eq!(h.queue.size().await, 2);
        // Status record untouched by a skipped drain
        assert!(h.status.load().await.last_sync_attempt.is_none());
    }

    #[tokio::test]
    async fn test_version_conflict_keeps_action_queued() {
        let h = harness_with(
            ScriptedRemote::with(|_, _| {
                Err(RemoteError::VersionConflict {
                    server: json!({"id": "bill-1", "totalAmount": 999}),
                })
            }),
            3,
        )
        .await;
        h.queue
            .enqueue(ActionDraft::update(
                EntityKind::Bill,
                "bill-1",
                json!({"id": "bill-1", "totalAmount": 100}),
            ))
            .await
            .unwrap();

        let report = h.orchestrator.drain().await.unwrap();

        assert!(report.success);
        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.entity_id, "bill-1");
        assert_eq!(conflict.server_data["totalAmount"], 999);
        assert!(conflict.resolution.is_none());

        // Not a retry, not a failure: the action waits for resolution
        assert_eq!(h.queue.size().await, 1);
        assert_eq!(h.queue.list().await[0].retry_count, 0);
        assert!(report.failed_actions.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_drops_without_consuming_retries() {
        let h = harness_with(
            ScriptedRemote::with(|_, _| Err(RemoteError::Rejected("unknown customerId".into()))),
            3,
        )
        .await;
        enqueue_creates(&h.queue, 1).await;

        let report = h.orchestrator.drain().await.unwrap();

        assert_eq!(report.failed_actions.len(), 1);
        assert_eq!(report.failed_actions[0].retry_count, 0);
        assert_eq!(h.queue.size().await, 0);
        assert_eq!(h.remote.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_later_actions() {
        // Second call fails permanently, first and third succeed
        let h = harness_with(
            ScriptedRemote::with(|index, payload| match index {
                1 => Err(RemoteError::Rejected("bad".into())),
                _ => Ok(payload.clone()),
            }),
            3,
        )
        .await;
        enqueue_creates(&h.queue, 3).await;

        let report = h.orchestrator.drain().await.unwrap();

        assert_eq!(report.synced_actions, 2);
        assert_eq!(report.failed_actions.len(), 1);
        assert_eq!(h.queue.size().await, 0);
    }

    #[tokio::test]
    async fn test_status_record_after_drain() {
        let h = harness_with(ScriptedRemote::ok(), 3).await;
        enqueue_creates(&h.queue, 2).await;

        h.orchestrator.drain().await.unwrap();

        let status = h.status.load().await;
        assert!(status.last_sync_attempt.is_some());
        assert!(status.last_successful_sync.is_some());
        assert_eq!(status.pending_actions, 0);
    }

    #[tokio::test]
    async fn test_listener_panic_does_not_starve_others() {
        let h = harness_with(ScriptedRemote::ok(), 3).await;
        enqueue_creates(&h.queue, 1).await;

        let seen = Arc::new(StdMutex::new(Vec::<u32>::new()));
        h.orchestrator.subscribe(|_| panic!("listener bug"));
        let seen_clone = seen.clone();
        h.orchestrator.subscribe(move |report| {
            seen_clone.lock().unwrap().push(report.synced_actions);
        });

        let report = h.orchestrator.drain().await.unwrap();
        assert!(report.success);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_not_notified() {
        let h = harness_with(ScriptedRemote::ok(), 3).await;
        let hits = Arc::new(StdMutex::new(0u32));
        let hits_clone = hits.clone();
        let id = h.orchestrator.subscribe(move |_| {
            *hits_clone.lock().unwrap() += 1;
        });

        h.orchestrator.drain().await.unwrap();
        h.orchestrator.unsubscribe(id);
        h.orchestrator.drain().await.unwrap();

        assert_eq!(*hits.lock().unwrap(), 1);
    }

    // -------------------------------------------------------------------------
    // Storage failure mid-drain
    // -------------------------------------------------------------------------

    /// Store that fails the Nth `set` call, then recovers.
    struct FlakyStore {
        inner: MemoryStore,
        sets: std::sync::atomic::AtomicUsize,
        fail_on_set: usize,
    }

    #[async_trait]
    impl DurableStore for FlakyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            let n = self.sets.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_on_set {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> StoreResult<()> {
            self.inner.remove(key).await
        }

        async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.inner.keys_with_prefix(prefix).await
        }
    }

    #[tokio::test]
    async fn test_storage_error_aborts_but_keeps_committed_writes() {
        // Sets 1-2 are the two enqueues; set 3 (removal of the first synced
        // action) succeeds; set 4 (removal of the second) fails
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            sets: std::sync::atomic::AtomicUsize::new(0),
            fail_on_set: 4,
        });
        let h = harness_on_store(store as Arc<dyn DurableStore>, ScriptedRemote::ok(), 3).await;
        enqueue_creates(&h.queue, 2).await;

        let notified = Arc::new(StdMutex::new(0u32));
        let notified_clone = notified.clone();
        h.orchestrator.subscribe(move |_| {
            *notified_clone.lock().unwrap() += 1;
        });

        let result = h.orchestrator.drain().await;
        assert!(result.is_err());

        // The first removal committed before the failure and stays committed
        assert_eq!(h.queue.size().await, 1);
        // An aborted drain produces no report
        assert_eq!(*notified.lock().unwrap(), 0);

        // The next drain finishes the job
        let report = h.orchestrator.drain().await.unwrap();
        assert_eq!(report.synced_actions, 1);
        assert_eq!(h.queue.size().await, 0);
    }
}
