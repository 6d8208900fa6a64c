//! # Network Monitor
//!
//! Tracks connectivity, notifies subscribers of every transition, and pushes
//! the reconnect signal that triggers a drain, the only cross-component push
//! in the engine; everything else is pull.
//!
//! ## State Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Network Monitor Flow                               │
//! │                                                                         │
//! │  ConnectivityProbe (host platform)         host push                   │
//! │       │ sample() on an interval               │                         │
//! │       ▼                                       ▼                         │
//! │  ┌─────────────────────────────────────────────────────┐               │
//! │  │              NetworkMonitor::publish                │               │
//! │  │                                                     │               │
//! │  │  1. Replace current state atomically                │               │
//! │  │  2. Notify EVERY listener (even no-op changes:     │               │
//! │  │     transport flips with connectivity unchanged;    │               │
//! │  │     listeners must be idempotent)                   │               │
//! │  │  3. was_offline && now_online → reconnect signal    │               │
//! │  └─────────────────────────────────────────────────────┘               │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │                        SyncOrchestrator::drain (via engine watcher)    │
//! │                                                                         │
//! │  PROBE FAILURE                                                         │
//! │  The probe itself breaking must not strand the app offline. Default    │
//! │  policy assumes online (type unknown) and lets the drain's own guard   │
//! │  and retry ceiling absorb the cost of a wrong guess. Stricter hosts    │
//! │  configure assume_offline instead.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

// =============================================================================
// Network State
// =============================================================================

/// The transport the device is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkTransport {
    Wifi,
    Cellular,
    /// No link at all.
    None,
    Unknown,
}

impl std::fmt::Display for NetworkTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkTransport::Wifi => write!(f, "wifi"),
            NetworkTransport::Cellular => write!(f, "cellular"),
            NetworkTransport::None => write!(f, "none"),
            NetworkTransport::Unknown => write!(f, "unknown"),
        }
    }
}

/// A connectivity snapshot, replaced atomically on every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    /// Link-level connectivity.
    pub connected: bool,

    /// Whether the internet is actually reachable over that link
    /// (captive portals and dead uplinks make these differ).
    pub internet_reachable: bool,

    pub transport: NetworkTransport,
}

impl NetworkState {
    /// Online means both connected and reachable.
    pub fn is_online(&self) -> bool {
        self.connected && self.internet_reachable
    }

    /// The fail-open fallback: assume connectivity with an unknown transport.
    pub fn assume_online() -> Self {
        NetworkState {
            connected: true,
            internet_reachable: true,
            transport: NetworkTransport::Unknown,
        }
    }

    /// Fully offline.
    pub fn offline() -> Self {
        NetworkState {
            connected: false,
            internet_reachable: false,
            transport: NetworkTransport::None,
        }
    }
}

/// What to assume when the connectivity probe itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailurePolicy {
    /// Fail open: never strand the app offline because monitoring broke.
    #[default]
    AssumeOnline,

    /// Fail closed: treat broken monitoring as being offline.
    AssumeOffline,
}

impl ProbeFailurePolicy {
    fn fallback_state(self) -> NetworkState {
        match self {
            ProbeFailurePolicy::AssumeOnline => NetworkState::assume_online(),
            ProbeFailurePolicy::AssumeOffline => NetworkState::offline(),
        }
    }
}

// =============================================================================
// Connectivity Probe
// =============================================================================

/// Error from the host's connectivity probe.
#[derive(Debug, Error)]
#[error("Connectivity probe failed: {0}")]
pub struct ProbeError(pub String);

/// Host-provided connectivity sampling (platform network API, captive-portal
/// check, or a plain HTTP HEAD against the backend).
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn sample(&self) -> Result<NetworkState, ProbeError>;
}

// =============================================================================
// Network Monitor
// =============================================================================

/// Identifier handed back by `subscribe`, used to unsubscribe.
///
/// A registry of ids instead of unsubscribe closures: nothing to leak across
/// restarts, and removal is O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

type NetworkListener = Box<dyn Fn(&NetworkState) + Send + Sync>;

/// Observes connectivity and fans transitions out to subscribers.
pub struct NetworkMonitor {
    /// Current snapshot, replaced atomically on every publish.
    state: RwLock<NetworkState>,

    /// Subscriber registry.
    listeners: StdMutex<HashMap<u64, NetworkListener>>,

    next_id: AtomicU64,

    /// Reconnect signal wired by the engine to the orchestrator's drain.
    reconnect_tx: StdMutex<Option<mpsc::Sender<()>>>,
}

impl NetworkMonitor {
    /// Creates a monitor.
    ///
    /// The initial state is assume-online: before the first sample arrives,
    /// blocking writes on an unproven "offline" would be the worse failure
    /// mode for a point of sale.
    pub fn new() -> Self {
        NetworkMonitor {
            state: RwLock::new(NetworkState::assume_online()),
            listeners: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            reconnect_tx: StdMutex::new(None),
        }
    }

    /// Returns the current snapshot.
    pub async fn current_state(&self) -> NetworkState {
        *self.state.read().await
    }

    /// True iff connected and internet-reachable.
    pub async fn is_online(&self) -> bool {
        self.state.read().await.is_online()
    }

    /// Registers a listener invoked on every published state.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&NetworkState) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
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

    /// Wires the reconnect signal (called by the engine on start).
    pub(crate) fn set_reconnect_notifier(&self, tx: Option<mpsc::Sender<()>>) {
        if let Ok(mut slot) = self.reconnect_tx.lock() {
            *slot = tx;
        }
    }

    /// Publishes a new snapshot.
    ///
    /// Every publish notifies every listener, including no-op changes where
    /// only the transport differs; listeners must be idempotent. An
    /// offline→online edge additionally fires the reconnect signal.
    pub async fn publish(&self, new_state: NetworkState) {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, new_state)
        };

        debug!(
            connected = new_state.connected,
            reachable = new_state.internet_reachable,
            transport = %new_state.transport,
            "Network state published"
        );

        self.notify(&new_state);

        let was_offline = !previous.connected;
        if was_offline && new_state.connected {
            info!("Connectivity restored, requesting sync");
            let tx = match self.reconnect_tx.lock() {
                Ok(slot) => slot.clone(),
                Err(_) => None,
            };
            if let Some(tx) = tx {
                // try_send: a pending signal already queued is enough
                let _ = tx.try_send(());
            }
        }
    }

    fn notify(&self, state: &NetworkState) {
        let Ok(listeners) = self.listeners.lock() else {
            warn!("Listener registry poisoned, skipping notification");
            return;
        };
        for (id, listener) in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
                error!(listener = id, "Network listener panicked");
            }
        }
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        NetworkMonitor::new()
    }
}

// =============================================================================
// Probe Loop
// =============================================================================

/// Handle for stopping a running probe loop.
pub struct ProbeLoopHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ProbeLoopHandle {
    /// Triggers graceful shutdown of the probe loop.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Spawns the background task that samples the probe on an interval and
/// publishes the result.
pub fn spawn_probe_loop(
    monitor: Arc<NetworkMonitor>,
    probe: Arc<dyn ConnectivityProbe>,
    interval: Duration,
    failure_policy: ProbeFailurePolicy,
) -> ProbeLoopHandle {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match probe.sample().await {
                        Ok(state) => monitor.publish(state).await,
                        Err(e) => {
                            warn!(?e, policy = ?failure_policy, "Probe failed, applying fallback");
                            monitor.publish(failure_policy.fallback_state()).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Probe loop shutting down");
                    break;
                }
            }
        }
    });

    ProbeLoopHandle { shutdown_tx }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn online() -> NetworkState {
        NetworkState {
            connected: true,
            internet_reachable: true,
            transport: NetworkTransport::Wifi,
        }
    }

    #[test]
    fn test_is_online_requires_both_flags() {
        let mut state = online();
        assert!(state.is_online());

        state.internet_reachable = false;
        assert!(!state.is_online());

        assert!(!NetworkState::offline().is_online());
        assert!(NetworkState::assume_online().is_online());
    }

    #[tokio::test]
    async fn test_publish_replaces_state() {
        let monitor = NetworkMonitor::new();
        monitor.publish(NetworkState::offline()).await;
        assert!(!monitor.is_online().await);

        monitor.publish(online()).await;
        assert_eq!(monitor.current_state().await.transport, NetworkTransport::Wifi);
    }

    #[tokio::test]
    async fn test_every_publish_notifies_even_noop_changes() {
        let monitor = NetworkMonitor::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        monitor.subscribe(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        monitor.publish(online()).await;
        monitor.publish(online()).await; // identical state, still notified
        let mut cellular = online();
        cellular.transport = NetworkTransport::Cellular;
        monitor.publish(cellular).await;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let monitor = NetworkMonitor::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let id = monitor.subscribe(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        monitor.publish(online()).await;
        monitor.unsubscribe(id);
        monitor.publish(online()).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconnect_fires_only_on_offline_to_online_edge() {
        let monitor = NetworkMonitor::new();
        let (tx, mut rx) = mpsc::channel(4);
        monitor.set_reconnect_notifier(Some(tx));

        // online → online: no signal
        monitor.publish(online()).await;
        assert!(rx.try_recv().is_err());

        // online → offline: no signal
        monitor.publish(NetworkState::offline()).await;
        assert!(rx.try_recv().is_err());

        // offline → online: signal
        monitor.publish(online()).await;
        assert!(rx.try_recv().is_ok());
    }

    struct BrokenProbe;

    #[async_trait]
    impl ConnectivityProbe for BrokenProbe {
        async fn sample(&self) -> Result<NetworkState, ProbeError> {
            Err(ProbeError("platform API unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_broken_probe_fail_open() {
        let monitor = Arc::new(NetworkMonitor::new());
        monitor.publish(NetworkState::offline()).await;

        let handle = spawn_probe_loop(
            monitor.clone(),
            Arc::new(BrokenProbe),
            Duration::from_millis(10),
            ProbeFailurePolicy::AssumeOnline,
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        let state = monitor.current_state().await;
        assert!(state.is_online());
        assert_eq!(state.transport, NetworkTransport::Unknown);
    }

    #[tokio::test]
    async fn test_broken_probe_fail_closed() {
        let monitor = Arc::new(NetworkMonitor::new());

        let handle = spawn_probe_loop(
            monitor.clone(),
            Arc::new(BrokenProbe),
            Duration::from_millis(10),
            ProbeFailurePolicy::AssumeOffline,
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        assert!(!monitor.is_online().await);
    }
}
