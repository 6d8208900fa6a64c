//! Caller-level retry with exponential backoff.
//!
//! This wraps a single direct remote call (the online-first write path), not
//! the queue: the orchestrator applies no delay between retries of a queued
//! action (cross-drain pacing comes from reconnect events and manual sync)
//! while a direct call gets a few quick attempts before the caller falls back
//! to enqueueing.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::config::RemoteSettings;
use crate::remote::RemoteError;

/// Runs `op` up to `settings.direct_attempts` times, sleeping with
/// exponential backoff (doubling from `initial_backoff_ms`, capped at
/// `max_backoff_secs`) between attempts.
///
/// Only [`RemoteError::is_retryable`] failures are retried; a version
/// conflict or permanent rejection returns immediately.
pub async fn with_backoff<T, F, Fut>(settings: &RemoteSettings, mut op: F) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let max_backoff = Duration::from_secs(settings.max_backoff_secs);
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(settings.initial_backoff_ms),
        max_interval: max_backoff,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < settings.direct_attempts => {
                let delay = backoff.next_backoff().unwrap_or(max_backoff);
                warn!(attempt, ?delay, error = %e, "Direct call failed, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_settings(attempts: u32) -> RemoteSettings {
        RemoteSettings {
            base_url: None,
            direct_attempts: attempts,
            initial_backoff_ms: 1,
            max_backoff_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let result: Result<Value, _> = with_backoff(&fast_settings(3), move || async move {
            match calls_ref.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(RemoteError::Transient("flaky".into())),
                _ => Ok(json!({"ok": true})),
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let result: Result<Value, _> = with_backoff(&fast_settings(3), move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::Transient("down".into()))
        })
        .await;

        assert!(matches!(result, Err(RemoteError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let result: Result<Value, _> = with_backoff(&fast_settings(3), move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(RemoteError::Rejected("bad payload".into()))
        })
        .await;

        assert!(matches!(result, Err(RemoteError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
