//! Authorization-code replay protection.
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::middleware::{StoreError, UsedCodeStore};

/// How long a redeemed authorization code is remembered.
pub const REPLAY_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Default period of the background purge.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-process set of redeemed authorization codes.
///
/// # Limitations
///
/// Entries are not shared between server instances. Multi-instance
/// deployments need a [`UsedCodeStore`] backed by a shared cache.
#[derive(Clone, Default)]
pub struct InMemoryCodeStore(Arc<Mutex<HashMap<String, Instant>>>);

impl std::fmt::Debug for InMemoryCodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCodeStore").finish_non_exhaustive()
    }
}

impl InMemoryCodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.0.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.0.lock().await.is_empty()
    }
}

impl UsedCodeStore for InMemoryCodeStore {
    #[tracing::instrument(name = "Record authorization code", level = tracing::Level::TRACE, skip_all)]
    async fn insert_if_absent(&self, code: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut guard = self.0.lock().await;
        let now = Instant::now();
        match guard.entry(code.to_owned()) {
            Entry::Occupied(entry) if *entry.get() > now => Ok(false),
            Entry::Occupied(mut entry) => {
                entry.insert(now + ttl);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(now + ttl);
                Ok(true)
            }
        }
    }

    #[tracing::instrument(name = "Purge expired authorization codes", level = tracing::Level::TRACE, skip_all)]
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut guard = self.0.lock().await;
        let now = Instant::now();
        let before = guard.len();
        guard.retain(|_, deadline| *deadline > now);
        Ok(before - guard.len())
    }
}

/// Owns a [`UsedCodeStore`], its replay window and the periodic purge task.
///
/// The purge runs on the Tokio runtime independently of request handling
/// and stops when the guard is dropped.
pub struct ReplayGuard<S> {
    store: Arc<S>,
    window: Duration,
    sweeper: Option<JoinHandle<()>>,
}

impl<S: UsedCodeStore> ReplayGuard<S> {
    #[must_use]
    pub fn new(store: S, window: Duration) -> Self {
        Self {
            store: Arc::new(store),
            window,
            sweeper: None,
        }
    }

    /// Start purging expired entries every `every`.
    ///
    /// Without a running Tokio runtime the purge is skipped with a warning;
    /// expired entries are still ignored by [`try_claim`](Self::try_claim).
    #[must_use]
    pub fn with_sweep(mut self, every: Duration) -> Self {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let store = Arc::downgrade(&self.store);
                self.sweeper = Some(runtime.spawn(sweep(store, every)));
            }
            Err(_) => {
                tracing::warn!("No Tokio runtime available, used-code sweep disabled");
            }
        }
        self
    }

    /// Atomically claim `code`. `Ok(false)` means it was already redeemed
    /// within the replay window.
    ///
    /// # Errors
    ///
    /// Propagates the store's error; callers must treat it as a rejection.
    pub async fn try_claim(&self, code: &str) -> Result<bool, StoreError> {
        self.store.insert_if_absent(code, self.window).await
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<S> Drop for ReplayGuard<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

async fn sweep<S: UsedCodeStore>(store: Weak<S>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Purged expired authorization codes"),
            Err(e) => tracing::warn!(error = %e, "Used-code purge failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_insert_wins() {
        let store = InMemoryCodeStore::new();
        assert!(store.insert_if_absent("abc123", REPLAY_WINDOW).await.unwrap());
        assert!(!store.insert_if_absent("abc123", REPLAY_WINDOW).await.unwrap());
        assert!(store.insert_if_absent("other", REPLAY_WINDOW).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_window() {
        let store = InMemoryCodeStore::new();
        assert!(store.insert_if_absent("abc123", REPLAY_WINDOW).await.unwrap());

        tokio::time::advance(REPLAY_WINDOW - Duration::from_secs(1)).await;
        assert!(!store.insert_if_absent("abc123", REPLAY_WINDOW).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.insert_if_absent("abc123", REPLAY_WINDOW).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let store = InMemoryCodeStore::new();
        store.insert_if_absent("old", Duration::from_secs(5)).await.unwrap();
        store.insert_if_absent("fresh", REPLAY_WINDOW).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(!store.insert_if_absent("fresh", REPLAY_WINDOW).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_one_winner() {
        let guard = Arc::new(ReplayGuard::new(InMemoryCodeStore::new(), REPLAY_WINDOW));

        let attempts: Vec<_> = (0..32)
            .map(|_| {
                let guard = Arc::clone(&guard);
                tokio::spawn(async move { guard.try_claim("abc123").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_purges_in_background() {
        let guard = ReplayGuard::new(InMemoryCodeStore::new(), Duration::from_secs(5))
            .with_sweep(Duration::from_secs(10));
        assert!(guard.is_sweeping());
        assert!(guard.try_claim("abc123").await.unwrap());

        tokio::time::sleep(Duration::from_secs(11)).await;
        // Let the sweep task observe the tick.
        tokio::task::yield_now().await;
        assert!(guard.store().is_empty().await);
    }

    #[tokio::test]
    async fn dropping_guard_stops_sweep() {
        let guard = ReplayGuard::new(InMemoryCodeStore::new(), REPLAY_WINDOW)
            .with_sweep(Duration::from_millis(10));
        let store = guard.store().clone();
        drop(guard);
        // The store outlives the guard; nothing panics once the task is gone.
        assert!(store.insert_if_absent("x", REPLAY_WINDOW).await.unwrap());
    }

    #[test]
    fn with_sweep_outside_runtime_is_disabled() {
        let guard = ReplayGuard::new(InMemoryCodeStore::new(), REPLAY_WINDOW)
            .with_sweep(Duration::from_secs(1));
        assert!(!guard.is_sweeping());
    }
}
