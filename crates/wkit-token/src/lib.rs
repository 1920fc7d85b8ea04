//! In-memory token cache keyed by user name.
//!
//! Expired tokens are removed lazily on read and by an optional periodic
//! sweep started with [`TokenStore::start_cleanup`].

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Default period between sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30 * 60);

// Upper bound for TTLs too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct TokenEntry {
    token: String,
    expires_at: Instant,
}

impl TokenEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Token store configuration.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    /// Period between expiry sweeps.
    pub cleanup_interval: Duration,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl TokenStoreConfig {
    /// Read `WKIT_TOKEN_CLEANUP_INTERVAL_SECS`, falling back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var("WKIT_TOKEN_CLEANUP_INTERVAL_SECS") {
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.cleanup_interval = Duration::from_secs(secs),
                _ => warn!(value = %value, "Ignoring invalid WKIT_TOKEN_CLEANUP_INTERVAL_SECS"),
            }
        }
        config
    }
}

/// Concurrent map of user name to token.
#[derive(Default)]
pub struct TokenStore {
    entries: DashMap<String, TokenEntry>,
}

impl TokenStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `token` for `user`, replacing any previous one. A zero `ttl`
    /// stores an already expired token.
    pub fn store_token(&self, user: impl Into<String>, token: impl Into<String>, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let user = user.into();
        debug!(user = %user, ttl_secs = ttl.as_secs(), "Token stored");
        self.entries.insert(
            user,
            TokenEntry {
                token: token.into(),
                expires_at,
            },
        );
    }

    /// The live token of `user`. An expired token is removed and reported
    /// as absent.
    pub fn get_token(&self, user: &str) -> Option<String> {
        let now = Instant::now();
        match self.entries.get(user) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.token.clone()),
            Some(_) => {}
            None => return None,
        }

        // The read guard is gone; a concurrent store may have replaced the
        // entry, so only remove it if it is still expired.
        if self
            .entries
            .remove_if(user, |_, entry| entry.is_expired(now))
            .is_some()
        {
            debug!(user = %user, "Token expired");
        }
        None
    }

    /// Remove every expired token and return how many were removed.
    pub fn clean_expired_tokens(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Expired tokens cleaned");
        }
        removed
    }

    /// Number of stored tokens, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no token is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a task sweeping expired tokens every `period`.
    ///
    /// Must be called from within a tokio runtime. The task stops when the
    /// returned handle is shut down or dropped.
    pub fn start_cleanup(self: &Arc<Self>, period: Duration) -> CleanupHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.clean_expired_tokens();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Token cleanup stopped");
        });

        CleanupHandle {
            shutdown_tx,
            task: Some(task),
        }
    }
}

/// Handle to the sweep task started by [`TokenStore::start_cleanup`].
pub struct CleanupHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl CleanupHandle {
    /// Stop the sweep and wait for the task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Token cleanup task failed");
            }
        }
    }

    /// Whether the sweep task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}
