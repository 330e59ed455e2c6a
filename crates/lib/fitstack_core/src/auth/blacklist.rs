//! In-process token blacklist.
//!
//! Records the `jti` of revoked access tokens until their natural expiry;
//! after that the token is rejected on expiry alone and the entry is
//! garbage. Entries are evicted lazily at lookup and by a periodic sweep.
//!
//! The store is injected through shared state (`Arc<TokenBlacklist>`),
//! never a process-wide static.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Sweep interval for the background eviction task.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Revocation list for access-token ids, keyed by `jti`.
pub struct TokenBlacklist {
    entries: DashMap<Uuid, DateTime<Utc>>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Blacklist a token id through its natural expiry.
    ///
    /// A token that is already past expiry needs no protection; the call is
    /// a no-op.
    pub fn add(&self, jti: Uuid, natural_expiry: DateTime<Utc>) {
        if natural_expiry <= Utc::now() {
            return;
        }
        self.entries.insert(jti, natural_expiry);
        debug!(%jti, %natural_expiry, "access token blacklisted");
    }

    /// Whether a token id is currently blacklisted.
    ///
    /// An entry whose expiry has passed is treated as absent and pruned.
    pub fn is_blacklisted(&self, jti: &Uuid) -> bool {
        let Some(expiry) = self.entries.get(jti).map(|e| *e.value()) else {
            return false;
        };
        if expiry <= Utc::now() {
            self.entries.remove(jti);
            return false;
        }
        true
    }

    /// Evict entries past their expiry.
    pub fn cleanup(&self) {
        let now = Utc::now();
        self.entries.retain(|_, expiry| *expiry > now);
    }

    /// Number of live entries (monitoring).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a periodic eviction task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

impl Default for TokenBlacklist {
    fn default() -> Self {
        Self::new()
    }
}
