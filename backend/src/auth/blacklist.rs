//! Revoked-token registry consulted before any token is trusted.
//!
//! Entries carry the token's own expiry so a periodic sweep can drop them once
//! the token could no longer be accepted anyway.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Revocation store. Implementations must be safe to share across requests.
pub trait TokenBlacklist: Send + Sync {
    /// Revoke `token` until `expires_at` (unix seconds).
    fn revoke(&self, token: &str, expires_at: i64);

    /// An entry stays revoked until it is purged.
    fn is_revoked(&self, token: &str) -> bool;

    /// Drop entries whose expiry is at or before `now`. Returns the count.
    fn purge_expired(&self, now: i64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local blacklist. Lost on restart and not shared between instances.
#[derive(Default)]
pub struct InMemoryBlacklist {
    entries: DashMap<String, i64>,
}

impl InMemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenBlacklist for InMemoryBlacklist {
    fn revoke(&self, token: &str, expires_at: i64) {
        self.entries
            .entry(token.to_string())
            .and_modify(|exp| *exp = (*exp).max(expires_at))
            .or_insert(expires_at);
    }

    fn is_revoked(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    fn purge_expired(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, exp| *exp > now);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Spawn the periodic sweep. The first sweep runs one full interval after
/// startup.
pub fn spawn_sweeper(blacklist: Arc<dyn TokenBlacklist>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = blacklist.purge_expired(chrono::Utc::now().timestamp());
            if purged == 0 {
                continue;
            }
            if blacklist.is_empty() {
                tracing::debug!("Purged {} expired blacklist entries, none remaining", purged);
            } else {
                tracing::debug!(
                    "Purged {} expired blacklist entries, {} remaining",
                    purged,
                    blacklist.len()
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_tokens_are_reported() {
        let blacklist = InMemoryBlacklist::new();
        assert!(blacklist.is_empty());
        assert!(!blacklist.is_revoked("abc"));
        blacklist.revoke("abc", 100);
        assert!(blacklist.is_revoked("abc"));
        assert_eq!(blacklist.len(), 1);
        assert!(!blacklist.is_empty());
    }

    #[test]
    fn revoking_twice_keeps_one_entry_with_later_expiry() {
        let blacklist = InMemoryBlacklist::new();
        blacklist.revoke("abc", 100);
        blacklist.revoke("abc", 50);
        assert_eq!(blacklist.len(), 1);
        assert_eq!(blacklist.purge_expired(60), 0);
        assert!(blacklist.is_revoked("abc"));
    }

    #[test]
    fn purge_drops_only_expired_entries() {
        let blacklist = InMemoryBlacklist::new();
        blacklist.revoke("old", 10);
        blacklist.revoke("edge", 20);
        blacklist.revoke("fresh", 30);

        assert_eq!(blacklist.purge_expired(20), 2);
        assert!(!blacklist.is_revoked("old"));
        assert!(!blacklist.is_revoked("edge"));
        assert!(blacklist.is_revoked("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_on_interval() {
        let blacklist: Arc<dyn TokenBlacklist> = Arc::new(InMemoryBlacklist::new());
        blacklist.revoke("expired", 0);
        blacklist.revoke("live", i64::MAX);

        let handle = spawn_sweeper(blacklist.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(!blacklist.is_revoked("expired"));
        assert!(blacklist.is_revoked("live"));
        handle.abort();
    }
}
