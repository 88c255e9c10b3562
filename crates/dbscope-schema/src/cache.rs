//! Time-bounded cache of schema payloads, keyed by database id

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// TTL used when none is configured
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Environment variable holding the TTL in whole seconds
pub const TTL_ENV_VAR: &str = "SCHEMA_CACHE_TTL";

/// Shortest interval between background sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Parse a TTL setting in seconds.
///
/// Unset or blank means [`DEFAULT_TTL`]; anything unparsable is logged and
/// also falls back to the default.
pub fn parse_ttl(raw: Option<&str>) -> Duration {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return DEFAULT_TTL;
    };
    match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => {
            tracing::warn!(value = %raw, "invalid {} value, using default of 5 minutes", TTL_ENV_VAR);
            DEFAULT_TTL
        }
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Payload-agnostic cache with a fixed time-to-live.
///
/// Expired entries are never returned; they are dropped by
/// [`SchemaCache::cleanup_expired`] or replaced by the next `set`.
pub struct SchemaCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> SchemaCache<V> {
    pub fn new(ttl: Duration) -> Self {
        tracing::info!(ttl_secs = ttl.as_secs(), "schema cache initialized");
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cache whose TTL comes from `SCHEMA_CACHE_TTL`
    pub fn from_env() -> Self {
        let raw = std::env::var(TTL_ENV_VAR).ok();
        Self::new(parse_ttl(raw.as_deref()))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value stored for `database_id`, if any
    pub fn get(&self, database_id: &str) -> Option<V> {
        let entries = self.entries.read();
        match entries.get(database_id) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                tracing::debug!(database_id = %database_id, "schema cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                tracing::debug!(database_id = %database_id, "schema cache entry expired");
                None
            }
            None => {
                tracing::debug!(database_id = %database_id, "schema cache miss");
                None
            }
        }
    }

    /// Store `value`, replacing any previous entry
    pub fn set(&self, database_id: &str, value: V) {
        self.entries.write().insert(
            database_id.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
        tracing::debug!(database_id = %database_id, "schema cached");
    }

    /// Drop the entry for one database. Returns whether one existed.
    pub fn invalidate(&self, database_id: &str) -> bool {
        let removed = self.entries.write().remove(database_id).is_some();
        tracing::debug!(database_id = %database_id, removed, "schema cache invalidated");
        removed
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
        tracing::info!("schema cache cleared");
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "cleaned up expired schema cache entries");
        }
        removed
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone + Send + Sync + 'static> SchemaCache<V> {
    /// Sweep expired entries every TTL (at least once per second) until
    /// `shutdown` fires or the cache is dropped.
    pub fn spawn_cleanup(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let period = self.ttl.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(cache) = cache.upgrade() else { break };
                        cache.cleanup_expired();
                    }
                }
            }
            tracing::debug!("schema cache sweep stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::unset(None, DEFAULT_TTL)]
    #[case::blank(Some("  "), DEFAULT_TTL)]
    #[case::seconds(Some("60"), Duration::from_secs(60))]
    #[case::zero(Some("0"), Duration::ZERO)]
    #[case::garbage(Some("5m"), DEFAULT_TTL)]
    #[case::negative(Some("-1"), DEFAULT_TTL)]
    fn ttl_parsing(#[case] raw: Option<&str>, #[case] expected: Duration) {
        assert_eq!(parse_ttl(raw), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_returned() {
        let cache = SchemaCache::new(Duration::from_secs(300));
        cache.set("main", 42);
        assert_eq!(cache.get("main"), Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let cache = SchemaCache::new(Duration::from_secs(300));
        cache.set("main", 42);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("main"), Some(42));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("main"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn invalidate_removes_one_entry() {
        let cache = SchemaCache::new(Duration::from_secs(300));
        cache.set("main", 1);
        cache.set("replica", 2);

        assert!(cache.invalidate("main"));
        assert!(!cache.invalidate("main"));

        assert_eq!(cache.get("main"), None);
        assert_eq!(cache.get("replica"), Some(2));
    }

    #[tokio::test]
    async fn invalidate_all_clears() {
        let cache = SchemaCache::new(Duration::from_secs(300));
        cache.set("main", 1);
        cache.set("replica", 2);

        cache.invalidate_all();

        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_refreshes() {
        let cache = SchemaCache::new(Duration::from_secs(10));
        cache.set("main", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("main", 2);
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("main"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_removes_only_expired() {
        let cache = SchemaCache::new(Duration::from_secs(10));
        cache.set("old", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("new", 2);
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_reclaims_expired_entries() {
        let cache = Arc::new(SchemaCache::new(Duration::from_secs(5)));
        let shutdown = CancellationToken::new();
        let sweep = cache.spawn_cleanup(shutdown.clone());

        cache.set("main", 1);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());

        shutdown.cancel();
        sweep.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_stops_when_cache_is_dropped() {
        let cache = Arc::new(SchemaCache::<u32>::new(Duration::from_secs(1)));
        let sweep = cache.spawn_cleanup(CancellationToken::new());

        drop(cache);

        tokio::time::timeout(Duration::from_secs(5), sweep)
            .await
            .expect("sweep should stop once the cache is gone")
            .unwrap();
    }
}
