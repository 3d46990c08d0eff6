use crate::ports::CacheStore;
use async_trait::async_trait;
use moka::future::Cache;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

/// Moka-based L2 cache.
/// Expiry and eviction are handled by moka's own housekeeping, so no sweeper is needed.
pub struct MokaCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<K, V>,
}

impl<K, V> MokaCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a Moka cache from name, optional capacity and TTL
    pub fn new(name: &str, max_entries: Option<u64>, ttl: Duration) -> Self {
        let mut builder = Cache::builder().name(name).time_to_live(ttl);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
        }
    }

    /// Flush moka's pending housekeeping so that `entry_count` is exact.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl<K, V> CacheStore<K, V> for MokaCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        // moka never returns entries past their time-to-live
        self.cache.get(key).await
    }

    async fn set(&self, key: K, value: V) {
        self.cache.insert(key, value).await;
    }

    async fn invalidate(&self, key: &K) {
        self.cache.invalidate(key).await;
    }

    async fn clear(&self) {
        self.cache.invalidate_all();
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl<K, V> Debug for MokaCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
