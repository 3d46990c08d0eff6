use async_trait::async_trait;

// Ports are the pluggable extension points for the secondary cache

/// Port for the secondary (L2) cache sitting in front of a fetch adapter.
///
/// Implementations are shared across requests and must tolerate concurrent
/// access from unrelated tasks.
#[async_trait]
pub trait CacheStore<K, V>: Send + Sync + 'static {
    /// Returns the value if present and not expired.
    async fn get(&self, key: &K) -> Option<V>;

    /// Stores `value` with a fresh expiry, replacing any previous entry.
    async fn set(&self, key: K, value: V);

    async fn invalidate(&self, key: &K);

    async fn clear(&self);

    /// Number of physically stored entries, expired ones included until swept.
    fn entry_count(&self) -> u64;
}
