use crate::entry::CacheEntry;
use crate::ports::CacheStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Entries<K, V> = RwLock<HashMap<K, CacheEntry<V>>>;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// TTL cache backed by a `HashMap` behind a read/write lock.
///
/// Reads take the shared lock and report expired entries as misses without
/// removing them. Physical removal is left to [`TtlCache::sweep`], which the
/// background sweeper calls periodically.
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    entries: Arc<Entries<K, V>>,
    ttl: Duration,
    shutdown: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache without a background sweeper (lazy expiry only).
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            shutdown: CancellationToken::new(),
            sweeper: None,
        }
    }

    /// Create a cache whose expired entries are removed every `interval`
    /// (at least every millisecond).
    ///
    /// The sweeper stops when `shutdown` is cancelled or the cache is dropped.
    /// Outside a tokio runtime no sweeper is started.
    pub fn with_sweeper(ttl: Duration, interval: Duration, shutdown: &CancellationToken) -> Self {
        let mut cache = Self::new(ttl);
        cache.shutdown = shutdown.child_token();
        cache.sweeper = spawn_sweeper(
            Arc::downgrade(&cache.entries),
            interval,
            cache.shutdown.clone(),
        );
        cache
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        sweep_expired(&self.entries, Instant::now())
    }

    /// True once the background sweeper has exited (or was never started).
    pub fn sweeper_stopped(&self) -> bool {
        self.sweeper
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

impl<K, V> Drop for TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn sweep_expired<K, V>(entries: &Entries<K, V>, now: Instant) -> usize
where
    K: Hash + Eq,
{
    let mut entries = entries.write();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired_at(now));
    before - entries.len()
}

fn spawn_sweeper<K, V>(
    entries: Weak<Entries<K, V>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("No tokio runtime available, L2 cache entries will only expire lazily");
        return None;
    };

    let handle = runtime.spawn(async move {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(entries) = entries.upgrade() else {
                        break;
                    };
                    let removed = sweep_expired(&entries, Instant::now());
                    if removed > 0 {
                        debug!("Swept {} expired L2 entries", removed);
                    }
                }
            }
        }

        debug!("L2 sweeper stopped");
    });

    Some(handle)
}

#[async_trait]
impl<K, V> CacheStore<K, V> for TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value().clone())
    }

    async fn set(&self, key: K, value: V) {
        let entry = CacheEntry::new(value, self.ttl);
        self.entries.write().insert(key, entry);
    }

    async fn invalidate(&self, key: &K) {
        self.entries.write().remove(key);
    }

    async fn clear(&self) {
        self.entries.write().clear();
    }

    fn entry_count(&self) -> u64 {
        self.entries.read().len() as u64
    }
}

impl<K, V> Debug for TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("entry_count", &self.entries.read().len())
            .field("sweeping", &!self.sweeper_stopped())
            .finish()
    }
}
