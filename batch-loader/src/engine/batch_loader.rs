use crate::domain::{Counters, FetchContext, LoaderStats};
use crate::engine::pending::{PendingBatch, ReadyBatch, deliver};
use crate::ports::Fetch;
use futures::future::join_all;
use parking_lot::Mutex;
use shared::config::LoaderConfig;
use shared::{LoadError, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use storage_engine::CacheStore;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

type Receiver<V> = oneshot::Receiver<Result<V>>;

/// Work decided while holding the pending-batch lock and carried out after it
/// is released.
enum Action<K, V> {
    Arm(u64),
    Dispatch(ReadyBatch<K, V>),
}

/// Batching, deduplicating loader for one entity type.
///
/// Concurrent `load` calls arriving within `batch_window` are merged into a
/// single call to the fetch adapter. Results are kept in the L2 cache for
/// `l2_ttl`. Cloning is cheap and every clone shares the same state.
pub struct BatchLoader<F: Fetch> {
    inner: Arc<Inner<F>>,
}

struct Inner<F: Fetch> {
    name: &'static str,
    fetcher: F,
    config: LoaderConfig,
    pending: Mutex<PendingBatch<F::Key, F::Value>>,
    cache: Option<Arc<dyn CacheStore<F::Key, F::Value>>>,
    /// Bumped by every `clear_cache*` call. A fetch that started in an older
    /// epoch must not write its results back to L2.
    invalidations: AtomicU64,
    counters: Counters,
}

impl<F: Fetch> Clone for BatchLoader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Fetch> BatchLoader<F> {
    pub fn new(fetcher: F, config: LoaderConfig) -> Self {
        Self::with_shutdown(fetcher, config, &CancellationToken::new())
    }

    /// Like [`BatchLoader::new`], with the L2 sweeper bound to `shutdown`.
    pub fn with_shutdown(fetcher: F, config: LoaderConfig, shutdown: &CancellationToken) -> Self {
        let name = fetcher.name();
        let cache = storage_engine::create_from_config(name, &config, shutdown);

        Self {
            inner: Arc::new(Inner {
                name,
                fetcher,
                config,
                pending: Mutex::new(PendingBatch::new()),
                cache,
                invalidations: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    pub fn stats(&self) -> LoaderStats {
        self.inner.counters.snapshot()
    }

    /// Load the value for a single key.
    ///
    /// A live L2 entry is returned without joining a batch. Otherwise the call
    /// waits until the batch it joined has been fetched.
    pub async fn load(&self, key: F::Key) -> Result<F::Value> {
        if let Some(value) = self.inner.cached(&key).await {
            return Ok(value);
        }

        let mut receivers = self.inner.enqueue(vec![key]);
        match receivers.pop() {
            Some(rx) => rx.await.unwrap_or(Err(LoadError::Dropped)),
            None => Err(LoadError::Dropped),
        }
    }

    /// Load many keys at once.
    ///
    /// The output is aligned with the input: element `i` is the result for
    /// `keys[i]`, and repeated keys get the same result at every position.
    pub async fn load_many<I>(&self, keys: I) -> Vec<Result<F::Value>>
    where
        I: IntoIterator<Item = F::Key>,
    {
        let keys: Vec<F::Key> = keys.into_iter().collect();
        let mut results: Vec<Option<Result<F::Value>>> = vec![None; keys.len()];

        // distinct key -> positions in the input
        let mut positions: HashMap<F::Key, Vec<usize>> = HashMap::new();
        let mut distinct = Vec::new();
        for (index, key) in keys.into_iter().enumerate() {
            match positions.entry(key) {
                Entry::Occupied(mut slot) => slot.get_mut().push(index),
                Entry::Vacant(slot) => {
                    distinct.push(slot.key().clone());
                    slot.insert(vec![index]);
                }
            }
        }

        let mut misses = Vec::new();
        for key in distinct {
            match self.inner.cached(&key).await {
                Some(value) => fill(&mut results, &positions[&key], Ok(value)),
                None => misses.push(key),
            }
        }

        if !misses.is_empty() {
            let receivers = self.inner.enqueue(misses.clone());
            let outcomes = join_all(
                receivers
                    .into_iter()
                    .map(|rx| async move { rx.await.unwrap_or(Err(LoadError::Dropped)) }),
            )
            .await;

            for (key, outcome) in misses.iter().zip(outcomes) {
                fill(&mut results, &positions[key], outcome);
            }
        }

        results
            .into_iter()
            .map(|result| result.unwrap_or(Err(LoadError::Dropped)))
            .collect()
    }

    /// Seed the L2 cache without fetching. No effect when the cache is disabled.
    pub async fn prime(&self, key: F::Key, value: F::Value) {
        if let Some(cache) = &self.inner.cache {
            cache.set(key, value).await;
        }
    }

    /// Drop every L2 entry. Batches already in flight still answer their
    /// callers but no longer populate the cache.
    pub async fn clear_cache(&self) {
        self.inner.invalidations.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = &self.inner.cache {
            cache.clear().await;
        }
    }

    pub async fn clear_cache_key(&self, key: &F::Key) {
        self.inner.invalidations.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = &self.inner.cache {
            cache.invalidate(key).await;
        }
    }

    /// Dispatch the pending batch now instead of waiting for its timer, and
    /// wait until its results have been delivered.
    pub async fn flush(&self) {
        let batch = self.inner.pending.lock().take();
        if batch.is_empty() {
            return;
        }

        let inner = self.inner.clone();
        if let Err(err) = tokio::spawn(async move { inner.execute(batch).await }).await {
            warn!("Loader '{}' flush task failed: {}", self.inner.name, err);
        }
    }

    /// Number of distinct keys waiting in the current batch.
    pub fn pending_keys(&self) -> usize {
        self.inner.pending.lock().key_count()
    }
}

impl<F: Fetch> Inner<F> {
    async fn cached(&self, key: &F::Key) -> Option<F::Value> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Some(value) => {
                trace!("Loader '{}' L2 hit for {:?}", self.name, key);
                self.counters.hit();
                Some(value)
            }
            None => {
                self.counters.miss();
                None
            }
        }
    }

    /// Register one waiter per key in the pending batch. `keys` must be distinct.
    fn enqueue(self: &Arc<Self>, keys: Vec<F::Key>) -> Vec<Receiver<F::Value>> {
        let mut receivers = Vec::with_capacity(keys.len());
        let mut actions = Vec::new();

        {
            let mut pending = self.pending.lock();
            for key in keys {
                let (tx, rx) = oneshot::channel();
                receivers.push(rx);

                if pending.register(key, tx) {
                    actions.push(Action::Arm(pending.generation()));
                }

                let max = self.config.max_batch_size;
                if max > 0 && pending.key_count() >= max {
                    actions.push(Action::Dispatch(pending.take()));
                }
            }
        }

        for action in actions {
            match action {
                Action::Arm(generation) => self.arm(generation),
                Action::Dispatch(batch) => {
                    let inner = self.clone();
                    tokio::spawn(async move { inner.execute(batch).await });
                }
            }
        }

        receivers
    }

    /// Start the flush timer for `generation`. If that batch was already taken
    /// by the time the timer fires, the timer does nothing.
    fn arm(self: &Arc<Self>, generation: u64) {
        let inner = self.clone();
        let window = self.config.batch_window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;

            let batch = {
                let mut pending = inner.pending.lock();
                if pending.generation() != generation {
                    return;
                }
                pending.take()
            };

            if !batch.is_empty() {
                inner.execute(batch).await;
            }
        });
    }

    /// Fetch every key of `batch` with one adapter call and hand the results
    /// to the waiters. Runs without holding any loader lock.
    async fn execute(&self, batch: ReadyBatch<F::Key, F::Value>) {
        let keys = batch.keys();
        let timeout = self.config.fetch_timeout;
        let ctx = FetchContext::new(self.name, batch.generation, timeout);
        let epoch = self.invalidations.load(Ordering::SeqCst);

        debug!(
            "Loader '{}' dispatching batch #{} with {} key(s)",
            self.name,
            batch.generation,
            keys.len()
        );
        self.counters.batch(keys.len());

        let fetch = self.fetcher.fetch(&ctx, &keys);
        let outcome = if timeout.is_zero() {
            fetch.await.map_err(LoadError::fetch)
        } else {
            match tokio::time::timeout(timeout, fetch).await {
                Ok(result) => result.map_err(LoadError::fetch),
                Err(_) => Err(LoadError::Timeout(timeout)),
            }
        };

        match outcome {
            Ok(mut values) => {
                for (key, waiters) in batch.waiters {
                    match values.remove(&key) {
                        Some(value) => {
                            self.store(epoch, key, value.clone()).await;
                            deliver(waiters, Ok(value));
                        }
                        None => deliver(waiters, Err(not_found(&key))),
                    }
                }
            }
            Err(err) => {
                warn!(
                    "Loader '{}' batch #{} failed for {} key(s): {}",
                    self.name,
                    batch.generation,
                    keys.len(),
                    err
                );
                self.counters.failure();
                for waiters in batch.waiters.into_values() {
                    deliver(waiters, Err(err.clone()));
                }
            }
        }
    }

    /// Write a fetched value to L2 unless the cache was invalidated after the
    /// fetch for it started.
    async fn store(&self, epoch: u64, key: F::Key, value: F::Value) {
        let Some(cache) = &self.cache else {
            return;
        };
        if self.invalidations.load(Ordering::SeqCst) != epoch {
            trace!("Loader '{}' skipping stale L2 write for {:?}", self.name, key);
            return;
        }

        cache.set(key.clone(), value).await;

        // an invalidation may have landed between the check and the write
        if self.invalidations.load(Ordering::SeqCst) != epoch {
            cache.invalidate(&key).await;
        }
    }
}

fn not_found<K: Debug>(key: &K) -> LoadError {
    LoadError::NotFound(format!("{key:?}"))
}

fn fill<V: Clone>(results: &mut [Option<Result<V>>], positions: &[usize], result: Result<V>) {
    for &position in positions {
        results[position] = Some(result.clone());
    }
}

impl<F: Fetch> Debug for BatchLoader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("cached", &self.inner.cache.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}
