use shared::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use tokio::sync::oneshot;

pub(crate) type Waiter<V> = oneshot::Sender<Result<V>>;

/// Keys collected during the current batch window, each with the callers
/// waiting for it.
pub(crate) struct PendingBatch<K, V> {
    waiters: HashMap<K, Vec<Waiter<V>>>,
    generation: u64,
}

impl<K, V> PendingBatch<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            waiters: HashMap::new(),
            generation: 0,
        }
    }

    /// Adds a waiter for `key`. Returns true when the batch was empty before,
    /// i.e. when a flush timer has to be armed for it.
    pub(crate) fn register(&mut self, key: K, waiter: Waiter<V>) -> bool {
        let was_empty = self.waiters.is_empty();
        self.waiters.entry(key).or_default().push(waiter);
        was_empty
    }

    pub(crate) fn key_count(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Swaps the collected waiters out and starts the next generation.
    pub(crate) fn take(&mut self) -> ReadyBatch<K, V> {
        let generation = self.generation;
        self.generation = self.generation.wrapping_add(1);
        ReadyBatch {
            generation,
            waiters: mem::take(&mut self.waiters),
        }
    }
}

/// A batch that left the pending state and is about to be fetched.
pub(crate) struct ReadyBatch<K, V> {
    pub(crate) generation: u64,
    pub(crate) waiters: HashMap<K, Vec<Waiter<V>>>,
}

impl<K, V> ReadyBatch<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn keys(&self) -> Vec<K> {
        self.waiters.keys().cloned().collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Sends `result` to every waiter. Callers that stopped waiting are skipped.
pub(crate) fn deliver<V: Clone>(waiters: Vec<Waiter<V>>, result: Result<V>) {
    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}
