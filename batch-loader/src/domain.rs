use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Context handed to the fetch adapter for one batch.
///
/// It is created per batch rather than borrowed from any one caller, so a
/// caller that goes away cannot cut short the fetch for the keys it shares
/// with others.
#[derive(Clone, Debug)]
pub struct FetchContext {
    pub loader: &'static str,
    pub generation: u64,
    pub deadline: Option<Instant>,
}

impl FetchContext {
    pub fn new(loader: &'static str, generation: u64, timeout: Duration) -> Self {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        Self {
            loader,
            generation,
            deadline,
        }
    }

    /// Time left before the engine gives up on this fetch.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Point-in-time snapshot of a loader's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub batches: u64,
    pub keys_fetched: u64,
    pub fetch_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    batches: AtomicU64,
    keys_fetched: AtomicU64,
    fetch_failures: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn batch(&self, keys: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.keys_fetched.fetch_add(keys as u64, Ordering::Relaxed);
    }

    pub(crate) fn failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LoaderStats {
        LoaderStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            keys_fetched: self.keys_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fetch_context_deadline() {
        let ctx = FetchContext::new("students", 3, Duration::from_secs(2));
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_zero_timeout_means_no_deadline() {
        let ctx = FetchContext::new("students", 0, Duration::ZERO);
        assert!(ctx.deadline.is_none());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.hit();
        counters.miss();
        counters.miss();
        counters.batch(5);
        counters.failure();

        assert_eq!(
            counters.snapshot(),
            LoaderStats {
                cache_hits: 1,
                cache_misses: 2,
                batches: 1,
                keys_fetched: 5,
                fetch_failures: 1,
            }
        );
    }
}
