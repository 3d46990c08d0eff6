use std::time::Duration;
use tokio::time::Instant;

/// A cached value together with the instant it stops being valid.
///
/// Entries are never mutated; a newer value replaces the whole entry.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self::expiring_at(value, Instant::now() + ttl)
    }

    pub fn expiring_at(value: V, expires_at: Instant) -> Self {
        Self { value, expires_at }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let entry = CacheEntry::new("thesis", Duration::from_secs(1));
        assert!(!entry.is_expired());
        assert_eq!(*entry.value(), "thesis");

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_absolute() {
        let now = Instant::now();
        let entry = CacheEntry::expiring_at(1u32, now + Duration::from_secs(5));
        assert_eq!(entry.expires_at(), now + Duration::from_secs(5));
        assert!(entry.is_expired_at(now + Duration::from_secs(5)));
        assert!(!entry.is_expired_at(now + Duration::from_secs(4)));
    }
}
