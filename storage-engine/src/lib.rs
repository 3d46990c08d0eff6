//! Secondary (L2) cache used by the batch loaders.

mod entry;
mod moka_cache;
pub mod ports;
mod ttl_cache;

pub use entry::CacheEntry;
pub use moka_cache::MokaCache;
pub use ports::CacheStore;
pub use ttl_cache::TtlCache;

use shared::config::{CacheBackend, LoaderConfig};
use std::hash::Hash;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Build the L2 store described by `config`, or `None` when the TTL is zero.
///
/// Sweeping caches are tied to `shutdown` so their background task ends with
/// the owner.
pub fn create_from_config<K, V>(
    name: &str,
    config: &LoaderConfig,
    shutdown: &CancellationToken,
) -> Option<Arc<dyn CacheStore<K, V>>>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    if !config.cache_enabled() {
        return None;
    }

    let store: Arc<dyn CacheStore<K, V>> = match config.cache_backend {
        CacheBackend::Sweeping => Arc::new(TtlCache::with_sweeper(
            config.l2_ttl,
            config.effective_sweep_interval(),
            shutdown,
        )),
        CacheBackend::Moka => Arc::new(MokaCache::new(name, None, config.l2_ttl)),
    };

    Some(store)
}
