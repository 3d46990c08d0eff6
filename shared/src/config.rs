use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::ConfigError;

/// Storage used for the secondary (L2) cache of a loader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheBackend {
    /// Hash map behind a read/write lock, expired entries removed by a background sweeper.
    #[default]
    Sweeping,
    /// moka cache with a time-to-live policy.
    Moka,
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sweeping" | "ttl" => Ok(CacheBackend::Sweeping),
            "moka" => Ok(CacheBackend::Moka),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Per-loader configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// How long a pending batch collects keys before it is dispatched.
    pub batch_window: Duration,
    /// Dispatch as soon as this many distinct keys are pending. 0 = unlimited.
    pub max_batch_size: usize,
    /// Lifetime of an L2 entry. Zero disables the L2 cache.
    pub l2_ttl: Duration,
    /// Upper bound for a single call into the fetch adapter.
    pub fetch_timeout: Duration,
    /// Sweeper period, `None` means half the TTL.
    pub sweep_interval: Option<Duration>,
    pub cache_backend: CacheBackend,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_window: Duration::from_millis(Self::DEFAULT_BATCH_WINDOW_MS),
            max_batch_size: 0,
            l2_ttl: Duration::from_millis(Self::DEFAULT_L2_TTL_MS),
            fetch_timeout: Duration::from_millis(Self::DEFAULT_FETCH_TIMEOUT_MS),
            sweep_interval: None,
            cache_backend: CacheBackend::default(),
        }
    }
}

impl LoaderConfig {
    const DEFAULT_BATCH_WINDOW_MS: u64 = 2;
    const DEFAULT_L2_TTL_MS: u64 = 30_000;
    const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
    const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Missing variables keep
    /// their default, unparsable ones are reported and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let batch_window = read_number(&lookup, "GATEWAY_BATCH_WINDOW_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.batch_window);
        let max_batch_size = read_number(&lookup, "GATEWAY_MAX_BATCH_SIZE")
            .map(|n| n as usize)
            .unwrap_or(defaults.max_batch_size);
        let l2_ttl = read_number(&lookup, "GATEWAY_L2_TTL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.l2_ttl);
        let fetch_timeout = read_number(&lookup, "GATEWAY_FETCH_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.fetch_timeout);
        let sweep_interval = read_number(&lookup, "GATEWAY_SWEEP_INTERVAL_MS").map(Duration::from_millis);
        let cache_backend = match lookup("GATEWAY_CACHE_BACKEND") {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!("{err}, falling back to {:?}", defaults.cache_backend);
                defaults.cache_backend
            }),
            None => defaults.cache_backend,
        };

        Self {
            batch_window,
            max_batch_size,
            l2_ttl,
            fetch_timeout,
            sweep_interval,
            cache_backend,
        }
    }

    #[must_use]
    pub fn batch_window(self, batch_window: Duration) -> Self {
        Self { batch_window, ..self }
    }

    #[must_use]
    pub fn max_batch_size(self, max_batch_size: usize) -> Self {
        Self { max_batch_size, ..self }
    }

    #[must_use]
    pub fn l2_ttl(self, l2_ttl: Duration) -> Self {
        Self { l2_ttl, ..self }
    }

    #[must_use]
    pub fn fetch_timeout(self, fetch_timeout: Duration) -> Self {
        Self { fetch_timeout, ..self }
    }

    #[must_use]
    pub fn sweep_interval(self, sweep_interval: Duration) -> Self {
        Self {
            sweep_interval: Some(sweep_interval),
            ..self
        }
    }

    #[must_use]
    pub fn cache_backend(self, cache_backend: CacheBackend) -> Self {
        Self { cache_backend, ..self }
    }

    pub fn cache_enabled(&self) -> bool {
        !self.l2_ttl.is_zero()
    }

    pub fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval
            .unwrap_or(self.l2_ttl / 2)
            .max(Self::MIN_SWEEP_INTERVAL)
    }
}

fn read_number(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Option<u64> {
    let raw = lookup(var)?;
    match raw.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(
                "{}, using default",
                ConfigError::InvalidNumber {
                    var,
                    value: raw.clone()
                }
            );
            None
        }
    }
}
