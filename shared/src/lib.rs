// shared/src/lib.rs

use std::sync::Arc;
use std::time::Duration;

/// Error delivered to a caller of `load`/`load_many`.
///
/// Cloneable so that a single failure can be handed to every waiter of a batch.
#[derive(thiserror::Error, Debug, Clone)]
pub enum LoadError {
    #[error("key not found in batch result: {0}")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Fetch(Arc<anyhow::Error>),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("batch dropped before a result was delivered")]
    Dropped,
    #[error("no loader registered for {0}")]
    LoaderNotRegistered(&'static str),
}

impl LoadError {
    pub fn fetch(err: anyhow::Error) -> Self {
        LoadError::Fetch(Arc::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound(_))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("unknown cache backend '{0}', expected 'sweeping' or 'moka'")]
    UnknownBackend(String),
}

pub type Result<T> = std::result::Result<T, LoadError>;

pub mod config;
