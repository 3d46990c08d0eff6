//! Batching and caching data access for GraphQL resolvers.
//!
//! Resolvers running concurrently within a request ask for single entities by
//! key. A [`BatchLoader`] merges those requests into one call to a [`Fetch`]
//! adapter per batch window, answers repeated keys from its L2 cache, and hands
//! every caller its own result. A [`LoaderRegistry`] keeps one loader per
//! entity type and travels with the request inside a [`RequestContext`].

pub mod context;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod registry;

pub use context::RequestContext;
pub use domain::{FetchContext, LoaderStats};
pub use engine::BatchLoader;
pub use ports::Fetch;
pub use registry::{LoaderRegistry, LoaderRegistryBuilder};
pub use shared::config::{CacheBackend, LoaderConfig};
pub use shared::{LoadError, Result};
