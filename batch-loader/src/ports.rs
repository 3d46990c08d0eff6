#![deny(clippy::all)]

use crate::domain::FetchContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Port for bulk retrieval of one entity type (a repository, a remote service, ...).
///
/// `keys` never contains duplicates and carries no meaningful order. The
/// returned map holds every key that could be resolved; keys that do not exist
/// are simply omitted. An `Err` means the whole call failed.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    type Key: Debug + Hash + Eq + Clone + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;

    async fn fetch(
        &self,
        ctx: &FetchContext,
        keys: &[Self::Key],
    ) -> anyhow::Result<HashMap<Self::Key, Self::Value>>;

    /// Name used for the loader's logs and L2 cache.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
