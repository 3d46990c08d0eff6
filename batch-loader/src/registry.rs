use crate::engine::BatchLoader;
use crate::ports::Fetch;
use shared::config::LoaderConfig;
use shared::{LoadError, Result};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One [`BatchLoader`] per fetch adapter type.
///
/// The registry holds no per-request state: its loaders and their L2 caches
/// are shared by every request it is attached to. Dropping the registry, or
/// calling [`LoaderRegistry::shutdown`], stops the background cache sweepers.
pub struct LoaderRegistry {
    loaders: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    names: Vec<&'static str>,
    shutdown: CancellationToken,
}

pub struct LoaderRegistryBuilder {
    config: LoaderConfig,
    registry: LoaderRegistry,
}

impl LoaderRegistryBuilder {
    /// Add a loader for `fetcher` using the registry's default configuration.
    #[must_use]
    pub fn register<F: Fetch>(self, fetcher: F) -> Self {
        let config = self.config.clone();
        self.register_with(fetcher, config)
    }

    /// Add a loader for `fetcher` with its own configuration.
    /// Registering the same adapter type twice replaces the earlier loader.
    #[must_use]
    pub fn register_with<F: Fetch>(mut self, fetcher: F, config: LoaderConfig) -> Self {
        let loader = BatchLoader::with_shutdown(fetcher, config, &self.registry.shutdown);
        debug!("Registered loader '{}'", loader.name());

        let name = loader.name();
        if self
            .registry
            .loaders
            .insert(TypeId::of::<F>(), Box::new(loader))
            .is_none()
        {
            self.registry.names.push(name);
        } else {
            warn!("Loader '{}' registered twice, keeping the latest", name);
        }
        self
    }

    pub fn build(self) -> LoaderRegistry {
        info!(
            "Loader registry ready with {} loader(s): {}",
            self.registry.names.len(),
            self.registry.names.join(", ")
        );
        self.registry
    }
}

impl LoaderRegistry {
    pub fn builder(config: LoaderConfig) -> LoaderRegistryBuilder {
        LoaderRegistryBuilder {
            config,
            registry: LoaderRegistry {
                loaders: HashMap::new(),
                names: Vec::new(),
                shutdown: CancellationToken::new(),
            },
        }
    }

    /// The loader bound to adapter type `F`, if one was registered.
    pub fn get<F: Fetch>(&self) -> Option<BatchLoader<F>> {
        self.loaders
            .get(&TypeId::of::<F>())
            .and_then(|loader| loader.downcast_ref::<BatchLoader<F>>())
            .cloned()
    }

    pub fn loader<F: Fetch>(&self) -> Result<BatchLoader<F>> {
        self.get::<F>()
            .ok_or(LoadError::LoaderNotRegistered(type_name::<F>()))
    }

    pub async fn load<F: Fetch>(&self, key: F::Key) -> Result<F::Value> {
        self.loader::<F>()?.load(key).await
    }

    /// Positionally aligned results for `keys`; every position fails when no
    /// loader is registered for `F`.
    pub async fn load_many<F, I>(&self, keys: I) -> Vec<Result<F::Value>>
    where
        F: Fetch,
        I: IntoIterator<Item = F::Key>,
    {
        match self.loader::<F>() {
            Ok(loader) => loader.load_many(keys).await,
            Err(err) => keys.into_iter().map(|_| Err(err.clone())).collect(),
        }
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Stop every background sweeper. Loaders keep working with lazy expiry.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutting down loader registry");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for LoaderRegistry {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("loaders", &self.names)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
