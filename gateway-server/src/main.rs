mod model;
mod repository;
mod resolvers;

use batch_loader::{LoaderConfig, RequestContext};
use repository::seed_registry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Instrument};
use tracing_subscriber::EnvFilter;

const DEMO_TOPICS: usize = 24;
const DEMO_LATENCY: Duration = Duration::from_millis(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting thesis gateway loader demo");

    // Load environment variables
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = LoaderConfig::from_env();
    info!(
        "Loader config: window={:?} max_batch={} ttl={:?} timeout={:?} backend={:?}",
        config.batch_window,
        config.max_batch_size,
        config.l2_ttl,
        config.fetch_timeout,
        config.cache_backend
    );

    let registry = Arc::new(seed_registry(config, DEMO_TOPICS, DEMO_LATENCY));

    // Two requests against the same registry: the second one is served from L2.
    for request in 1..=2 {
        let ctx = RequestContext::new()
            .with_request_id(format!("req-{request}"))
            .with_loaders(registry.clone());
        let ids = (0..DEMO_TOPICS).map(|n| format!("topic{n}")).collect();

        let span = ctx.span();
        let views = resolvers::resolve_topics(&ctx, ids).instrument(span).await;

        let failed = views.iter().filter(|view| view.is_error()).count();
        info!("Request req-{} resolved {} topic(s), {} failed", request, views.len(), failed);

        if request == 1 {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
    }

    log_stats(&registry);

    registry.shutdown();
    info!("Thesis gateway loader demo finished");
    Ok(())
}

fn log_stats(registry: &batch_loader::LoaderRegistry) {
    use model::{Council, Grade, Student, Teacher, Topic};
    use repository::InMemoryRepository;

    macro_rules! report {
        ($($entity:ty),*) => {
            $(
                if let Some(loader) = registry.get::<InMemoryRepository<$entity>>() {
                    let stats = loader.stats();
                    info!(
                        "{:<8} queries={} batches={} keys={} l2_hits={} l2_misses={} failures={}",
                        loader.name(),
                        loader.fetcher().queries(),
                        stats.batches,
                        stats.keys_fetched,
                        stats.cache_hits,
                        stats.cache_misses,
                        stats.fetch_failures
                    );
                }
            )*
        };
    }

    report!(Topic, Student, Teacher, Council, Grade);
}
