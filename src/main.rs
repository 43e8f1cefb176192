use aura_habits::cache::{CacheStorage, CacheWorker, HttpFetcher};
use aura_habits::config::ShellConfig;
use aura_habits::{open_provider, router, seed, AppState, Config};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const SHELL_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;

    let storage = open_provider(&config.storage).await?;
    if config.seed_defaults {
        if let Err(err) = seed::seed_if_empty(storage.as_ref()).await {
            warn!("seeding failed: {err}");
        }
    }

    let cache = match &config.shell {
        Some(shell) => Some(start_cache_worker(shell).await?),
        None => None,
    };

    let app = router(AppState::new(Arc::clone(&storage), cache));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.close().await;
    Ok(())
}

/// Builds the worker and registers it in the background so an offline
/// install never delays startup.
async fn start_cache_worker(
    shell: &ShellConfig,
) -> Result<Arc<CacheWorker>, Box<dyn std::error::Error>> {
    let caches = match &shell.cache_dir {
        Some(dir) => CacheStorage::open_dir(dir).await?,
        None => CacheStorage::in_memory(),
    };
    let fetcher = HttpFetcher::new(SHELL_FETCH_TIMEOUT)?;
    let worker = Arc::new(CacheWorker::new(
        shell.cache.clone(),
        Arc::new(caches),
        Arc::new(fetcher),
    ));

    let registering = Arc::clone(&worker);
    tokio::spawn(async move {
        let state = registering.register().await;
        info!(?state, "cache worker registered");
    });

    Ok(worker)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
