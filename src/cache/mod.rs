//! Offline cache for the application shell.
//!
//! [`CacheWorker`] installs the boot assets into a bucket named after the
//! current version tag, deletes every other bucket on activation, and from
//! then on answers GET requests from the cache while refreshing entries in
//! the background (stale-while-revalidate).

mod fetch;
mod storage;

pub use fetch::{is_navigation, Fetcher, HttpFetcher, ShellRequest};
pub use storage::{AssetResponse, Bucket, CacheStorage};

use crate::errors::CacheError;
use axum::http::Method;
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_CACHE_VERSION: &str = "aura-v1-cache";

pub const DEFAULT_SHELL_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/index.js",
    "/app.css",
    "/manifest.json",
    "https://fonts.googleapis.com/css2?family=Plus+Jakarta+Sans:wght@300;400;500;600;700;800&display=swap",
];

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Bucket name; bumping it supersedes every older bucket.
    pub version: String,
    /// Where the shell is served from when the network is up.
    pub origin: Url,
    /// Boot assets, relative to `origin` or absolute.
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

pub struct CacheWorker {
    config: CacheConfig,
    caches: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<WorkerState>,
}

impl CacheWorker {
    pub fn new(config: CacheConfig, caches: Arc<CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            caches,
            fetcher,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Startup entry point. A bucket for the current version means this
    /// version was installed on an earlier run, so only activation is needed.
    pub async fn register(&self) -> WorkerState {
        if self.caches.has(&self.config.version).await {
            info!(version = %self.config.version, "cache already installed");
        } else if let Err(err) = self.install().await {
            warn!(version = %self.config.version, error = %err, "cache install failed");
            return self.state().await;
        }

        if let Err(err) = self.activate().await {
            warn!(version = %self.config.version, error = %err, "cache activation failed");
        }
        self.state().await
    }

    /// Fetches every boot asset, then stores them together. Any failure
    /// leaves the cache untouched.
    pub async fn install(&self) -> Result<(), CacheError> {
        self.set_state(WorkerState::Installing).await;

        let mut batch = Vec::with_capacity(self.config.assets.len());
        for asset in &self.config.assets {
            match self.fetch_asset(asset).await {
                Ok(entry) => batch.push(entry),
                Err(err) => {
                    self.set_state(WorkerState::Redundant).await;
                    return Err(err);
                }
            }
        }

        let bucket = self.caches.open(&self.config.version).await;
        if let Err(err) = bucket.put_all(batch).await {
            if let Err(cleanup) = self.caches.delete(&self.config.version).await {
                warn!(error = %cleanup, "failed to drop partially installed bucket");
            }
            self.set_state(WorkerState::Redundant).await;
            return Err(err);
        }

        let assets = bucket.entry_count().await;
        info!(version = %self.config.version, assets, "app shell cached");
        self.set_state(WorkerState::Installed).await;
        Ok(())
    }

    async fn fetch_asset(&self, asset: &str) -> Result<(String, AssetResponse), CacheError> {
        let url = self.resolve(asset)?;
        let response = self.fetcher.fetch(&ShellRequest::get(url.clone())).await?;
        if response.status != 200 {
            return Err(CacheError::NetworkUnavailable(format!(
                "{url} answered {}",
                response.status
            )));
        }
        Ok((url, response))
    }

    /// Deletes every bucket but the current one and takes control of requests.
    pub async fn activate(&self) -> Result<(), CacheError> {
        self.set_state(WorkerState::Activating).await;
        for name in self.caches.keys().await {
            if name != self.config.version {
                info!(bucket = %name, "clearing old cache");
                self.caches.delete(&name).await?;
            }
        }
        self.set_state(WorkerState::Activated).await;
        Ok(())
    }

    pub async fn is_controlling(&self) -> bool {
        self.state().await == WorkerState::Activated
    }

    /// Turns a path (or absolute URL) into the absolute URL used as cache key.
    pub fn resolve(&self, path: &str) -> Result<String, CacheError> {
        self.config
            .origin
            .join(path)
            .map(String::from)
            .map_err(|err| CacheError::NetworkUnavailable(format!("bad url {path}: {err}")))
    }

    /// Resolves an incoming request target. Only origin-relative paths that
    /// stay on the shell origin are accepted; `//host/..` and absolute
    /// targets yield `None`.
    pub fn resolve_same_origin(&self, target: &str) -> Option<String> {
        if !target.starts_with('/') || target.starts_with("//") {
            return None;
        }
        let url = self.config.origin.join(target).ok()?;
        (url.origin() == self.config.origin.origin()).then(|| String::from(url))
    }

    pub async fn handle_fetch(&self, request: ShellRequest) -> Result<AssetResponse, CacheError> {
        if request.method != Method::GET || !self.is_controlling().await {
            return self.fetcher.fetch(&request).await;
        }

        let bucket = self.caches.open(&self.config.version).await;
        if let Some(cached) = bucket.get(&request.url).await {
            self.spawn_refresh(request);
            return Ok(cached);
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.status == 200 {
                    if let Err(err) = bucket.put(&request.url, response.clone()).await {
                        warn!(url = %request.url, error = %err, "failed to cache response");
                    }
                }
                Ok(response)
            }
            Err(err) if request.navigate => {
                let root = self.resolve("/")?;
                match bucket.get(&root).await {
                    Some(shell) => {
                        debug!(url = %request.url, "offline, serving cached shell");
                        Ok(shell)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Detached refresh of a cache hit; its failure is logged and dropped.
    fn spawn_refresh(&self, request: ShellRequest) {
        let caches = Arc::clone(&self.caches);
        let fetcher = Arc::clone(&self.fetcher);
        let version = self.config.version.clone();

        tokio::spawn(async move {
            let result = async {
                let response = fetcher.fetch(&request).await?;
                if response.status == 200 {
                    caches.open(&version).await.put(&request.url, response).await?;
                }
                Ok::<_, CacheError>(())
            }
            .await;

            if let Err(err) = result {
                debug!(url = %request.url, error = %err, "background refresh failed");
            }
        });
    }
}
