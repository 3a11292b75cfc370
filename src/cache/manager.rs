use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use super::store::CacheStore;
use super::types::{
    precache_generation, runtime_generation,
    AssetRequest, CacheError, CacheKey, CachedResponse, ControlMessage,
};

/// How many manifest assets are fetched concurrently during install.
const INSTALL_CONCURRENCY: usize = 4;

/// Network access seam behind the cache.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    /// Performs the request against the network and returns the raw
    /// response. Transport-level failures map to `CacheError::Network`.
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse, CacheError>;
}

/// reqwest-backed fetcher used outside of tests.
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFetch for HttpFetch {
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse, CacheError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| CacheError::Network(format!("bad method {}: {}", request.method, e)))?;

        let mut builder = self.client.request(method, request.url.clone());
        if request.accepts_html {
            builder = builder.header(reqwest::header::ACCEPT, "text/html");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?
            .to_vec();

        Ok(CachedResponse {
            status,
            headers,
            body,
            stored_at: Utc::now().timestamp(),
        })
    }
}

/// Outcome counters of a precache install pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstallReport {
    /// Assets fetched and stored this pass
    pub cached: usize,
    /// Assets already present in the precache generation
    pub skipped: usize,
    /// Assets that could not be fetched or stored
    pub failed: usize,
}

/// Cache-first interception layer over every same-origin asset fetch.
///
/// The manager owns the generation lifecycle: `install` populates the
/// versioned precache generation from the manifest, `activate` deletes
/// every generation that no longer matches the active version, and the
/// steady-state `fetch` path opportunistically fills the runtime
/// generation. After one successful install the components behind it run
/// with no network dependency at all.
pub struct CacheManager {
    store: CacheStore,
    remote: Arc<dyn RemoteFetch>,
    origin: Url,
    shell: Url,
    manifest: Vec<String>,
    precache: String,
    runtime: String,
}

impl CacheManager {
    /// Creates a manager for the configured origin, version tag and
    /// manifest.
    pub fn new(config: &CacheConfig, remote: Arc<dyn RemoteFetch>) -> Result<Self, CacheError> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| CacheError::InvalidUrl(format!("{}: {}", config.origin, e)))?;
        let shell = origin
            .join(&config.shell)
            .map_err(|e| CacheError::InvalidUrl(format!("{}: {}", config.shell, e)))?;

        Ok(Self {
            store: CacheStore::new(config.directory.clone()),
            remote,
            origin,
            shell,
            manifest: config.manifest.clone(),
            precache: precache_generation(&config.version),
            runtime: runtime_generation(&config.version),
        })
    }

    /// Resolves a relative asset path against the configured origin.
    pub fn resolve(&self, path: &str) -> Result<Url, CacheError> {
        self.origin
            .join(path)
            .map_err(|e| CacheError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Serves a request cache-first.
    ///
    /// Cross-origin requests pass through untouched. Same-origin requests
    /// consult the precache generation, then the runtime generation, and
    /// only then the network; a success response is cloned into the
    /// runtime generation before being returned. On total network failure
    /// a navigation falls back to the cached shell page; anything else
    /// propagates the failure for this one request only.
    pub async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse, CacheError> {
        if !self.same_origin(&request.url) {
            return self.remote.fetch(request).await;
        }

        let key = CacheKey::new(&request.method, &request.url);
        if let Some(hit) = self.store.lookup(&[&self.precache, &self.runtime], &key)? {
            debug!("Serving from cache: {}", request.url.path());
            return Ok(hit);
        }

        debug!("Fetching from network: {}", request.url.path());
        match self.remote.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    // A failed store must not fail the request itself.
                    if let Err(e) = self.store.put(&self.runtime, &key, &response) {
                        warn!("Runtime cache store failed for {}: {}", request.url.path(), e);
                    }
                }
                Ok(response)
            }
            Err(err) => {
                if request.accepts_html {
                    let shell_key = CacheKey::new("GET", &self.shell);
                    if let Some(shell) =
                        self.store.lookup(&[&self.precache, &self.runtime], &shell_key)?
                    {
                        info!(
                            "Network unreachable, serving cached shell for {}",
                            request.url.path()
                        );
                        return Ok(shell);
                    }
                }
                Err(err)
            }
        }
    }

    /// Precaches the manifest into the versioned precache generation.
    ///
    /// Assets already present are skipped; per-asset failures are logged
    /// and counted but never abort the install — availability of the
    /// shell matters more than completeness.
    pub async fn install(&self) -> Result<InstallReport, CacheError> {
        info!("Precaching {} manifest assets into {}", self.manifest.len(), self.precache);

        let pb = ProgressBar::new(self.manifest.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} {bar:30} {pos}/{len} {wide_msg}")
                .unwrap()
        );

        let outcomes: Vec<Result<bool, CacheError>> =
            futures::stream::iter(self.manifest.iter().cloned())
                .map(|path| {
                    let pb = pb.clone();
                    async move {
                        let outcome = self.precache_asset(&path).await;
                        match &outcome {
                            Ok(true) => pb.set_message(format!("cached {}", path)),
                            Ok(false) => pb.set_message(format!("already present {}", path)),
                            Err(e) => {
                                pb.set_message(format!("failed {}", path));
                                warn!("Precache failed for {}: {}", path, e);
                            }
                        }
                        pb.inc(1);
                        outcome
                    }
                })
                .buffer_unordered(INSTALL_CONCURRENCY)
                .collect()
                .await;

        let mut report = InstallReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(true) => report.cached += 1,
                Ok(false) => report.skipped += 1,
                Err(_) => report.failed += 1,
            }
        }

        let status = format!(
            "Precache complete: {} cached, {} already present, {} failed",
            report.cached, report.skipped, report.failed
        );
        pb.finish_with_message(status.clone());
        info!("{}", status);
        Ok(report)
    }

    /// Fetches and stores one manifest asset. Returns false when the
    /// asset was already precached.
    async fn precache_asset(&self, path: &str) -> Result<bool, CacheError> {
        let url = self.resolve(path)?;
        let key = CacheKey::new("GET", &url);
        if self.store.get(&self.precache, &key)?.is_some() {
            return Ok(false);
        }
        let response = self.remote.fetch(&AssetRequest::get(url)).await?;
        if !response.ok() {
            return Err(CacheError::Http(response.status));
        }
        self.store.put(&self.precache, &key, &response)?;
        Ok(true)
    }

    /// Deletes every generation that does not match the active version.
    /// Takes effect for all fetches issued after it returns.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let removed = self.store.activate(&[&self.precache, &self.runtime])?;
        info!(
            "Cache activated: {} kept, {} superseded generation(s) deleted",
            self.precache, removed.len()
        );
        Ok(removed)
    }

    /// Deletes every generation, forcing a rebuild.
    pub fn clear(&self) -> Result<(), CacheError> {
        info!("Clearing all cache generations");
        self.store.clear_all()
    }

    /// Dispatches an external control message.
    pub fn handle(&self, message: ControlMessage) -> Result<(), CacheError> {
        match message {
            ControlMessage::ActivateNow => {
                self.activate()?;
                Ok(())
            }
            ControlMessage::ClearCache => self.clear(),
        }
    }

    /// Name of the active precache generation.
    pub fn precache_generation_name(&self) -> &str {
        &self.precache
    }

    /// Name of the active runtime generation.
    pub fn runtime_generation_name(&self) -> &str {
        &self.runtime
    }
}
