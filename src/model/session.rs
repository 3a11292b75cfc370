use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::cache::{AssetRequest, CacheError, CacheManager};
use super::runtime::{InferenceRuntime, InferenceSession, RuntimeLoader};
use super::types::{ExecutionConfig, SessionError};
use super::validate::validate_model_bytes;

/// Owns the once-only lifecycle of the inference runtime, the raw model
/// bytes and the single reusable session.
///
/// Every stage lives in a write-once cell: concurrent callers await the
/// same in-flight initialization instead of triggering a second
/// fetch/instantiate, and a failed attempt leaves the cell empty so the
/// next call retries. Nothing is evicted before process teardown.
pub struct SessionManager {
    loader: Arc<dyn RuntimeLoader>,
    cache: Arc<CacheManager>,
    model_path: String,
    exec: ExecutionConfig,
    runtime: OnceCell<Arc<dyn InferenceRuntime>>,
    model_bytes: OnceCell<Arc<Vec<u8>>>,
    session: OnceCell<Arc<dyn InferenceSession>>,
}

impl SessionManager {
    /// Creates a manager; nothing is loaded until `ensure_session`.
    pub fn new(
        loader: Arc<dyn RuntimeLoader>,
        cache: Arc<CacheManager>,
        model_path: String,
        exec: ExecutionConfig,
    ) -> Self {
        Self {
            loader,
            cache,
            model_path,
            exec,
            runtime: OnceCell::new(),
            model_bytes: OnceCell::new(),
            session: OnceCell::new(),
        }
    }

    /// Returns the ready-to-run session, creating it on first call.
    ///
    /// Idempotent and concurrency-safe: later callers await the in-flight
    /// creation rather than starting another one.
    pub async fn ensure_session(&self) -> Result<Arc<dyn InferenceSession>, SessionError> {
        self.session
            .get_or_try_init(|| async {
                let runtime = self.ensure_runtime().await?;
                let bytes = self.ensure_model_bytes().await?;
                info!(
                    "Creating inference session from {} model bytes via {}",
                    bytes.len(),
                    runtime.name()
                );
                runtime.create_session(&bytes).await
            })
            .await
            .map(Arc::clone)
    }

    /// Whether a session has already been created.
    pub fn has_session(&self) -> bool {
        self.session.initialized()
    }

    /// The execution configuration applied to the runtime.
    pub fn execution(&self) -> &ExecutionConfig {
        &self.exec
    }

    /// Loads the runtime at most once.
    async fn ensure_runtime(&self) -> Result<Arc<dyn InferenceRuntime>, SessionError> {
        self.runtime
            .get_or_try_init(|| async { self.loader.load(&self.exec).await })
            .await
            .map(Arc::clone)
    }

    /// Fetches raw model bytes through the cache layer at most once,
    /// validating them before they are trusted. Once the model is in the
    /// cache this path is fully offline.
    async fn ensure_model_bytes(&self) -> Result<Arc<Vec<u8>>, SessionError> {
        self.model_bytes
            .get_or_try_init(|| async {
                let url = self.cache.resolve(&self.model_path).map_err(SessionError::Asset)?;
                let response = self
                    .cache
                    .fetch(&AssetRequest::get(url))
                    .await
                    .map_err(|e| self.classify_fetch_error(e))?;
                if !response.ok() {
                    return Err(SessionError::Http(response.status));
                }
                validate_model_bytes(&response.body)?;
                Ok(Arc::new(response.body))
            })
            .await
            .map(Arc::clone)
    }

    /// A network-layer failure while no session exists yet is the
    /// distinct "requires network for first initialization" condition;
    /// anything else stays a plain asset failure.
    fn classify_fetch_error(&self, err: CacheError) -> SessionError {
        match err {
            CacheError::Network(_) if !self.has_session() => SessionError::NetworkRequired,
            other => SessionError::Asset(other),
        }
    }
}
