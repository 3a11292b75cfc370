use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::ArrayView4;

use iris::cache::{AssetRequest, CacheError, CacheManager, CachedResponse, RemoteFetch};
use iris::config::CacheConfig;
use iris::model::{
    EnvCapabilities, ExecutionConfig, InferenceRuntime, InferenceSession, RuntimeLoader,
    SessionError, SessionManager, MIN_MODEL_BYTES,
};

const MODEL_PATH: &str = "models/net.onnx";
const MODEL_URL: &str = "http://localhost:8080/models/net.onnx";

struct StubRemote {
    responses: Mutex<HashMap<String, CachedResponse>>,
    hits: AtomicUsize,
    offline: AtomicBool,
}

impl StubRemote {
    fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    fn insert(&self, url: &str, response: CachedResponse) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }
}

#[async_trait]
impl RemoteFetch for StubRemote {
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse, CacheError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Network("offline".to_string()));
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses.get(request.url.as_str()).cloned().unwrap_or(CachedResponse {
            status: 404,
            headers: Vec::new(),
            body: Vec::new(),
            stored_at: 0,
        }))
    }
}

fn ok_response(body: Vec<u8>) -> CachedResponse {
    CachedResponse { status: 200, headers: Vec::new(), body, stored_at: 0 }
}

fn model_bytes() -> Vec<u8> {
    vec![0x08u8; 2 * MIN_MODEL_BYTES]
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("iris-session-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn cache_at(dir: &Path, remote: Arc<StubRemote>) -> Arc<CacheManager> {
    let config = CacheConfig {
        directory: dir.to_path_buf(),
        version: "v1".to_string(),
        origin: "http://localhost:8080".to_string(),
        shell: "index.html".to_string(),
        manifest: Vec::new(),
    };
    Arc::new(CacheManager::new(&config, remote).unwrap())
}

/// Runtime stub that records how many sessions it has created.
struct CountingRuntime {
    created: Arc<AtomicUsize>,
}

#[async_trait]
impl InferenceRuntime for CountingRuntime {
    fn name(&self) -> &str {
        "counting"
    }

    async fn create_session(
        &self,
        _model_bytes: &[u8],
    ) -> Result<Arc<dyn InferenceSession>, SessionError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StaticSession::new(vec![0.0; 8])))
    }
}

struct CountingLoader {
    created: Arc<AtomicUsize>,
}

#[async_trait]
impl RuntimeLoader for CountingLoader {
    async fn load(
        &self,
        _exec: &ExecutionConfig,
    ) -> Result<Arc<dyn InferenceRuntime>, SessionError> {
        Ok(Arc::new(CountingRuntime { created: self.created.clone() }))
    }
}

#[derive(Debug)]
struct StaticSession {
    inputs: Vec<String>,
    outputs: Vec<String>,
    dims: Vec<i64>,
    scores: Vec<f32>,
}

impl StaticSession {
    fn new(scores: Vec<f32>) -> Self {
        Self {
            inputs: vec!["input".to_string()],
            outputs: vec!["scores".to_string()],
            dims: vec![1, 3, 224, 224],
            scores,
        }
    }
}

#[async_trait]
impl InferenceSession for StaticSession {
    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }

    fn input_shape(&self, name: &str) -> Option<&[i64]> {
        (name == "input").then_some(self.dims.as_slice())
    }

    async fn run(
        &self,
        _input_name: &str,
        _input: ArrayView4<'_, f32>,
    ) -> Result<Vec<f32>, SessionError> {
        Ok(self.scores.clone())
    }
}

fn session_manager(cache: Arc<CacheManager>) -> (Arc<AtomicUsize>, SessionManager) {
    let created = Arc::new(AtomicUsize::new(0));
    let loader = Arc::new(CountingLoader { created: created.clone() });
    let exec = ExecutionConfig::for_env(&EnvCapabilities {
        shared_memory: false,
        hardware_concurrency: 4,
    });
    let manager = SessionManager::new(loader, cache, MODEL_PATH.to_string(), exec);
    (created, manager)
}

#[tokio::test]
async fn first_offline_init_is_network_required() {
    let dir = temp_dir("offline-first");
    let remote = Arc::new(StubRemote::new());
    remote.offline.store(true, Ordering::SeqCst);
    let (_, manager) = session_manager(cache_at(&dir, remote));

    let err = manager.ensure_session().await.unwrap_err();
    assert!(matches!(err, SessionError::NetworkRequired));
    assert!(!manager.has_session());
}

#[tokio::test]
async fn invalid_payload_fails_the_attempt_but_retries() {
    let dir = temp_dir("retry");
    let remote = Arc::new(StubRemote::new());
    // First answer: an HTML error page where the model should be.
    let mut page = b"<html><head><title>404</title>".to_vec();
    page.resize(2 * MIN_MODEL_BYTES, b' ');
    remote.insert(MODEL_URL, ok_response(page));
    let (_, manager) = session_manager(cache_at(&dir, remote.clone()));

    let err = manager.ensure_session().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidPayload(_)));

    // The bad payload was cached by the fetch layer under this URL, so
    // swap the cache out from under it the way a fixed server would: a
    // fresh version directory.
    let dir2 = temp_dir("retry-second");
    remote.insert(MODEL_URL, ok_response(model_bytes()));
    let (_, manager) = session_manager(cache_at(&dir2, remote));
    manager.ensure_session().await.unwrap();
    assert!(manager.has_session());
}

#[tokio::test]
async fn undersized_payload_is_rejected() {
    let dir = temp_dir("tiny");
    let remote = Arc::new(StubRemote::new());
    remote.insert(MODEL_URL, ok_response(vec![1, 2, 3, 4, 5]));
    let (_, manager) = session_manager(cache_at(&dir, remote));

    let err = manager.ensure_session().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidPayload(_)));
}

#[tokio::test]
async fn missing_model_surfaces_http_status() {
    let dir = temp_dir("missing-model");
    let remote = Arc::new(StubRemote::new());
    let (_, manager) = session_manager(cache_at(&dir, remote));

    let err = manager.ensure_session().await.unwrap_err();
    assert!(matches!(err, SessionError::Http(404)));
}

#[tokio::test]
async fn concurrent_callers_share_one_initialization() {
    let dir = temp_dir("concurrent");
    let remote = Arc::new(StubRemote::new());
    remote.insert(MODEL_URL, ok_response(model_bytes()));
    let (created, manager) = session_manager(cache_at(&dir, remote.clone()));

    let (a, b, c) = tokio::join!(
        manager.ensure_session(),
        manager.ensure_session(),
        manager.ensure_session()
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    // One model fetch total, shared by every caller.
    assert_eq!(remote.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cached_model_initializes_fully_offline() {
    let dir = temp_dir("offline-second");
    let remote = Arc::new(StubRemote::new());
    remote.insert(MODEL_URL, ok_response(model_bytes()));
    let cache = cache_at(&dir, remote.clone());

    // First run online: the fetch layer stores the model bytes.
    let (_, manager) = session_manager(cache);
    manager.ensure_session().await.unwrap();

    // Second run, same cache directory, network gone.
    remote.offline.store(true, Ordering::SeqCst);
    let (_, manager) = session_manager(cache_at(&dir, remote));
    manager.ensure_session().await.unwrap();
    assert!(manager.has_session());
}
