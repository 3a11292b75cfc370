use std::sync::Arc;
use async_trait::async_trait;
use ndarray::ArrayView4;
use tracing::info;

use super::types::{ExecutionConfig, SessionError};

/// A ready-to-run inference session: accepts one image tensor, returns
/// raw per-class scores. The numerical semantics of the weights are
/// opaque to this crate.
#[async_trait]
pub trait InferenceSession: Send + Sync + std::fmt::Debug {
    /// Declared input tensor names, in model order.
    fn input_names(&self) -> &[String];

    /// Declared output tensor names, in model order.
    fn output_names(&self) -> &[String];

    /// Declared shape for a named input, when the model carries one.
    /// Callers use this to adapt tensor layout without hardcoding the
    /// model's contract.
    fn input_shape(&self, name: &str) -> Option<&[i64]>;

    /// Runs the model over a single `[1,3,S,S]` or `[1,S,S,3]` tensor.
    async fn run(
        &self,
        input_name: &str,
        input: ArrayView4<'_, f32>,
    ) -> Result<Vec<f32>, SessionError>;
}

/// An execution provider capable of instantiating sessions from raw,
/// already-validated model bytes.
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Builds a session from model bytes.
    async fn create_session(
        &self,
        model_bytes: &[u8],
    ) -> Result<Arc<dyn InferenceSession>, SessionError>;
}

/// Loads and configures the runtime itself. Loading happens at most once
/// per process; the loader receives the resolved execution configuration
/// (thread count, SIMD) to apply.
#[async_trait]
pub trait RuntimeLoader: Send + Sync {
    async fn load(
        &self,
        exec: &ExecutionConfig,
    ) -> Result<Arc<dyn InferenceRuntime>, SessionError>;
}

/// Placeholder execution provider: accepts any validated model payload
/// and scores every class identically, so the full pipeline can be run
/// end to end before a hardware backend is wired in.
// TODO: replace with an ONNX execution provider once one is vendored
pub struct FlatScoreRuntime {
    class_count: usize,
    input_size: usize,
}

impl FlatScoreRuntime {
    pub fn new(class_count: usize, input_size: usize) -> Self {
        Self { class_count, input_size }
    }
}

#[async_trait]
impl InferenceRuntime for FlatScoreRuntime {
    fn name(&self) -> &str {
        "flat-score"
    }

    async fn create_session(
        &self,
        _model_bytes: &[u8],
    ) -> Result<Arc<dyn InferenceSession>, SessionError> {
        Ok(Arc::new(FlatScoreSession {
            input_names: vec!["input".to_string()],
            output_names: vec!["scores".to_string()],
            input_dims: vec![1, 3, self.input_size as i64, self.input_size as i64],
            class_count: self.class_count,
        }))
    }
}

#[derive(Debug)]
struct FlatScoreSession {
    input_names: Vec<String>,
    output_names: Vec<String>,
    input_dims: Vec<i64>,
    class_count: usize,
}

#[async_trait]
impl InferenceSession for FlatScoreSession {
    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn input_shape(&self, name: &str) -> Option<&[i64]> {
        if name == self.input_names[0] {
            Some(&self.input_dims)
        } else {
            None
        }
    }

    async fn run(
        &self,
        input_name: &str,
        input: ArrayView4<'_, f32>,
    ) -> Result<Vec<f32>, SessionError> {
        if input_name != self.input_names[0] {
            return Err(SessionError::Runtime(format!("unknown input: {}", input_name)));
        }
        if input.len() == 0 {
            return Err(SessionError::Runtime("empty input tensor".to_string()));
        }
        Ok(vec![0.0; self.class_count])
    }
}

/// Loader for the placeholder provider.
pub struct FlatScoreLoader {
    class_count: usize,
    input_size: usize,
}

impl FlatScoreLoader {
    pub fn new(class_count: usize, input_size: usize) -> Self {
        Self { class_count, input_size }
    }
}

#[async_trait]
impl RuntimeLoader for FlatScoreLoader {
    async fn load(
        &self,
        exec: &ExecutionConfig,
    ) -> Result<Arc<dyn InferenceRuntime>, SessionError> {
        info!(
            "Loaded flat-score runtime: {} thread(s), simd {}",
            exec.threads, exec.simd
        );
        Ok(Arc::new(FlatScoreRuntime::new(self.class_count, self.input_size)))
    }
}
