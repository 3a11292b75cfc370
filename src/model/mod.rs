//! # Model Session Manager
//!
//! Once-only lifecycle of the inference stack: the runtime is loaded at
//! most once (configured for the host's thread and SIMD capabilities),
//! the raw model bytes are fetched and validated exactly once, and one
//! reusable session is created from them. Concurrent callers share the
//! in-flight initialization; failures leave the slots empty so the next
//! call retries.

mod runtime;
mod session;
mod types;
mod validate;

// Re-export from runtime
pub use runtime::{
    FlatScoreLoader, FlatScoreRuntime, InferenceRuntime, InferenceSession, RuntimeLoader,
};
// Re-export from session
pub use session::SessionManager;
// Re-export from types
pub use types::{
    EnvCapabilities, ExecutionConfig, SessionError, TensorLayout, MAX_RUNTIME_THREADS,
};
// Re-export from validate
pub use validate::{validate_model_bytes, MIN_MODEL_BYTES};
