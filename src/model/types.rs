use std::error::Error;
use std::fmt;
use std::thread;

use crate::cache::CacheError;

/// Hard cap on runtime worker threads, regardless of core count.
pub const MAX_RUNTIME_THREADS: usize = 4;

/// Custom error types for session creation and use
#[derive(Debug)]
pub enum SessionError {
    /// No session exists yet and the model could not be fetched without
    /// connectivity; the caller should prompt for a one-time online
    /// initialization rather than report a generic failure
    NetworkRequired,
    /// The fetched model payload failed size or content validation;
    /// the next `ensure_session` call will retry
    InvalidPayload(String),
    /// The model fetch returned a non-success HTTP status
    Http(u16),
    /// The asset/cache layer failed
    Asset(CacheError),
    /// The inference runtime rejected the model or a run
    Runtime(String),
}

/// Implements Display trait for SessionError for error reporting
impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::NetworkRequired => {
                write!(f, "Model not yet cached; network required for first initialization")
            }
            SessionError::InvalidPayload(msg) => write!(f, "Invalid model payload: {}", msg),
            SessionError::Http(status) => write!(f, "Model fetch returned HTTP {}", status),
            SessionError::Asset(e) => write!(f, "Asset error: {}", e),
            SessionError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::Asset(e) => Some(e),
            _ => None,
        }
    }
}

/// Host capabilities that bound execution configuration.
#[derive(Debug, Clone, Copy)]
pub struct EnvCapabilities {
    /// Whether the host grants shared-memory threading to the runtime.
    /// Without it, multi-threaded execution is unsupported.
    pub shared_memory: bool,
    /// Number of hardware threads the host reports
    pub hardware_concurrency: usize,
}

impl EnvCapabilities {
    /// Probes the current host.
    pub fn detect(shared_memory: bool) -> Self {
        let hardware_concurrency = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self { shared_memory, hardware_concurrency }
    }
}

/// Execution parameters handed to the runtime loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Worker thread count for the runtime
    pub threads: usize,
    /// Whether vectorized (SIMD) kernels are enabled
    pub simd: bool,
}

impl ExecutionConfig {
    /// Derives the execution configuration from host capabilities:
    /// threads bounded to [1, min(4, cores)] when shared-memory threading
    /// is available, exactly 1 otherwise; SIMD always on.
    pub fn for_env(env: &EnvCapabilities) -> Self {
        let threads = if env.shared_memory {
            env.hardware_concurrency.max(1).min(MAX_RUNTIME_THREADS)
        } else {
            1
        };
        Self { threads, simd: true }
    }
}

/// Tensor memory layout declared by the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]` — channels before the spatial dimensions
    ChannelFirst,
    /// `[1, H, W, 3]` — channels after the spatial dimensions
    ChannelLast,
}

impl TensorLayout {
    /// Detects the layout from declared input dimensions. Channel-first
    /// is assumed when the model declares no usable shape.
    pub fn from_dims(dims: Option<&[i64]>) -> Self {
        match dims {
            Some(d) if d.len() == 4 => {
                if d[1] == 3 {
                    TensorLayout::ChannelFirst
                } else {
                    TensorLayout::ChannelLast
                }
            }
            _ => TensorLayout::ChannelFirst,
        }
    }
}
