//! # Classification
//!
//! Pure classification math (numerically stable softmax, stable top-K)
//! and the frame preprocessing pipeline. Both are shared verbatim by the
//! realtime loop and the one-shot still-frame path.

mod math;
mod preprocess;

// Re-export from math
pub use math::{softmax, top_k, Prediction};
// Re-export from preprocess
pub use preprocess::Preprocessor;
