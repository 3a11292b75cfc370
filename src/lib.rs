//! # Iris
//!
//! Offline-first, on-device image classification. The crate combines a
//! versioned asset cache that makes the whole experience work with zero
//! network after first load, and a realtime inference pipeline that turns
//! a frame feed into repeated classification results under a strict
//! one-inference-in-flight backpressure guarantee.
//!
//! ## Key Components
//!
//! - [`cache::CacheManager`]: intercepts every same-origin asset fetch,
//!   serves cache-first, populates a runtime cache opportunistically and
//!   owns the install/activate/cleanup generation lifecycle
//! - [`model::SessionManager`]: once-only loading of the inference
//!   runtime, the model bytes and the single reusable session
//! - [`labels::LabelStore`]: tolerant multi-format class label registry
//! - [`realtime::RealtimeClassifier`]: the fixed-cadence capture →
//!   preprocess → infer → publish loop
//!
//! ## Architecture
//!
//! Application logic runs as a single logical thread of control on the
//! async runtime; the only shared mutable state is the loop's busy guard
//! and a handful of write-once cells. External collaborators (the UI, the
//! speech synthesizer, the inference runtime, the frame source) are trait
//! seams so the pipeline is testable without any of them.

pub mod cache;
pub mod capture;
pub mod classify;
pub mod config;
pub mod labels;
pub mod model;
pub mod realtime;
pub mod speech;
pub mod ui;
