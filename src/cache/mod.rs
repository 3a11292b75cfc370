//! # Asset Cache Manager
//!
//! The cache module makes the rest of the system offline-capable: every
//! same-origin asset fetch goes through [`CacheManager`], which serves
//! cache-first from a disk-backed store, falls back to the network, and
//! opportunistically stores success responses for the next time the
//! network is gone.
//!
//! ## Key Components
//!
//! - `CacheManager`: fetch interception, install/activate lifecycle,
//!   offline navigation fallback, external control messages
//! - `CacheStore`: generation-partitioned record files on disk
//! - `RemoteFetch`: the network seam (reqwest in production, stubs in
//!   tests)
//!
//! ## Lifecycle
//!
//! Entries live in exactly one of two named generations per version tag:
//! the install-time precache and the opportunistic runtime cache.
//! Activation deletes every generation whose name no longer matches the
//! active version — and nothing else — so superseded content disappears
//! atomically at a well-defined point.

mod manager;
mod record;
mod store;
mod types;

// Re-export from manager
pub use manager::{CacheManager, HttpFetch, InstallReport, RemoteFetch};
// Re-export from store
pub use store::CacheStore;
// Re-export from record
pub use record::is_cache_record;
// Re-export from types
pub use types::{
    precache_generation, runtime_generation,
    AssetRequest, CacheError, CacheKey, CachedResponse, ControlMessage,
};
