use std::collections::hash_map::DefaultHasher;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use reqwest::Url;

/// Name prefix of the install-time generation.
pub const PRECACHE_PREFIX: &str = "precache";
/// Name prefix of the opportunistic runtime generation.
pub const RUNTIME_PREFIX: &str = "runtime";

/// Name of the install-time generation for a version tag.
pub fn precache_generation(version: &str) -> String {
    format!("{}-{}", PRECACHE_PREFIX, version)
}

/// Name of the runtime generation for a version tag.
pub fn runtime_generation(version: &str) -> String {
    format!("{}-{}", RUNTIME_PREFIX, version)
}

/// A single outgoing resource request as seen by the cache layer.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    /// HTTP method, uppercase
    pub method: String,
    /// Absolute request URL
    pub url: Url,
    /// Whether the requester accepts an HTML document (a navigation);
    /// navigations fall back to the cached shell page when offline
    pub accepts_html: bool,
}

impl AssetRequest {
    /// A plain GET for a resource.
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            accepts_html: false,
        }
    }

    /// A page navigation: eligible for the offline shell fallback.
    pub fn navigation(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            accepts_html: true,
        }
    }
}

/// Identity of a cached entry: method plus normalized URL.
///
/// Normalization strips the fragment; everything else is kept verbatim so
/// distinct query strings cache separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Uppercased HTTP method
    pub method: String,
    /// Normalized URL as a string
    pub url: String,
}

impl CacheKey {
    /// Builds the key for a request identity.
    pub fn new(method: &str, url: &Url) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: normalized.to_string(),
        }
    }

    /// Stable on-disk file name for this key.
    ///
    /// `DefaultHasher::new()` hashes with fixed keys, so the name is the
    /// same across processes. The full key is stored inside the record and
    /// verified on read, so a hash collision degrades to a cache miss.
    pub fn file_name(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.method.hash(&mut hasher);
        self.url.hash(&mut hasher);
        format!("{:016x}.asset", hasher.finish())
    }
}

/// A stored (or just-fetched) response: status, headers and body bytes.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers as name/value pairs
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
    /// Unix timestamp of when the response was fetched
    pub stored_at: i64,
}

impl CachedResponse {
    /// Whether the response carries a success status.
    pub fn ok(&self) -> bool {
        self.status == 200
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// External control messages accepted by the cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate the current cache version now, deleting superseded
    /// generations without waiting for a restart
    ActivateNow,
    /// Delete every generation, forcing a full rebuild on next install
    ClearCache,
}

/// Custom error types for cache operations
#[derive(Debug)]
pub enum CacheError {
    /// Wraps std::io::Error for file operations
    Io(std::io::Error),
    /// A stored record failed framing or content checks
    InvalidRecord(String),
    /// The network layer could not complete the request at all
    Network(String),
    /// The remote answered with a non-success status
    Http(u16),
    /// A request path did not resolve to a valid URL
    InvalidUrl(String),
}

/// Implements Display trait for CacheError for error reporting
impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "I/O error: {}", e),
            CacheError::InvalidRecord(msg) => write!(f, "Invalid cache record: {}", msg),
            CacheError::Network(msg) => write!(f, "Network failure: {}", msg),
            CacheError::Http(status) => write!(f, "HTTP {}", status),
            CacheError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
        }
    }
}

/// Implements Error trait to allow CacheError to be used as a standard error type
impl Error for CacheError {}

/// Allows automatic conversion from std::io::Error to CacheError
impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_strips_fragment_and_uppercases_method() {
        let a = Url::parse("http://localhost:8080/models/net.onnx#frag").unwrap();
        let b = Url::parse("http://localhost:8080/models/net.onnx").unwrap();
        let ka = CacheKey::new("get", &a);
        let kb = CacheKey::new("GET", &b);
        assert_eq!(ka, kb);
        assert_eq!(ka.method, "GET");
    }

    #[test]
    fn file_name_is_stable_and_distinct() {
        let a = Url::parse("http://localhost:8080/a").unwrap();
        let b = Url::parse("http://localhost:8080/b").unwrap();
        let ka = CacheKey::new("GET", &a);
        assert_eq!(ka.file_name(), CacheKey::new("GET", &a).file_name());
        assert_ne!(ka.file_name(), CacheKey::new("GET", &b).file_name());
    }

    #[test]
    fn generation_names_carry_the_version_tag() {
        assert_eq!(precache_generation("v2"), "precache-v2");
        assert_eq!(runtime_generation("v2"), "runtime-v2");
    }
}
