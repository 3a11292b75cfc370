use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::{info, warn};

use crate::cache::{AssetRequest, CacheManager};
use super::parser::parse_label_source;

/// WordNet synset identifiers that prefix raw ImageNet-style labels,
/// e.g. the "n01440764" in "n01440764 tench".
static WORDNET_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^n\d{8}$").unwrap());

/// Ordered class-index-to-name table, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<String>,
}

impl LabelTable {
    /// Builds a table from raw label-file text, trying each supported
    /// encoding in turn.
    pub fn from_source(text: &str) -> Option<Self> {
        parse_label_source(text)
            .filter(|entries| !entries.is_empty())
            .map(|entries| Self { entries })
    }

    /// Raw label for a class index, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns a raw dataset label into a presentable name: keep only the
/// first comma-separated synonym and drop a leading WordNet token.
pub fn prettify_label(raw: &str) -> String {
    let mut s = raw;
    if let Some(comma) = s.find(',') {
        s = &s[..comma];
    }
    let parts: Vec<&str> = s.split_whitespace().collect();
    let parts = match parts.first() {
        Some(first) if WORDNET_ID.is_match(first) => &parts[1..],
        _ => &parts[..],
    };
    parts.join(" ")
}

/// Write-once shared label registry.
///
/// Loading is best-effort and never blocks the inference path: lookups on
/// a missing or unparsable table degrade to the synthetic `class N` form
/// instead of an error.
pub struct LabelStore {
    table: OnceCell<LabelTable>,
}

impl LabelStore {
    pub fn new() -> Self {
        Self { table: OnceCell::new() }
    }

    /// Fetches the label file through the cache layer and builds the
    /// table from the first source that parses. Failures are logged and
    /// swallowed; the store simply stays empty.
    pub async fn load(&self, cache: &CacheManager, path: &str) {
        let url = match cache.resolve(path) {
            Ok(url) => url,
            Err(e) => {
                warn!("Label path does not resolve: {}", e);
                return;
            }
        };
        let response = match cache.fetch(&AssetRequest::get(url)).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Label fetch failed: {}", e);
                return;
            }
        };
        if !response.ok() {
            warn!("Label fetch returned HTTP {}", response.status);
            return;
        }

        let text = String::from_utf8_lossy(&response.body);
        match LabelTable::from_source(&text) {
            Some(table) => {
                info!("Loaded {} class labels", table.len());
                let _ = self.table.set(table);
            }
            None => warn!("Label file could not be parsed in any supported encoding"),
        }
    }

    /// Installs an already-built table; the first table wins.
    pub fn install(&self, table: LabelTable) {
        let _ = self.table.set(table);
    }

    /// Presentable label for a class index; `class N` when the table is
    /// missing or has no entry for the index.
    pub fn label_for(&self, index: usize) -> String {
        match self.table.get().and_then(|table| table.get(index)) {
            Some(raw) => prettify_label(raw),
            None => format!("class {}", index),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }
}

impl Default for LabelStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prettify_strips_wordnet_prefix() {
        assert_eq!(prettify_label("n01440764 tench"), "tench");
    }

    #[test]
    fn prettify_truncates_synonym_list() {
        assert_eq!(prettify_label("tench, Tinca tinca"), "tench");
    }

    #[test]
    fn prettify_handles_both_together() {
        assert_eq!(prettify_label("n01440764 tench, Tinca tinca"), "tench");
    }

    #[test]
    fn prettify_keeps_plain_labels() {
        assert_eq!(prettify_label("great white shark"), "great white shark");
    }

    #[test]
    fn missing_table_degrades_to_synthetic_label() {
        let store = LabelStore::new();
        assert_eq!(store.label_for(7), "class 7");
    }

    #[test]
    fn out_of_range_index_degrades_to_synthetic_label() {
        let store = LabelStore::new();
        store.install(LabelTable::from_source(r#"["tench"]"#).unwrap());
        assert_eq!(store.label_for(0), "tench");
        assert_eq!(store.label_for(99), "class 99");
    }

    #[test]
    fn first_installed_table_wins() {
        let store = LabelStore::new();
        store.install(LabelTable::from_source(r#"["tench"]"#).unwrap());
        store.install(LabelTable::from_source(r#"["goldfish"]"#).unwrap());
        assert_eq!(store.label_for(0), "tench");
    }
}
