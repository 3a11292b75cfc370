//! # Label Registry
//!
//! Best-effort class-index-to-name mapping. The label file is fetched
//! through the asset cache and parsed by an ordered chain of format
//! attempts (JSON array, wrapped array, sparse index map, tolerant line
//! scan); the first success builds the one immutable table. A missing
//! table never errors — lookups fall back to a synthetic `class N` name.

mod parser;
mod table;

// Re-export from parser
pub use parser::parse_label_source;
// Re-export from table
pub use table::{prettify_label, LabelStore, LabelTable};
