//! # Collapse Patterns
//!
//! URL glob patterns that shorten matching response bodies in rendered
//! output, plus their on-disk persistence.

use std::path::PathBuf;
use thiserror::Error;

pub mod pattern;
pub mod persistence;
pub mod registry;

pub use pattern::CollapsePattern;
pub use persistence::PatternStore;
pub use registry::CollapseRegistry;

/// Reasons a collapse pattern is rejected
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern must not be empty")]
    Empty,
    #[error("unterminated character class in pattern '{pattern}'")]
    UnterminatedClass { pattern: String },
    #[error("invalid pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures reading or writing the pattern file
#[derive(Debug, Error)]
pub enum PatternStoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
