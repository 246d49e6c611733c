//! Persistent storage for collapse patterns
//!
//! Patterns are kept as `{ "patterns": [...] }` JSON so they survive
//! restarts. A missing file simply means no patterns.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::PatternStoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollapseFile {
    #[serde(default)]
    patterns: Vec<String>,
}

/// JSON file holding the collapse pattern list
#[derive(Debug, Clone)]
pub struct PatternStore {
    path: PathBuf,
}

impl PatternStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved patterns; a missing file yields an empty list
    pub fn load(&self) -> Result<Vec<String>, PatternStoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No collapse pattern file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PatternStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file: CollapseFile =
            serde_json::from_str(&data).map_err(|source| PatternStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(file.patterns)
    }

    /// Replace the saved pattern list, creating parent directories as needed
    pub fn save<S: AsRef<str>>(&self, patterns: &[S]) -> Result<(), PatternStoreError> {
        let io_error = |source: std::io::Error| PatternStoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let file = CollapseFile {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| {
            PatternStoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json).map_err(io_error)?;

        tracing::debug!(
            "Saved {} collapse patterns to {}",
            file.patterns.len(),
            self.path.display()
        );
        Ok(())
    }
}
