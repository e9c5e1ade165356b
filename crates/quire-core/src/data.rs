//! Global data loaded from structured data files.
//!
//! Data files are decoded and merged into one mapping that every page render
//! sees. Any malformed file aborts the load: templates would otherwise render
//! silently against missing or stale values.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    document::{Metadata, file_stem},
    error::{CoreError, Result},
    source,
};

/// Structured data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// `.json`
    Json,
    /// `.yml` / `.yaml`
    Yaml,
    /// `.toml`
    Toml,
}

impl DataFormat {
    /// Determine the data format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Determine the data format of a path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Decode text in this format.
    pub fn decode(&self, text: &str, path: &Path) -> Result<Value> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| CoreError::malformed(path, e)),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| CoreError::malformed(path, e)),
            Self::Toml => toml::from_str(text).map_err(|e| CoreError::malformed(path, e)),
        }
    }
}

/// How data files are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Top-level keys of every file merge into one mapping.
    #[default]
    Flat,
    /// Each file's contents live under its file stem.
    Namespaced,
}

/// The merged global data for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataStore {
    data: Metadata,
    files: Vec<PathBuf>,
}

impl DataStore {
    /// Load and merge every data file matching `patterns`.
    ///
    /// Files load in lexicographic path order and later files win on key
    /// collisions. Files with unrecognised extensions are skipped.
    pub fn load<S: AsRef<str>>(root: &Path, patterns: &[S], mode: MergeMode) -> Result<Self> {
        let paths = source::expand_unique(root, patterns)?;
        let mut store = Self::default();

        for path in paths {
            let Some(format) = DataFormat::from_path(&path) else {
                debug!(path = %path.display(), "skipping file with unknown data format");
                continue;
            };

            let text = fs::read_to_string(&path).map_err(|e| CoreError::io(&path, e))?;
            let value = format.decode(&text, &path)?;
            store.merge(&path, value, mode);
        }

        info!(
            files = store.files.len(),
            keys = store.data.len(),
            "loaded global data"
        );
        Ok(store)
    }

    /// Merge one decoded file into the store.
    pub fn merge(&mut self, path: &Path, value: Value, mode: MergeMode) {
        match (mode, value) {
            (MergeMode::Flat, Value::Object(map)) => {
                for (key, value) in map {
                    if self.data.insert(key.clone(), value).is_some() {
                        debug!(key = %key, path = %path.display(), "data key overridden");
                    }
                }
            }
            (_, Value::Null) => {}
            (_, value) => {
                self.data.insert(file_stem(path), value);
            }
        }
        self.files.push(path.to_path_buf());
    }

    /// The merged mapping.
    #[must_use]
    pub fn data(&self) -> &Metadata {
        &self.data
    }

    /// Consume the store, returning the merged mapping.
    #[must_use]
    pub fn into_data(self) -> Metadata {
        self.data
    }

    /// Files that contributed to the store, in load order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}
