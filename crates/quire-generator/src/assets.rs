//! Static asset copying.
//!
//! Each configured mount copies the files under its source directory that
//! match its include globs into a subdirectory of the output, keeping their
//! relative layout.

use std::{
    fs,
    path::{Path, PathBuf},
};

use quire_core::AssetMount;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use wax::Pattern;

/// Asset copying errors.
#[derive(Debug, Error)]
pub enum AssetError {
    /// IO error at a specific path.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error.
    #[error("failed to walk assets: {0}")]
    Walk(#[from] walkdir::Error),

    /// An include pattern could not be compiled.
    #[error("invalid include pattern in asset mount `{source_dir}`: {message}")]
    Pattern { source_dir: String, message: String },
}

/// Result type for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Copies asset mounts into the output directory.
#[derive(Debug, Clone)]
pub struct AssetCopier {
    root: PathBuf,
    output_dir: PathBuf,
}

impl AssetCopier {
    /// Create a copier resolving mount sources relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Copy every mount, returning the number of files copied.
    pub fn copy_all(&self, mounts: &[AssetMount]) -> Result<usize> {
        let mut count = 0;
        for mount in mounts {
            count += self.copy_mount(mount)?;
        }
        info!(count, "assets copied");
        Ok(count)
    }

    /// Copy one mount. A missing source directory copies nothing.
    pub fn copy_mount(&self, mount: &AssetMount) -> Result<usize> {
        let source_dir = self.root.join(&mount.source);
        let dest_dir = self.output_dir.join(&mount.dest);

        if !source_dir.is_dir() {
            debug!(source = %source_dir.display(), "asset source does not exist, skipping");
            return Ok(0);
        }

        let include = wax::any(mount.include.iter().map(String::as_str)).map_err(|e| {
            AssetError::Pattern {
                source_dir: mount.source.clone(),
                message: e.to_string(),
            }
        })?;

        let mut count = 0;
        for entry in WalkDir::new(&source_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&source_dir) else {
                continue;
            };
            if !include.is_match(relative) {
                continue;
            }

            copy_file(entry.path(), &dest_dir.join(relative))?;
            count += 1;
        }

        debug!(
            source = %source_dir.display(),
            dest = %dest_dir.display(),
            count,
            "copied asset mount"
        );
        Ok(count)
    }
}

/// Copy a single file, creating parent directories as needed.
pub fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| AssetError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::copy(source, dest).map_err(|e| AssetError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
