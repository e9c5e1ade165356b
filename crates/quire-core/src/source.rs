//! Glob expansion for source files.
//!
//! Every consumer of source files (pages, partials, layouts, helpers, data,
//! aggregated collections) resolves its patterns here so that all of them see
//! the same total order: lexicographic by path, regardless of the order the
//! file system enumerates directory entries in.

use std::path::{Path, PathBuf};

use tracing::trace;
use wax::Glob;

use crate::error::{CoreError, Result};

/// Expand glob patterns relative to `root` into a sorted list of files.
///
/// Rooted patterns ignore `root`. A pattern naming an existing file is taken
/// literally. Files matched by more than one pattern appear once per match.
pub fn expand<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        files.extend(expand_one(root, pattern)?);
    }

    files.sort();
    Ok(files)
}

/// Like [`expand`], but with duplicate matches removed.
pub fn expand_unique<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = expand(root, patterns)?;
    files.dedup();
    Ok(files)
}

/// Like [`expand_unique`], but fails when the patterns match nothing.
pub fn expand_required<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Vec<PathBuf>> {
    let files = expand_unique(root, patterns)?;
    if files.is_empty() {
        let pattern = patterns
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CoreError::NoMatch { pattern });
    }
    Ok(files)
}

fn expand_one(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let literal = root.join(pattern);
    if literal.is_file() {
        return Ok(vec![normalize(literal)]);
    }

    let glob = Glob::new(pattern).map_err(|e| CoreError::glob(pattern, e))?;
    let mut files = Vec::new();

    let walk = glob.walk(root);
    if !walk.root().exists() {
        trace!(pattern, root = %walk.root().display(), "glob root does not exist");
        return Ok(files);
    }

    for entry in walk {
        let entry = entry.map_err(|e| CoreError::glob(pattern, e))?;
        if !entry.path().is_file() {
            continue;
        }
        files.push(normalize(entry.into_path()));
    }

    trace!(pattern, count = files.len(), "expanded glob");
    Ok(files)
}

// Walking from "." yields "./a/b"; keep paths in the form users wrote them.
fn normalize(path: PathBuf) -> PathBuf {
    match path.strip_prefix(".") {
        Ok(stripped) => stripped.to_path_buf(),
        Err(_) => path,
    }
}
