//! Multi-document collections.
//!
//! A collection is every document matching a set of globs. Each document's
//! body is rendered as a template against its own front matter, and the
//! result is exposed as `body` next to that front matter and the raw `src`.
//!
//! A document that is already being rendered further up the current render
//! (a page aggregating its own directory, or two documents aggregating each
//! other) is reported as [`AggregateError::Cycle`] and handled by the
//! document error policy like any other failing document.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
};

use handlebars::Handlebars;
use quire_core::{
    BODY_KEY, CoreError, Document, DocumentErrorPolicy, Metadata, RAW_BODY_KEY, source,
};
use rayon::prelude::*;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    context::RenderContext,
    template::{CompiledTemplate, Renderable, TemplateError},
};

/// Front matter key declaring named collections.
pub const COLLECTIONS_KEY: &str = "collections";

/// Aggregation errors.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// One document failed under the abort policy.
    #[error("failed to aggregate {path}: {cause}")]
    Document {
        path: PathBuf,
        #[source]
        cause: Box<TemplateError>,
    },

    /// A collection was declared with something other than globs.
    #[error("invalid collection `{name}` in {path}: expected a glob or a list of globs")]
    InvalidCollection { name: String, path: PathBuf },

    /// A document matched an aggregation started by its own render.
    #[error("{path} aggregates itself")]
    Cycle { path: PathBuf },

    /// Glob expansion failed.
    #[error(transparent)]
    Source(#[from] CoreError),
}

impl AggregateError {
    /// The file this error originated from, if known.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Document { path, .. }
            | Self::InvalidCollection { path, .. }
            | Self::Cycle { path } => Some(path),
            Self::Source(err) => err.path(),
        }
    }
}

/// Result type for aggregation.
pub type Result<T> = std::result::Result<T, AggregateError>;

thread_local! {
    static RENDERING: RefCell<Vec<PathBuf>> = const { RefCell::new(Vec::new()) };
}

/// Marks documents as being rendered on the current thread until dropped.
///
/// Aggregations started while a guard is alive treat every marked document
/// as a cycle. Guards nest; dropping one restores the previous set.
#[derive(Debug)]
#[must_use = "the document is only marked while the guard is alive"]
pub struct RenderGuard {
    previous: Vec<PathBuf>,
}

impl RenderGuard {
    /// Mark `path` on top of the documents already being rendered.
    pub fn enter(path: &Path) -> Self {
        let mut chain = rendering();
        chain.push(document_key(path));
        Self::replace(chain)
    }

    fn replace(chain: Vec<PathBuf>) -> Self {
        let previous = RENDERING.with(|current| current.replace(chain));
        Self { previous }
    }
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        RENDERING.with(|current| current.replace(previous));
    }
}

/// Documents being rendered on the current thread, outermost first.
fn rendering() -> Vec<PathBuf> {
    RENDERING.with(|current| current.borrow().clone())
}

fn document_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Renders collections of documents.
#[derive(Debug, Clone)]
pub struct Aggregator {
    root: PathBuf,
    policy: DocumentErrorPolicy,
}

impl Aggregator {
    /// Create an aggregator resolving globs relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: DocumentErrorPolicy::default(),
        }
    }

    /// Set what happens when a single document fails.
    #[must_use]
    pub fn with_policy(mut self, policy: DocumentErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The configured document error policy.
    #[must_use]
    pub fn policy(&self) -> DocumentErrorPolicy {
        self.policy
    }

    /// Parse and self-render every document matching `patterns`.
    ///
    /// Documents are rendered in parallel and returned in lexicographic path
    /// order. A file matched by several patterns appears once per match.
    pub fn collect<S: AsRef<str>>(
        &self,
        registry: &Handlebars<'_>,
        patterns: &[S],
    ) -> Result<Vec<Value>> {
        let paths = source::expand(&self.root, patterns)?;

        // Workers do not share the caller's thread-local chain, so each task
        // re-enters it before rendering.
        let chain = rendering();

        let results: Vec<_> = paths
            .into_par_iter()
            .map(|path| {
                let key = document_key(&path);
                let result = if chain.contains(&key) {
                    Err(AggregateError::Cycle { path: path.clone() }.into())
                } else {
                    let mut nested = chain.clone();
                    nested.push(key);
                    let _guard = RenderGuard::replace(nested);
                    render_document(registry, &path)
                };
                (path, result)
            })
            .collect();

        let mut documents = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok(document) => documents.push(document),
                Err(e) => match self.policy {
                    DocumentErrorPolicy::Skip => {
                        warn!(path = %path.display(), error = %e, "skipping document");
                    }
                    DocumentErrorPolicy::Abort => {
                        return Err(AggregateError::Document {
                            path,
                            cause: Box::new(e),
                        });
                    }
                },
            }
        }

        debug!(count = documents.len(), "aggregated documents");
        Ok(documents)
    }

    /// Render `block` once per matching document and concatenate the output.
    pub fn aggregate_and_render<S: AsRef<str>>(
        &self,
        registry: &Handlebars<'_>,
        patterns: &[S],
        block: &impl Renderable,
    ) -> std::result::Result<String, TemplateError> {
        let mut out = String::new();

        for document in self.collect(registry, patterns)? {
            let Value::Object(data) = document else {
                continue;
            };
            let context = RenderContext::builder().computed_all(data).build();
            out.push_str(&block.render(registry, &context)?);
        }

        Ok(out)
    }

    /// Resolve the `collections` front matter of a page into computed fields,
    /// one list of document contexts per declared name.
    pub fn collections(&self, registry: &Handlebars<'_>, doc: &Document) -> Result<Metadata> {
        let mut fields = Metadata::new();

        let Some(declared) = doc.get(COLLECTIONS_KEY) else {
            return Ok(fields);
        };

        let Value::Object(declared) = declared else {
            return Err(CoreError::malformed(
                &doc.source_path,
                "`collections` must map names to globs",
            )
            .into());
        };

        for (name, value) in declared {
            let patterns =
                glob_patterns(value).ok_or_else(|| AggregateError::InvalidCollection {
                    name: name.clone(),
                    path: doc.source_path.clone(),
                })?;
            let documents = self.collect(registry, &patterns)?;
            fields.insert(name.clone(), Value::Array(documents));
        }

        Ok(fields)
    }
}

/// Read a glob argument: a string or a list of strings.
pub fn glob_patterns(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(pattern) => Some(vec![pattern.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Parse one document and render its body against its own metadata.
fn render_document(
    registry: &Handlebars<'_>,
    path: &Path,
) -> std::result::Result<Value, TemplateError> {
    let doc = Document::read(path)?;
    let template = CompiledTemplate::compile(&doc.body, path)?;

    let own = RenderContext::builder()
        .layer(&doc.metadata)
        .computed(RAW_BODY_KEY, doc.body.as_str())
        .build();
    let body = template.render(registry, &own)?;

    Ok(RenderContext::builder()
        .layer(&doc.metadata)
        .computed(RAW_BODY_KEY, doc.body)
        .computed(BODY_KEY, body)
        .build()
        .into_value())
}
