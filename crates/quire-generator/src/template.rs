//! Template compilation, layouts and the shared Handlebars registry.
//!
//! Rendering is two-phase: a body is compiled once into a [`CompiledTemplate`]
//! and rendered against a [`RenderContext`] through [`Renderable`]. Partials,
//! layouts and helpers are loaded once into a [`TemplateResolver`] that stays
//! read-only for the rest of the run.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use handlebars::{Context, Handlebars, RenderError, RenderErrorReason, Renderable as _, Template};
use quire_core::{
    CoreError, Document, Metadata,
    config::PathsConfig,
    document::file_stem,
    source,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    aggregate::{AggregateError, Aggregator},
    context::RenderContext,
    helpers,
};

/// Front matter key selecting a page's layout.
pub const LAYOUT_KEY: &str = "layout";

/// Template errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template source failed to compile.
    #[error("failed to compile {path}: {source}")]
    Compile {
        path: PathBuf,
        #[source]
        source: handlebars::TemplateError,
    },

    /// A template invoked a helper that is not registered.
    #[error("unknown helper `{name}` in {path}")]
    UnknownHelper { name: String, path: PathBuf },

    /// A template included a partial that is not registered.
    #[error("unresolved partial `{name}` in {path}")]
    UnresolvedPartial { name: String, path: PathBuf },

    /// A page selected a layout that does not exist.
    #[error("unresolved layout `{name}` in {path}")]
    UnresolvedLayout { name: String, path: PathBuf },

    /// A helper script failed to load.
    #[error("failed to load helper script {path}: {message}")]
    Script { path: PathBuf, message: String },

    /// Any other render failure.
    #[error("failed to render {path}: {message}")]
    Render { path: PathBuf, message: String },

    /// An aggregated collection failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Reading or parsing a source file failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TemplateError {
    /// The file this error originated from, if known.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Compile { path, .. }
            | Self::UnknownHelper { path, .. }
            | Self::UnresolvedPartial { path, .. }
            | Self::UnresolvedLayout { path, .. }
            | Self::Script { path, .. }
            | Self::Render { path, .. } => Some(path),
            Self::Aggregate(err) => err.path(),
            Self::Core(err) => err.path(),
        }
    }
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Anything that renders to a string against a [`RenderContext`].
pub trait Renderable {
    /// Render against `context`, resolving partials and helpers in `registry`.
    fn render(&self, registry: &Handlebars<'_>, context: &RenderContext) -> Result<String>;
}

/// A compiled template body, remembered together with the file it came from.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    source_path: PathBuf,
    template: Template,
}

impl CompiledTemplate {
    /// Compile template source.
    pub fn compile(source: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let source_path = path.into();
        let template =
            Template::compile_with_name(source, source_path.display().to_string()).map_err(
                |source| TemplateError::Compile {
                    path: source_path.clone(),
                    source,
                },
            )?;

        Ok(Self {
            source_path,
            template,
        })
    }

    /// File the template was compiled from.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

impl Renderable for CompiledTemplate {
    fn render(&self, registry: &Handlebars<'_>, context: &RenderContext) -> Result<String> {
        let ctx = Context::from(context.to_value());
        let mut rc = handlebars::RenderContext::new(None);

        self.template
            .renders(registry, &ctx, &mut rc)
            .map_err(|e| classify(e, &self.source_path))
    }
}

/// Map a Handlebars render failure onto [`TemplateError`].
fn classify(err: RenderError, path: &Path) -> TemplateError {
    let message = err.to_string();

    match RenderErrorReason::from(err) {
        RenderErrorReason::HelperNotFound(name) => TemplateError::UnknownHelper {
            name,
            path: path.to_path_buf(),
        },
        RenderErrorReason::PartialNotFound(name) => TemplateError::UnresolvedPartial {
            name,
            path: path.to_path_buf(),
        },
        RenderErrorReason::NestedError(inner) => match inner.downcast::<AggregateError>() {
            Ok(err) => TemplateError::Aggregate(*err),
            Err(other) => TemplateError::Render {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        },
        _ => TemplateError::Render {
            path: path.to_path_buf(),
            message,
        },
    }
}

/// A layout shell wrapping rendered page bodies.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Name pages select the layout by (the file stem).
    pub name: String,

    /// Layout front matter, layered below page metadata.
    pub metadata: Metadata,

    /// Compiled layout body.
    pub template: CompiledTemplate,
}

impl Layout {
    /// Read and compile a layout file.
    pub fn read(path: &Path) -> Result<Self> {
        let doc = Document::read(path)?;
        Ok(Self {
            name: doc.stem(),
            template: CompiledTemplate::compile(&doc.body, path)?,
            metadata: doc.metadata,
        })
    }
}

/// Partials, helpers and layouts shared by every render of a run.
#[derive(Debug)]
pub struct TemplateResolver {
    registry: Handlebars<'static>,
    layouts: BTreeMap<String, Layout>,
    default_layout: Option<String>,
}

impl TemplateResolver {
    /// Create a resolver with only the built-in helpers registered.
    #[must_use]
    pub fn new(aggregator: Aggregator) -> Self {
        let mut registry = Handlebars::new();
        helpers::register_builtins(&mut registry, aggregator);

        Self {
            registry,
            layouts: BTreeMap::new(),
            default_layout: None,
        }
    }

    /// Load partials, helper scripts and layouts named in `paths`.
    pub fn load(root: &Path, paths: &PathsConfig, aggregator: Aggregator) -> Result<Self> {
        let mut resolver = Self::new(aggregator);

        for path in source::expand_unique(root, &paths.partials)? {
            resolver.register_partial_file(&path)?;
        }

        let scripts = source::expand_unique(root, &paths.helpers)?;
        for path in &scripts {
            resolver.register_helper_file(path)?;
        }

        for path in source::expand_unique(root, &paths.layouts)? {
            resolver.add_layout(Layout::read(&path)?);
        }

        if let Some(pattern) = paths.layout.as_deref().filter(|p| !p.trim().is_empty()) {
            let path = source::expand_required(root, &[pattern])?
                .into_iter()
                .next()
                .ok_or_else(|| CoreError::NoMatch {
                    pattern: pattern.to_string(),
                })?;
            let layout = Layout::read(&path)?;
            resolver.default_layout = Some(layout.name.clone());
            resolver.add_layout(layout);
        }

        info!(
            scripts = scripts.len(),
            partials = resolver.registry.get_templates().len(),
            layouts = resolver.layouts.len(),
            "template resolver ready"
        );

        Ok(resolver)
    }

    /// Register a partial under `name`.
    pub fn register_partial(&mut self, name: &str, source: &str, path: &Path) -> Result<()> {
        self.registry
            .register_partial(name, source)
            .map_err(|source| TemplateError::Compile {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(name, path = %path.display(), "registered partial");
        Ok(())
    }

    /// Register a partial file under its stem. Front matter is stripped.
    pub fn register_partial_file(&mut self, path: &Path) -> Result<()> {
        let doc = Document::read(path)?;
        self.register_partial(&doc.stem(), &doc.body, path)
    }

    /// Register a Rhai helper script under its stem.
    pub fn register_helper_file(&mut self, path: &Path) -> Result<()> {
        let name = file_stem(path);
        self.registry
            .register_script_helper_file(&name, path)
            .map_err(|e| TemplateError::Script {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!(name = %name, path = %path.display(), "registered helper script");
        Ok(())
    }

    /// Add a layout, replacing any layout with the same name.
    pub fn add_layout(&mut self, layout: Layout) {
        debug!(name = %layout.name, "registered layout");
        self.layouts.insert(layout.name.clone(), layout);
    }

    /// Make `name` the layout for pages that do not choose one.
    pub fn set_default_layout(&mut self, name: Option<String>) {
        self.default_layout = name;
    }

    /// The registry holding partials and helpers.
    #[must_use]
    pub fn registry(&self) -> &Handlebars<'static> {
        &self.registry
    }

    /// Look up a layout by name.
    #[must_use]
    pub fn layout(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }

    /// Names of every loaded layout.
    pub fn layout_names(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    /// Render a template with the shared registry.
    pub fn render(&self, template: &impl Renderable, context: &RenderContext) -> Result<String> {
        template.render(&self.registry, context)
    }

    /// Pick the layout for a document.
    ///
    /// `layout: <name>` selects a layout by stem, `layout: false` disables
    /// layout wrapping, and no `layout` key falls back to the default layout.
    pub fn select_layout(&self, doc: &Document) -> Result<Option<&Layout>> {
        let name = match doc.get(LAYOUT_KEY) {
            None | Some(Value::Null) => match &self.default_layout {
                Some(name) => name.clone(),
                None => return Ok(None),
            },
            Some(Value::Bool(false)) => return Ok(None),
            Some(Value::String(name)) => file_stem(Path::new(name)),
            Some(_) => {
                return Err(CoreError::malformed(
                    &doc.source_path,
                    "`layout` must be a layout name or false",
                )
                .into());
            }
        };

        self.layouts
            .get(&name)
            .map(Some)
            .ok_or_else(|| TemplateError::UnresolvedLayout {
                name,
                path: doc.source_path.clone(),
            })
    }
}
