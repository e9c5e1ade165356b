//! Build orchestration.
//!
//! A build loads global data and templates once, cleans the output
//! directory, copies assets, then renders every page in parallel and writes
//! the results in page order.

use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
    time::Instant,
};

use quire_core::{
    Config, CoreError, DataStore, Document, Metadata, PageErrorPolicy, config::ensure_safe_output,
    source,
};
use rayon::prelude::*;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    aggregate::{Aggregator, RenderGuard},
    assets::{AssetCopier, AssetError},
    context::RenderContext,
    template::{CompiledTemplate, TemplateError, TemplateResolver},
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration, data or source discovery error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Template loading error.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Asset error.
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),

    /// IO error at a specific path.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more pages failed to render.
    #[error("{} page(s) failed to render:\n{}", failures.len(), PageFailure::list(failures))]
    Pages {
        failures: Vec<PageFailure>,
        stats: BuildStats,
    },
}

impl BuildError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// A page that failed to render.
#[derive(Debug)]
pub struct PageFailure {
    /// Page source file.
    pub path: PathBuf,

    /// Why it failed.
    pub error: TemplateError,
}

impl PageFailure {
    fn list(failures: &[PageFailure]) -> String {
        failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}: {}", self.path.display(), self.error)
    }
}

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of pages written.
    pub pages: usize,

    /// Number of pages that failed to render.
    pub failed: usize,

    /// Number of asset files copied.
    pub assets: usize,

    /// Number of pages that overwrote an earlier page's output.
    pub collisions: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// A rendered page ready to be written.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page source file.
    pub source: PathBuf,

    /// Output path relative to the output directory.
    pub dest: PathBuf,

    /// Final document text.
    pub content: String,
}

/// Everything loaded once per run: global data, templates and the page list.
#[derive(Debug)]
pub struct Site {
    root: PathBuf,
    ext: String,
    assets_path: String,
    data: DataStore,
    resolver: TemplateResolver,
    aggregator: Aggregator,
    pages: Vec<PathBuf>,
    sources: Vec<PathBuf>,
}

impl Site {
    /// Load global data, partials, helpers, layouts and discover pages.
    pub fn load(config: &Config, root: &Path) -> Result<Self> {
        let data = DataStore::load(root, &config.paths.data, config.merge_mode())?;

        let aggregator = Aggregator::new(root).with_policy(config.build.on_document_error);
        let resolver = TemplateResolver::load(root, &config.paths, aggregator.clone())?;

        let pages = source::expand_required(root, &config.paths.pages)?;
        info!(count = pages.len(), "discovered pages");

        let mut sources = pages.clone();
        sources.extend(data.files().iter().cloned());
        sources.extend(source::expand(root, &config.paths.partials)?);
        sources.extend(source::expand(root, &config.paths.helpers)?);
        sources.extend(source::expand(root, &config.paths.layouts)?);
        if let Some(layout) = config.paths.layout.as_deref().filter(|p| !p.trim().is_empty()) {
            sources.extend(source::expand(root, &[layout])?);
        }
        sources.extend(config.assets.iter().map(|mount| root.join(&mount.source)));

        let assets_path = config
            .assets
            .first()
            .map(|mount| mount.dest.trim_matches('/').to_string())
            .filter(|dest| !dest.is_empty())
            .unwrap_or_else(|| ".".to_string());

        Ok(Self {
            root: root.to_path_buf(),
            ext: config.build.ext.clone(),
            assets_path,
            data,
            resolver,
            aggregator,
            pages,
            sources,
        })
    }

    /// Page source files in render order.
    #[must_use]
    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    /// Every input the site reads: pages, data, partials, helpers, layouts and
    /// asset directories.
    #[must_use]
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Merged global data.
    #[must_use]
    pub fn data(&self) -> &Metadata {
        self.data.data()
    }

    /// The template resolver.
    #[must_use]
    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Output path of a page relative to the output directory.
    #[must_use]
    pub fn output_path(&self, page: &Path) -> PathBuf {
        let stem = quire_core::document::file_stem(page);
        PathBuf::from(format!("{stem}{}", self.ext))
    }

    /// Render one page: body first, then its layout.
    pub fn render_page(&self, path: &Path) -> std::result::Result<RenderedPage, TemplateError> {
        let _guard = RenderGuard::enter(path);
        let doc = Document::read(path)?;
        let dest = self.output_path(path);

        let collections = self
            .aggregator
            .collections(self.resolver.registry(), &doc)?;
        let computed = self.computed_fields(&doc, &dest, collections);

        let context = RenderContext::builder()
            .layer(self.data.data())
            .layer(&doc.metadata)
            .computed_all(computed.clone())
            .build();

        let template = CompiledTemplate::compile(&doc.body, path)?;
        let body = self.resolver.render(&template, &context)?;

        let content = match self.resolver.select_layout(&doc)? {
            Some(layout) => {
                let context = RenderContext::builder()
                    .layer(self.data.data())
                    .layer(&layout.metadata)
                    .layer(&doc.metadata)
                    .computed_all(computed)
                    .computed(quire_core::BODY_KEY, body)
                    .build();
                self.resolver.render(&layout.template, &context)?
            }
            None => body,
        };

        debug!(page = %path.display(), dest = %dest.display(), "rendered page");

        Ok(RenderedPage {
            source: path.to_path_buf(),
            dest,
            content,
        })
    }

    fn computed_fields(&self, doc: &Document, dest: &Path, collections: Metadata) -> Metadata {
        let src = doc
            .source_path
            .strip_prefix(&self.root)
            .unwrap_or(&doc.source_path);

        let mut fields = Metadata::new();
        fields.insert(
            "page".to_string(),
            json!({
                "src": src.to_string_lossy(),
                "dest": dest.to_string_lossy(),
                "basename": doc.stem(),
            }),
        );
        fields.insert("assets".to_string(), Value::String(self.assets_path.clone()));
        fields.extend(collections);
        fields
    }
}

/// Site builder that orchestrates the build process.
#[derive(Debug)]
pub struct Builder {
    config: Config,
    root: PathBuf,
    output_dir: PathBuf,
}

impl Builder {
    /// Create a builder for the project rooted at `root`.
    #[must_use]
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let output_dir = root.join(&config.paths.output);
        Self {
            config,
            root,
            output_dir,
        }
    }

    /// Write output somewhere other than the configured directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// The directory output is written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Execute the full build process.
    pub fn build(&self) -> Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        info!(
            root = %self.root.display(),
            output = %self.output_dir.display(),
            "starting build"
        );

        // 1. Load data and templates
        let site = Site::load(&self.config, &self.root)?;

        // 2. Clean output directory, unless that would remove project sources
        ensure_safe_output(&self.root, &self.output_dir, site.sources())?;
        self.clean_output()?;

        // 3. Copy assets
        let copier = AssetCopier::new(&self.root, &self.output_dir);
        stats.assets = copier.copy_all(&self.config.assets)?;

        // 4. Render pages in parallel, write them in page order
        let results: Vec<_> = site
            .pages()
            .par_iter()
            .map(|path| (path, site.render_page(path)))
            .collect();

        let mut failures = Vec::new();
        let mut written = HashSet::new();

        for (path, result) in results {
            match result {
                Ok(page) => {
                    if !written.insert(page.dest.clone()) {
                        warn!(
                            page = %path.display(),
                            dest = %page.dest.display(),
                            "output path already written by another page, overwriting"
                        );
                        stats.collisions += 1;
                    }
                    self.write_page(&page)?;
                    stats.pages += 1;
                }
                Err(e) => {
                    error!(page = %path.display(), error = %e, "failed to render page");
                    failures.push(PageFailure {
                        path: path.clone(),
                        error: e,
                    });
                    if self.config.build.on_page_error == PageErrorPolicy::Abort {
                        break;
                    }
                }
            }
        }

        stats.failed = failures.len();
        stats.duration_ms = start.elapsed().as_millis() as u64;

        if !failures.is_empty() {
            return Err(BuildError::Pages { failures, stats });
        }

        info!(
            pages = stats.pages,
            assets = stats.assets,
            collisions = stats.collisions,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }

    /// Clean the output directory.
    fn clean_output(&self) -> Result<()> {
        if self.output_dir.exists() {
            debug!(dir = %self.output_dir.display(), "cleaning output directory");
            fs::remove_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))?;
        }
        fs::create_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))?;
        Ok(())
    }

    fn write_page(&self, page: &RenderedPage) -> Result<()> {
        let path = self.output_dir.join(&page.dest);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::write(&path, &page.content).map_err(|e| BuildError::io(&path, e))?;
        debug!(path = %path.display(), "wrote page");
        Ok(())
    }
}
