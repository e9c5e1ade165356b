//! Pipeline configuration.
//!
//! Defaults mirror the conventional project layout:
//!
//! ```text
//! src/pages/*.hbs                     pages, one output file each
//! src/templates/partials/*.hbs        partials, named by file stem
//! src/templates/layouts/default.hbs   default layout
//! src/helpers/*.rhai                  script helpers, named by file stem
//! src/config/*.{json,yml}             global data
//! src/assets/                         copied to dist/assets/
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    data::MergeMode,
    error::{CoreError, Result},
};

/// Main configuration structure for Quire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Static asset directories copied verbatim into the output.
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetMount>,

    /// Build behaviour.
    #[serde(default)]
    pub build: BuildConfig,
}

/// Source and output locations. Patterns are globs relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Pages to render.
    #[serde(default = "default_pages")]
    pub pages: Vec<String>,

    /// Partials, registered under their file stem.
    #[serde(default = "default_partials")]
    pub partials: Vec<String>,

    /// Default layout wrapping every page. `None` renders pages bare.
    #[serde(default = "default_layout")]
    pub layout: Option<String>,

    /// Additional layouts selectable from front matter by file stem.
    #[serde(default)]
    pub layouts: Vec<String>,

    /// Script helper definitions, registered under their file stem.
    #[serde(default = "default_helpers")]
    pub helpers: Vec<String>,

    /// Global data files.
    #[serde(default = "default_data")]
    pub data: Vec<String>,

    /// Output directory. Removed and recreated on every build.
    #[serde(default = "default_output")]
    pub output: String,
}

/// One static asset directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMount {
    /// Directory to copy from.
    pub source: String,

    /// Subdirectory of the output directory to copy into.
    #[serde(default)]
    pub dest: String,

    /// Globs relative to `source` selecting which files to copy.
    #[serde(default = "default_include")]
    pub include: Vec<String>,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Extension of rendered pages, including the leading dot.
    #[serde(default = "default_ext")]
    pub ext: String,

    /// Store each data file under its file stem instead of merging top-level keys.
    #[serde(default)]
    pub namespace_data: bool,

    /// What to do when a page fails to render.
    #[serde(default)]
    pub on_page_error: PageErrorPolicy,

    /// What to do when one document of an aggregated collection fails.
    #[serde(default)]
    pub on_document_error: DocumentErrorPolicy,
}

/// Policy for page-level render failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageErrorPolicy {
    /// Keep rendering other pages and report every failure at the end.
    #[default]
    Collect,
    /// Stop writing at the first failed page in page order. Pages render in
    /// parallel, so later pages may already have been rendered, but none of
    /// them is written.
    Abort,
}

/// Policy for a failing document inside an aggregated collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentErrorPolicy {
    /// Log the document and leave it out of the composite output.
    #[default]
    Skip,
    /// Fail the whole aggregation.
    Abort,
}

// Default value functions
fn default_pages() -> Vec<String> {
    vec!["src/pages/*.hbs".to_string()]
}

fn default_partials() -> Vec<String> {
    vec!["src/templates/partials/*.hbs".to_string()]
}

fn default_layout() -> Option<String> {
    Some("src/templates/layouts/default.hbs".to_string())
}

fn default_helpers() -> Vec<String> {
    vec!["src/helpers/*.rhai".to_string()]
}

fn default_data() -> Vec<String> {
    vec!["src/config/*.{json,yml}".to_string()]
}

fn default_output() -> String {
    "dist".to_string()
}

fn default_assets() -> Vec<AssetMount> {
    vec![AssetMount {
        source: "src/assets".to_string(),
        dest: "assets".to_string(),
        include: default_include(),
    }]
}

fn default_include() -> Vec<String> {
    vec!["**".to_string()]
}

fn default_ext() -> String {
    ".html".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            assets: default_assets(),
            build: BuildConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            partials: default_partials(),
            layout: default_layout(),
            layouts: Vec::new(),
            helpers: default_helpers(),
            data: default_data(),
            output: default_output(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            ext: default_ext(),
            namespace_data: false,
            on_page_error: PageErrorPolicy::default(),
            on_document_error: DocumentErrorPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file layered with `QUIRE__*` environment
    /// variables (e.g. `QUIRE__PATHS__OUTPUT=public`).
    ///
    /// A missing file is not an error: the defaults describe the conventional
    /// layout and need no configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let mut builder = config::Config::builder();

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else {
            tracing::info!(path = %path.display(), "no configuration file, using defaults");
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("QUIRE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize().map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        config.validate_output(root)?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let output = Path::new(&self.paths.output);

        if self.paths.output.trim().is_empty() {
            return Err(CoreError::config("paths.output cannot be empty"));
        }

        if output.components().all(|c| {
            matches!(
                c,
                Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        }) {
            return Err(CoreError::config(
                "paths.output must not be the project root or one of its parents",
            ));
        }

        if self.paths.pages.is_empty() {
            return Err(CoreError::config("paths.pages cannot be empty"));
        }

        if !self.build.ext.starts_with('.') {
            return Err(CoreError::config(format!(
                "build.ext must start with a dot, got `{}`",
                self.build.ext
            )));
        }

        for mount in &self.assets {
            if Path::new(&mount.source).starts_with(output) {
                return Err(CoreError::config(format!(
                    "asset source `{}` lies inside the output directory",
                    mount.source
                )));
            }
        }

        Ok(())
    }

    /// Validate the output directory against the project it belongs to.
    ///
    /// Unlike [`Config::validate`] this resolves absolute paths, so an output
    /// naming the project root by its full path is rejected too.
    pub fn validate_output(&self, root: &Path) -> Result<()> {
        let sources: Vec<PathBuf> = self
            .assets
            .iter()
            .map(|mount| root.join(&mount.source))
            .collect();
        ensure_safe_output(root, &root.join(&self.paths.output), &sources)
    }

    /// How data files should be merged.
    #[must_use]
    pub fn merge_mode(&self) -> MergeMode {
        if self.build.namespace_data {
            MergeMode::Namespaced
        } else {
            MergeMode::Flat
        }
    }
}

/// Fail unless removing `output` leaves `root` and every path in `sources`
/// untouched.
pub fn ensure_safe_output(root: &Path, output: &Path, sources: &[PathBuf]) -> Result<()> {
    let output = resolve(output);

    if resolve(root).starts_with(&output) {
        return Err(CoreError::config(format!(
            "output directory {} is the project root or one of its parents",
            output.display()
        )));
    }

    for source in sources {
        if resolve(source).starts_with(&output) {
            return Err(CoreError::config(format!(
                "output directory {} contains the source {}",
                output.display(),
                source.display()
            )));
        }
    }

    Ok(())
}

/// Absolute form of `path` with `.` and `..` folded away and symlinks
/// resolved on the longest prefix that exists.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            resolved.extend(missing.iter().rev());
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return lexical.clone(),
        }
    }
}
