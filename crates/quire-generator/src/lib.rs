//! Quire Generator Library
//!
//! Page assembly engine for Quire.
//!
//! # Modules
//!
//! - [`template`] - Compiled templates, layouts and the shared registry
//! - [`helpers`] - Built-in `md-pages` and `markdown` helpers
//! - [`context`] - Layered render contexts
//! - [`aggregate`] - Multi-document collections
//! - [`assets`] - Static asset copying
//! - [`build`] - Build orchestration

pub mod aggregate;
pub mod assets;
pub mod build;
pub mod context;
pub mod helpers;
pub mod template;

pub use aggregate::{AggregateError, Aggregator};
pub use assets::{AssetCopier, AssetError};
pub use build::{BuildError, BuildStats, Builder, PageFailure, RenderedPage, Site};
pub use context::{ContextBuilder, RenderContext};
pub use template::{CompiledTemplate, Layout, Renderable, TemplateError, TemplateResolver};
