//! Quire Core Library
//!
//! Configuration, source documents, global data and error handling for the
//! Quire template pipeline.

pub mod config;
pub mod data;
pub mod document;
pub mod error;
pub mod source;

pub use config::{AssetMount, Config, DocumentErrorPolicy, PageErrorPolicy};
pub use data::{DataFormat, DataStore, MergeMode};
pub use document::{BODY_KEY, Document, FrontMatterFormat, Metadata, RAW_BODY_KEY};
pub use error::{CoreError, Result};
