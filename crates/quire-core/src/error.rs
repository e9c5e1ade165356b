//! Error types for the Quire core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types for Quire.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration loading or validation error.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Front matter or data file could not be decoded.
    #[error("Malformed metadata in {path}: {cause}")]
    MalformedMetadata { path: PathBuf, cause: String },

    /// File system error tied to a specific path.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A glob pattern could not be compiled or walked.
    #[error("Invalid glob pattern `{pattern}`: {message}")]
    Glob { pattern: String, message: String },

    /// A pattern that is required to match something matched nothing.
    #[error("No files matched `{pattern}`")]
    NoMatch { pattern: String },

    /// Generic configuration crate error.
    #[error("Config crate error: {0}")]
    ConfigCrate(#[from] config::ConfigError),
}

impl CoreError {
    /// Create a new configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new configuration error with source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new malformed metadata error.
    pub fn malformed(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::MalformedMetadata {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    /// Wrap an IO error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a new glob error.
    pub fn glob(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::Glob {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    /// The file this error originated from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::MalformedMetadata { path, .. } | Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CoreError::config("missing field");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_malformed_metadata_error() {
        let err = CoreError::malformed("src/pages/index.hbs", "did not find expected key");
        assert!(err.to_string().contains("Malformed metadata"));
        assert!(err.to_string().contains("src/pages/index.hbs"));
        assert_eq!(
            err.path(),
            Some(std::path::Path::new("src/pages/index.hbs"))
        );
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CoreError::io("src/config/site.yml", io_err);
        assert!(err.to_string().contains("IO error"));
        assert!(err.to_string().contains("site.yml"));
    }

    #[test]
    fn test_no_match_error() {
        let err = CoreError::NoMatch {
            pattern: "src/pages/*.hbs".to_string(),
        };
        assert!(err.to_string().contains("src/pages/*.hbs"));
        assert!(err.path().is_none());
    }
}
