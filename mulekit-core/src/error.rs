//! Error types for core operations

use std::path::PathBuf;

/// Errors raised by the core transformation, backup and descriptor layers
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project descriptor {path} has no <{field}> element")]
    Descriptor { path: PathBuf, field: &'static str },

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Failed to parse config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No runtime found: {0}")]
    RuntimeNotFound(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
