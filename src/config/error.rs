//! Error types for configuration resolution and reload.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors produced while reading, resolving or watching configuration.
///
/// During the initial read these are returned to the caller and abort
/// startup. During reload they are only delivered through the reload
/// callback.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The main config file was missing and a default could not be written.
    #[error("failed to create a default config file at '{}': {source}", path.display())]
    Bootstrap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing layer file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A layer was not valid TOML, or the resolved tree did not fit the schema.
    #[error("parse error in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    /// A `${...}` reference could not be expanded.
    #[error("could not resolve '${{{reference}}}' at '{key}': {reason}")]
    Resolution {
        key: String,
        reference: String,
        reason: String,
    },

    /// A semantic rule was violated.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Program arguments could not be turned into a configuration layer.
    #[error("failed to read program arguments into a config layer: {0}")]
    OverrideLayer(String),

    /// The file watcher could not be established.
    #[error("failed to watch config files: {0}")]
    Watch(#[from] notify::Error),

    /// The reload task needs a Tokio runtime.
    #[error("config watching requires a running Tokio runtime")]
    NoRuntime,
}
