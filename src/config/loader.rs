//! Configuration loading from disk.
//!
//! Resolves layered configuration into a validated [`Config`] snapshot:
//!
//! ```text
//! program arguments > profiles (request order) > config.toml > bundled default
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use toml::{Table, Value};

use crate::config::error::ConfigError;
use crate::config::layer::{
    is_readable, merge_layers, with_fallback, BundledDefaultLayer, ConfigLayer, FileLayer, LayerOrigin,
    LayerSource, OverrideLayer, DEFAULT_CONFIG,
};
use crate::config::schema::Config;
use crate::config::substitution::substitute;
use crate::config::validation::{validate_config, warn_unknown_keys};

/// Main config file name inside the config directory.
pub const MAIN_CONFIG_FILE: &str = "config.toml";

/// Profile config file name for `profile`.
pub fn profile_config_file(profile: &str) -> String {
    format!("config.{}.toml", profile)
}

/// Result of the initial read.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub snapshot: Arc<Config>,
    /// Requested profiles whose files were actually read, in request order.
    pub loaded_profile_names: Vec<String>,
}

/// The backing files of the active snapshot, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchedFileSet {
    files: Vec<FileLayer>,
}

impl WatchedFileSet {
    pub fn layers(&self) -> &[FileLayer] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Everything the initial read produced.
#[derive(Debug, Clone)]
pub struct InitialRead {
    pub result: LoadResult,
    pub watched: WatchedFileSet,
}

/// Resolves layered configuration for one config directory.
///
/// The program-argument layer is parsed once on construction and reused for
/// every later resolution.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    config_dir: PathBuf,
    overrides: OverrideLayer,
}

impl ConfigResolver {
    pub fn new(config_dir: impl Into<PathBuf>, program_args: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let overrides = OverrideLayer::try_from(program_args)?;
        Ok(Self {
            config_dir: config_dir.into(),
            overrides,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn main_config_path(&self) -> PathBuf {
        self.config_dir.join(MAIN_CONFIG_FILE)
    }

    pub fn profile_config_path(&self, profile: &str) -> PathBuf {
        self.config_dir.join(profile_config_file(profile))
    }

    /// Bootstrap the main file if needed, pick readable profile files and
    /// resolve the first snapshot.
    pub fn initial_read(&self, profile_names: &[String]) -> Result<InitialRead, ConfigError> {
        let main_path = self.main_config_path();
        ensure_main_config(&self.config_dir, &main_path)?;

        let mut files = Vec::with_capacity(profile_names.len() + 1);
        let mut loaded_profile_names = Vec::new();
        for name in profile_names {
            let path = self.profile_config_path(name);
            if !is_readable(&path) {
                tracing::warn!(path = %path.display(), profile = %name, "Config file for the requested profile is not accessible");
                continue;
            }
            files.push(FileLayer::new(LayerOrigin::Profile(name.clone()), path));
            loaded_profile_names.push(name.clone());
        }
        files.push(FileLayer::new(LayerOrigin::Main, main_path));

        let watched = WatchedFileSet { files };
        let snapshot = self.resolve(&watched)?;
        tracing::debug!(?snapshot, "Read config");

        Ok(InitialRead {
            result: LoadResult {
                snapshot: Arc::new(snapshot),
                loaded_profile_names,
            },
            watched,
        })
    }

    /// Resolve a snapshot from `files` plus the cached program arguments and
    /// the bundled default.
    pub fn resolve(&self, files: &WatchedFileSet) -> Result<Config, ConfigError> {
        let mut layers: Vec<ConfigLayer> = Vec::with_capacity(files.len() + 1);
        for file in files.layers() {
            layers.push(file.load()?);
        }
        layers.push(BundledDefaultLayer.load()?);

        let base = merge_layers(layers);
        let merged = with_fallback(self.overrides.typed_against(&base), base);
        resolve_tree(&merged)
    }
}

/// Expand references, deserialize, validate and check for unknown keys.
pub fn resolve_tree(merged: &Table) -> Result<Config, ConfigError> {
    let resolved = substitute(merged)?;
    let config = Value::Table(resolved.clone())
        .try_into::<Config>()
        .map_err(|source| ConfigError::Parse {
            origin: "resolved configuration".to_string(),
            source,
        })?;

    validate_config(&resolved)?;
    warn_unknown_keys(&resolved);

    Ok(config)
}

fn ensure_main_config(dir: &Path, path: &Path) -> Result<(), ConfigError> {
    if is_readable(path) {
        return Ok(());
    }

    tracing::info!(path = %path.display(), "Main config file is not accessible, creating a default config file");
    create_default_config(dir, path).map_err(|source| ConfigError::Bootstrap {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Created a default config file");
    Ok(())
}

fn create_default_config(dir: &Path, path: &Path) -> std::io::Result<()> {
    if !dir.is_dir() {
        tracing::info!(dir = %dir.display(), "Creating the config directory");
        fs::create_dir_all(dir)?;
    }
    // Never clobber an existing but unreadable file.
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())?;
    file.sync_all()
}
