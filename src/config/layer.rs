//! Configuration layers and fallback merging.
//!
//! A layer is one named source of a partial configuration tree. Layers are
//! merged highest priority first: program arguments, profiles in request
//! order, the main file, then the bundled default.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::config::error::ConfigError;

/// Bundled default configuration, also used to synthesize a missing main file.
pub const DEFAULT_CONFIG: &str = include_str!("../../resources/config.default.toml");

/// Where a layer's values came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOrigin {
    ProgramArguments,
    Profile(String),
    Main,
    BundledDefault,
}

impl fmt::Display for LayerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerOrigin::ProgramArguments => write!(f, "program arguments"),
            LayerOrigin::Profile(name) => write!(f, "profile '{}'", name),
            LayerOrigin::Main => write!(f, "main"),
            LayerOrigin::BundledDefault => write!(f, "bundled default"),
        }
    }
}

/// An unresolved tree fragment together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub origin: LayerOrigin,
    pub tree: Table,
}

/// A source that can produce a configuration layer.
pub trait LayerSource {
    fn origin(&self) -> LayerOrigin;

    fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// A layer backed by a TOML file.
///
/// A file that does not exist loads as an empty layer. Callers that must
/// not tolerate that (the initial read) check readability beforehand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayer {
    pub origin: LayerOrigin,
    pub path: PathBuf,
}

impl FileLayer {
    pub fn new(origin: LayerOrigin, path: impl Into<PathBuf>) -> Self {
        Self {
            origin,
            path: path.into(),
        }
    }
}

impl LayerSource for FileLayer {
    fn origin(&self) -> LayerOrigin {
        self.origin.clone()
    }

    fn load(&self) -> Result<ConfigLayer, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), origin = %self.origin, "Config file is missing, treating it as empty");
                String::new()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let tree = parse_tree(&content, &self.origin)?;
        Ok(ConfigLayer {
            origin: self.origin.clone(),
            tree,
        })
    }
}

/// The bundled default layer. Has no backing file.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledDefaultLayer;

impl LayerSource for BundledDefaultLayer {
    fn origin(&self) -> LayerOrigin {
        LayerOrigin::BundledDefault
    }

    fn load(&self) -> Result<ConfigLayer, ConfigError> {
        Ok(ConfigLayer {
            origin: LayerOrigin::BundledDefault,
            tree: parse_tree(DEFAULT_CONFIG, &LayerOrigin::BundledDefault)?,
        })
    }
}

/// Program-argument overrides: dotted keys mapped to raw string values.
///
/// Built once at startup and reused verbatim on every reload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverrideLayer {
    tree: Table,
}

impl OverrideLayer {
    /// Build the layer from `dotted.key -> value` pairs.
    ///
    /// Fails on empty key segments and on keys that are both a value and a
    /// parent of another key (`a = 1` alongside `a.b = 2`).
    pub fn from_dotted<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut tree = Table::new();
        for (key, value) in entries {
            let key = key.as_ref();
            let segments: Vec<&str> = key.split('.').collect();
            if segments.iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::OverrideLayer(format!(
                    "'{}' is not a valid dotted key",
                    key
                )));
            }
            insert_dotted(&mut tree, &segments, Value::String(value.into())).map_err(|conflict| {
                ConfigError::OverrideLayer(format!("'{}' conflicts with '{}'", key, conflict))
            })?;
        }
        Ok(Self { tree })
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The override tree with each string coerced to the type of the value
    /// it overrides in `base`. Keys `base` does not define stay strings.
    pub fn typed_against(&self, base: &Table) -> Table {
        coerce_table(&self.tree, Some(base))
    }
}

impl LayerSource for OverrideLayer {
    fn origin(&self) -> LayerOrigin {
        LayerOrigin::ProgramArguments
    }

    fn load(&self) -> Result<ConfigLayer, ConfigError> {
        Ok(ConfigLayer {
            origin: LayerOrigin::ProgramArguments,
            tree: self.tree.clone(),
        })
    }
}

impl TryFrom<&BTreeMap<String, String>> for OverrideLayer {
    type Error = ConfigError;

    fn try_from(args: &BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_dotted(args.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }
}

/// Parse a TOML document into a tree.
pub fn parse_tree(content: &str, origin: &LayerOrigin) -> Result<Table, ConfigError> {
    content.parse::<Table>().map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Whether a file exists and can be opened for reading.
pub fn is_readable(path: &Path) -> bool {
    path.is_file() && fs::File::open(path).is_ok()
}

/// Merge `lower` underneath `higher`.
///
/// Tables merge key by key; any other value in `higher` wins wholesale.
pub fn with_fallback(mut higher: Table, lower: Table) -> Table {
    for (key, low) in lower {
        match higher.get_mut(&key) {
            None => {
                higher.insert(key, low);
            }
            Some(Value::Table(high)) => {
                if let Value::Table(low) = low {
                    let merged = with_fallback(std::mem::take(high), low);
                    *high = merged;
                }
            }
            Some(_) => {}
        }
    }
    higher
}

/// Fold layers, given highest priority first, into one tree.
pub fn merge_layers(layers: impl IntoIterator<Item = ConfigLayer>) -> Table {
    layers
        .into_iter()
        .fold(Table::new(), |acc, layer| with_fallback(acc, layer.tree))
}

fn insert_dotted(tree: &mut Table, segments: &[&str], value: Value) -> Result<(), String> {
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Err(String::new()),
    };
    let mut node = tree;
    for (depth, segment) in parents.iter().enumerate() {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        node = match entry {
            Value::Table(t) => t,
            _ => return Err(segments[..=depth].join(".")),
        };
    }
    if node.contains_key(*last) {
        return Err(segments.join("."));
    }
    node.insert(last.to_string(), value);
    Ok(())
}

fn coerce_table(overrides: &Table, base: Option<&Table>) -> Table {
    overrides
        .iter()
        .map(|(key, value)| {
            let existing = base.and_then(|b| b.get(key));
            let coerced = match value {
                Value::Table(nested) => {
                    let nested_base = match existing {
                        Some(Value::Table(t)) => Some(t),
                        _ => None,
                    };
                    Value::Table(coerce_table(nested, nested_base))
                }
                Value::String(raw) => coerce_scalar(raw, existing),
                other => other.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

fn coerce_scalar(raw: &str, existing: Option<&Value>) -> Value {
    let keep = || Value::String(raw.to_string());
    match existing {
        Some(Value::Boolean(_)) => parse_bool(raw).map(Value::Boolean).unwrap_or_else(keep),
        Some(Value::Integer(_)) => raw.trim().parse().map(Value::Integer).unwrap_or_else(|_| keep()),
        Some(Value::Float(_)) => raw.trim().parse().map(Value::Float).unwrap_or_else(|_| keep()),
        Some(Value::Array(_)) | Some(Value::Table(_)) => parse_literal(raw).unwrap_or_else(keep),
        Some(Value::String(_)) | Some(Value::Datetime(_)) | None => keep(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an inline TOML literal such as `["a", "b"]` or `{ x = 1 }`.
fn parse_literal(raw: &str) -> Option<Value> {
    format!("v = {}", raw)
        .parse::<Table>()
        .ok()
        .and_then(|mut t| t.remove("v"))
}
