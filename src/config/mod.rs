//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! bundled default, config.toml, config.<profile>.toml, program arguments
//!     → layer.rs (parse each source into a tree, merge by priority)
//!     → substitution.rs (expand ${...} references)
//!     → schema.rs (deserialize into Config)
//!     → validation.rs (semantic checks, unknown keys)
//!     → Config (validated, immutable)
//!     → shared via Arc from ConfigManager
//!
//! On file change:
//!     watcher.rs detects change
//!     → manager.rs coalesces the burst, re-resolves the same files
//!     → identical snapshot: dropped
//!     → different snapshot: atomic swap, reload callback
//!     → failure: reload callback with the error, snapshot kept
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The watched file list is fixed by the initial read

pub mod error;
pub mod layer;
pub mod loader;
pub mod manager;
pub mod schema;
pub mod substitution;
pub mod validation;
pub mod watcher;

pub use error::ConfigError;
pub use layer::{ConfigLayer, LayerOrigin, LayerSource, OverrideLayer};
pub use loader::{ConfigResolver, LoadResult, WatchedFileSet};
pub use manager::{ConfigManager, ReloadOutcome};
pub use schema::Config;
pub use schema::HandlerDefinition;
pub use validation::ValidationError;
