//! Configuration and event backbone for the desktop companion.
//!
//! - [`config`]: layered resolution, validation and hot reload
//! - [`events`]: handler binding and command templating
//! - [`observability`]: logging setup and metrics

pub mod config;
pub mod events;
pub mod observability;

pub use config::{Config, ConfigError, ConfigManager, LoadResult};
pub use events::{EventHandler, EventHandlerModel};
