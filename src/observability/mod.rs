//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (reload and dispatch counters)
//!
//! Consumers:
//!     → stderr through the fmt subscriber installed by the binary
//!     → whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Library code only emits; installing subscribers and recorders is left
//!   to the binary or the embedding application
//! - Metrics without an installed recorder are no-ops

pub mod logging;
pub mod metrics;
