//! Structured logging.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the default
//! passed in (`--debug` on the command line raises it to debug).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "companion_core=info";

/// Install the global subscriber. Call once, early in `main`.
pub fn init(debug: bool) {
    let fallback = if debug { "companion_core=debug" } else { DEFAULT_FILTER };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
