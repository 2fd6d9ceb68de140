//! # Logging
//!
//! Installs the global tracing subscriber for an embedding application.
//!
//! The engine itself only emits `tracing` events; whoever hosts it decides
//! whether and how they are printed. `RUST_LOG` takes precedence over the
//! configured filter.

use crate::TrailError;
use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global subscriber with a text or JSON fmt layer.
///
/// Returns `TrailError::Config` if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), TrailError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };

    result.map_err(|e| TrailError::Config(format!("cannot install tracing subscriber: {}", e)))
}
