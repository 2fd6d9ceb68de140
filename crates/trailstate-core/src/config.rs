//! # Engine Configuration
//!
//! TOML-backed settings for the engine: timestamp cleaning formats, input
//! limits and logging. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! time_formats = ["%m/%d/%Y %I:%M:%S %p"]
//! max_rows = 500000
//!
//! [logging]
//! format = "json"
//! filter = "trailstate_core=debug"
//! ```

use crate::TrailError;
use crate::primitives::{
    DEFAULT_CLEAN_TIME_FORMAT, DEFAULT_TIME_FORMATS, MAX_EXPRESSION_LENGTH, MAX_IMPORT_ROWS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable selecting the log output format (`text` or `json`).
pub const LOG_FORMAT_ENV: &str = "TRAILSTATE_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging settings consumed by [`crate::logging::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format of the fmt layer.
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "trailstate_core=info".to_string(),
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// chrono formats tried in order when cleaning the Time column.
    pub time_formats: Vec<String>,
    /// Format TimeClean cells are persisted with.
    pub clean_time_format: String,
    /// Largest import accepted, in rows.
    pub max_rows: usize,
    /// Longest condition expression accepted, in bytes.
    pub max_expression_length: usize,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_formats: DEFAULT_TIME_FORMATS.iter().map(|f| (*f).to_string()).collect(),
            clean_time_format: DEFAULT_CLEAN_TIME_FORMAT.to_string(),
            max_rows: MAX_IMPORT_ROWS,
            max_expression_length: MAX_EXPRESSION_LENGTH,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, TrailError> {
        let config: Self =
            toml::from_str(source).map_err(|e| TrailError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TrailError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| TrailError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let format = std::env::var(LOG_FORMAT_ENV).ok();
        self.with_log_format_override(format.as_deref())
    }

    /// Apply a log format override; unknown names are ignored.
    #[must_use]
    pub fn with_log_format_override(mut self, format: Option<&str>) -> Self {
        if let Some(format) = format.and_then(LogFormat::parse) {
            self.logging.format = format;
        }
        self
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), TrailError> {
        if self.time_formats.iter().all(|f| f.trim().is_empty()) {
            return Err(TrailError::Config(
                "time_formats must contain at least one format".to_string(),
            ));
        }
        if self.clean_time_format.trim().is_empty() {
            return Err(TrailError::Config(
                "clean_time_format must not be empty".to_string(),
            ));
        }
        if self.max_rows == 0 {
            return Err(TrailError::Config("max_rows must be positive".to_string()));
        }
        if self.max_expression_length == 0 {
            return Err(TrailError::Config(
                "max_expression_length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
