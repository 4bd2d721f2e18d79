use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::errors::ConfigValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base log level: error, warn, info, debug or trace.
    pub level: String,

    /// Output format: pretty or json.
    pub format: String,

    /// Force per-frame trace logging for the transport and frame modules
    /// regardless of the base level.
    pub trace_frames: bool,

    /// Include source file and line number in log events.
    pub include_location: bool,

    pub thread_ids: bool,
    pub thread_names: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            trace_frames: false,
            include_location: false,
            thread_ids: false,
            thread_names: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match self.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(ConfigValidationError::logging(format!(
                    "Invalid log level: {}",
                    other
                )))
            }
        }
        match self.format.to_lowercase().as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigValidationError::logging(format!(
                "Invalid log format: {}",
                other
            ))),
        }
    }

    pub fn get_level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO, // fallback
        }
    }
}
