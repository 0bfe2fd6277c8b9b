//! Error type for the runner.

use thiserror::Error;

/// Errors that end a `mysb` command.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Socket or file error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] mysb_bridge::ConfigError),

    /// Firmware could not be resolved or loaded.
    #[error(transparent)]
    Firmware(#[from] mysb_firmware::FirmwareError),

    /// JSON output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Metrics exporter could not start.
    #[error("Metrics exporter error: {0}")]
    Metrics(String),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
