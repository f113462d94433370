//! Error types for localis.

use std::path::PathBuf;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Carrier lookup error: {0}")]
    Carrier(#[from] CarrierError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),
}

/// Configuration-related errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the `receive` subscription.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Failures of a one-shot transport command.
///
/// These never escape the pipeline: they are folded into
/// [`ActionOutcome::Failed`](crate::actions::ActionOutcome) and logged.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("{operation} exited with status {code}: {stderr}")]
    NonZeroExit {
        operation: String,
        code: i32,
        stderr: String,
    },
}

/// Carrier lookup failures. Always resolved by failing open.
#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("Lookup request failed: {0}")]
    Request(String),

    #[error("Lookup timed out")]
    Timeout,

    #[error("Lookup returned HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed lookup response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CarrierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CarrierError::Timeout
        } else if e.is_decode() {
            CarrierError::Malformed(e.to_string())
        } else {
            CarrierError::Request(e.to_string())
        }
    }
}

/// One-time profile setup errors.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Failed to write marker {}: {source}", path.display())]
    MarkerWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
