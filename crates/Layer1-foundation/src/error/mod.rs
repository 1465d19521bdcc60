//! Error types for Ralph Dashboard
//!
//! Every layer returns this one error type so the transport can map
//! variants onto status codes without string matching.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Ralph Dashboard error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Process lifecycle
    // ========================================================================
    #[error("Project '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Project '{0}' is not running")]
    NotRunning(String),

    #[error("Project '{0}' is not paused")]
    NotPaused(String),

    #[error("Operation not supported on this platform: {0}")]
    NotSupported(String),

    #[error("Failed to start '{project}': {message}")]
    ProcessSpawnFailed { project: String, message: String },

    #[error("Signal error: {0}")]
    Signal(String),

    // ========================================================================
    // Log streaming
    // ========================================================================
    #[error("Log file not found: {}", .0.display())]
    WatcherFileMissing(PathBuf),

    #[error("Subscriber on channel '{0}' fell too far behind and was dropped")]
    SubscriberOverloaded(String),

    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    // ========================================================================
    // Projects
    // ========================================================================
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // General
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Other
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors whose message can be shown to the dashboard user verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::AlreadyRunning(_)
                | Error::NotRunning(_)
                | Error::NotPaused(_)
                | Error::NotSupported(_)
                | Error::ProcessSpawnFailed { .. }
                | Error::ProjectNotFound(_)
                | Error::InvalidInput(_)
                | Error::InvalidChannel(_)
        )
    }

    pub fn spawn_failed(project: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProcessSpawnFailed {
            project: project.into(),
            message: message.into(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
