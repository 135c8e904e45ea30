//! Error types for the subsync-cli application.
//!
//! This module defines the `SubSyncError` enum covering the error
//! conditions that can occur at the core's external boundaries (file I/O,
//! configuration loading). Per the core's error taxonomy, parse anomalies
//! and solver rejections (insufficient points, out-of-bounds fit) are not
//! exceptions — they accumulate as [`crate::core::caption::CaptionList`]
//! anomalies or surface as part of the human-readable decision string
//! returned by [`crate::core::sync::Synchronizer::analyze`].
use thiserror::Error;

/// Represents all possible errors in the subsync-cli application.
#[derive(Error, Debug)]
pub enum SubSyncError {
    /// I/O operation failed during file system access.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error due to invalid or missing settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Subtitle format error: a genuinely unrecoverable structural problem,
    /// distinct from the recoverable anomalies repair absorbs.
    #[error("Subtitle format error [{format}]: {message}")]
    SubtitleFormat {
        /// The subtitle format that caused the error (always "SRT" today)
        format: String,
        /// Detailed error message describing the issue
        message: String,
    },

    /// Generic command execution / usage error, reported to the CLI.
    #[error("{0}")]
    CommandExecution(String),

    /// Catch-all error variant wrapping any other failure.
    #[error("Unknown error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Specialized `Result` type for subsync-cli operations.
pub type SubSyncResult<T> = Result<T, SubSyncError>;

impl SubSyncError {
    /// Create a configuration error with the given message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        SubSyncError::Config {
            message: message.into(),
        }
    }

    /// Create a subtitle format error for the given format and message.
    pub fn subtitle_format<S1, S2>(format: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        SubSyncError::SubtitleFormat {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Return the corresponding process exit code for this error variant.
    ///
    /// Per the CLI surface spec, usage errors exit `15`; everything else
    /// maps to a small non-zero code distinguishing the failing boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            SubSyncError::CommandExecution(_) => 15,
            SubSyncError::Io(_) => 1,
            SubSyncError::Config { .. } => 2,
            SubSyncError::SubtitleFormat { .. } => 4,
            SubSyncError::Other(_) => 1,
        }
    }

    /// Return a user-friendly error message with a suggested remedy.
    pub fn user_friendly_message(&self) -> String {
        match self {
            SubSyncError::Io(e) => format!("File operation error: {}", e),
            SubSyncError::Config { message } => {
                format!("Configuration error: {}\nHint: check config.toml", message)
            }
            SubSyncError::SubtitleFormat { message, .. } => {
                format!("Subtitle error: {}\nHint: check file encoding", message)
            }
            SubSyncError::CommandExecution(msg) => msg.clone(),
            SubSyncError::Other(err) => format!("Unknown error: {}", err),
        }
    }
}

impl From<config::ConfigError> for SubSyncError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(path) => SubSyncError::Config {
                message: format!("Configuration file not found: {}", path),
            },
            config::ConfigError::Message(msg) => SubSyncError::Config { message: msg },
            _ => SubSyncError::Config {
                message: format!("Configuration error: {}", err),
            },
        }
    }
}
