//! Error types for the automation bridge
//!
//! The bridge distinguishes two failure shapes: an outbound command that the
//! automation application rejected (a typed `Err`), and a wait that never saw
//! its event (a non-fatal `false`/empty result, logged as a warning). Only the
//! former travels through this module.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the automation bridge
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Event receiver already taken; a client can back only one session")]
    EventChannelUnavailable,

    #[error("Automation command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    // === Measurement Errors ===
    #[error("Callable function '{0}' is not resolved. Start a measurement first")]
    FunctionNotResolved(String),

    // === Test Setup Errors ===
    #[error("Test module '{0}' not found in the loaded configuration")]
    ModuleNotFound(String),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a command failed error
    pub fn command_failed(command: &str, message: &str) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            message: message.to_string(),
        }
    }
}
