//! CLI-specific error types and mappings.
//!
//! Handlers return `anyhow::Result`; errors that should pick a specific exit
//! code are raised as [`CliError`] and recovered in `main` via downcast.

use readaloud_core::SettingsError;
use readaloud_player::PlayerError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or command error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Settings file could not be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No usable speech engine.
    #[error("Speech unavailable: {0}")]
    Unavailable(String),

    /// Speech engine failure.
    #[error("Speech engine error: {0}")]
    Engine(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,    // EX_USAGE
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Engine(_) => 70,      // EX_SOFTWARE
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
        }
    }
}

impl From<PlayerError> for CliError {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::EngineNotFound(msg) => Self::Unavailable(msg),
            PlayerError::Engine(engine_err) => Self::Engine(engine_err.to_string()),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
