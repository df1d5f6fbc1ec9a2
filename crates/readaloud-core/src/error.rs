//! Error types shared across readaloud crates.

use thiserror::Error;

/// Errors reported by a [`SpeechEngine`](crate::ports::SpeechEngine) implementation.
///
/// The playback controller never surfaces these to the host: a failed
/// `speak` is logged and handled as an implicit end of the utterance.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No speech capability on this platform.
    #[error("Speech engine unavailable: {0}")]
    Unavailable(String),

    /// The engine could not start synthesis (process spawn, device open).
    #[error("Failed to start speech: {0}")]
    Spawn(String),

    /// Synthesis started but failed.
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// IO error talking to the engine.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading a settings document.
///
/// Only structural problems are errors. Individual values that fail
/// validation are dropped silently, see [`VoiceParamsUpdate`](crate::settings::VoiceParamsUpdate).
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Settings must be a flat JSON object")]
    NotAnObject,
}
