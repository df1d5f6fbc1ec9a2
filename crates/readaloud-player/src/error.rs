//! Player error types.

use readaloud_core::EngineError;
use thiserror::Error;

/// Errors raised while setting up playback.
///
/// Runtime failures of individual utterances are not errors at this level;
/// the controller logs them and moves on to the next segment.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The speech engine binary could not be located.
    #[error("Speech engine not found: {0}")]
    EngineNotFound(String),

    /// The speech engine failed while being set up.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
