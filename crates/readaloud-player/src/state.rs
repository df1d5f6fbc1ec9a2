//! Playback state machine types.

use serde::{Deserialize, Serialize};

/// Current state of continuous playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing has been requested yet.
    #[default]
    Idle,

    /// Continuous sequencing is active.
    Playing,

    /// Engine paused mid-utterance; sequencing frozen.
    Paused,

    /// Explicit reset, ad-hoc speech, or the list ran out.
    Stopped,
}

impl PlaybackState {
    /// Whether a continuous run is in progress (playing or paused).
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Snapshot of the controller published after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,

    /// Cursor into the segment list. Meaningful while
    /// [`PlaybackState::is_active`].
    pub current_index: usize,

    /// Number of `play()` calls so far.
    pub generation: u64,
}
