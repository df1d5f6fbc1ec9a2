//! Controller configuration and fixed timing constants.

use std::time::Duration;

use readaloud_core::{VoiceParams, VoiceParamsUpdate};

/// Pause between the end of one segment and the start of the next.
pub const INTER_SEGMENT_DELAY: Duration = Duration::from_millis(200);

/// Delay between cancelling the engine and issuing the next `speak`.
///
/// Engines can drop a request that arrives right after a cancel.
pub const SPEAK_DELAY: Duration = Duration::from_millis(50);

/// Keep-alive period while an utterance is speaking.
pub const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);

/// Configuration passed to [`PlaybackController::new`](crate::PlaybackController::new).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerConfig {
    /// Initial voice parameters.
    pub params: VoiceParams,
}

impl PlayerConfig {
    /// Default configuration with `update` applied on top.
    ///
    /// Invalid values in `update` are dropped and the defaults kept.
    pub fn from_update(update: &VoiceParamsUpdate) -> Self {
        let mut params = VoiceParams::default();
        params.apply(update);
        Self { params }
    }
}
