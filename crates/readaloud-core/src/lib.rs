//! Core domain types and port definitions for readaloud.
//!
//! This crate holds the pieces every other crate agrees on: validated voice
//! parameters, partial settings updates, the [`SpeechEngine`] port with its
//! utterance event types, and sentence segmentation. It carries no runtime
//! policy; sequencing lives in `readaloud-player`.

#![deny(unused_crate_dependencies)]

pub mod error;
pub mod ports;
pub mod settings;
pub mod text;
pub mod voice;

// Re-export commonly used types for convenience
pub use error::{EngineError, SettingsError};
pub use ports::{
    EngineEvent, SpeechEngine, Utterance, UtteranceEventKind, UtteranceEvents, UtteranceId,
    prepare_utterance,
};
pub use settings::{RECOGNIZED_KEYS, SettingsMap, VoiceParamsUpdate};
pub use text::split_segments;
pub use voice::{
    DEFAULT_LANG, PITCH_RANGE, RATE_RANGE, VOLUME_RANGE, Voice, VoiceParams, lang_matches,
    resolve_voice,
};

// tokio-test drives channel futures in the port tests
#[cfg(test)]
use tokio_test as _;
