//! Port definitions (trait abstractions) for readaloud.
//!
//! Ports define the interfaces the playback controller needs from the
//! outside world. Concrete engines implement them in adapter crates.

pub mod speech_engine;

pub use speech_engine::{
    EngineEvent, SpeechEngine, Utterance, UtteranceEventKind, UtteranceEvents, UtteranceId,
    prepare_utterance,
};

#[cfg(test)]
pub use speech_engine::MockSpeechEngine;
