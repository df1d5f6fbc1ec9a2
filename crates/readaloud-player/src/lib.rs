//! Sequential, interruptible text-to-speech playback.
//!
//! [`PlaybackController`] walks an ordered list of text segments and speaks
//! them one at a time through a [`SpeechEngine`](readaloud_core::SpeechEngine).
//! It keeps long utterances alive with a watchdog, drops duplicate engine
//! completions, and fences every continuation to the playback run that
//! scheduled it so that `play()` followed by `play()` never yields two
//! interleaved chains.
//!
//! ```text
//!   Idle ──play──▶ Playing ──pause──▶ Paused
//!                   │  ▲ ◀──resume──────┘
//!       exhausted / │  │ play
//!          reset    ▼  │
//!                  Stopped
//! ```
//!
//! Engine adapters live in [`engine`]: a deterministic [`SimulatedEngine`]
//! driven by the tokio clock, and an `espeak-ng` backed [`EspeakEngine`] on
//! unix.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
mod run;
mod sequencer;
pub mod state;
mod watchdog;

pub use config::{INTER_SEGMENT_DELAY, PlayerConfig, SPEAK_DELAY, WATCHDOG_PERIOD};
pub use controller::{EndCallback, PlaybackController, SegmentCallback};
#[cfg(unix)]
pub use engine::EspeakEngine;
pub use engine::{SimulatedEngine, SimulatedEngineBuilder};
pub use error::PlayerError;
pub use state::{PlaybackState, PlaybackStatus};
