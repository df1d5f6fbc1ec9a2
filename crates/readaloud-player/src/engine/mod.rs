//! Speech engine adapters.
//!
//! - [`SimulatedEngine`]: deterministic, driven by the tokio clock. Used by
//!   tests and by `readaloud --engine simulated`.
//! - [`EspeakEngine`] (unix): one `espeak-ng` child process per utterance.

#[cfg(unix)]
pub mod espeak;
pub mod simulated;

#[cfg(unix)]
pub use espeak::EspeakEngine;
pub use simulated::{SimulatedEngine, SimulatedEngineBuilder};
