//! Command-line host for readaloud.
//!
//! Supplies the segment list to a [`PlaybackController`](readaloud_player::PlaybackController),
//! maps terminal input to playback commands and prints segment progress.
//! `main.rs` is the composition root; everything testable lives here.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by main.rs only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod controls;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod settings_file;

// Re-export primary types for convenient access
pub use bootstrap::{CliContext, bootstrap};
pub use commands::Commands;
pub use controls::{Control, Flow};
pub use error::CliError;
pub use parser::{Cli, EngineKind, VoiceArgs};
