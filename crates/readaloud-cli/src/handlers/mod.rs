//! Command handlers for the CLI.
//!
//! Each handler takes the [`CliContext`](crate::CliContext) plus its
//! subcommand arguments.

pub mod read;
pub mod say;
pub mod voices;
