//! Subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a text file aloud, sentence by sentence
    ///
    /// While reading, type a command and press Enter:
    /// p pause, r resume, s skip, x stop, g play from the start,
    /// a sentence number to hear that sentence, q quit.
    Read {
        /// Text file to read, or `-` for stdin
        file: PathBuf,

        /// Exit when playback finishes instead of waiting for commands
        #[arg(long)]
        no_interactive: bool,
    },

    /// Speak the given text once
    Say {
        /// Text to speak
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List the voices the engine offers
    Voices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
