//! Main CLI parser and top-level argument handling.
//!
//! Voice flags fall back to `READALOUD_*` environment variables (a `.env`
//! file is loaded first) and override values from `--settings`.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};
use readaloud_core::{PITCH_RANGE, RATE_RANGE, VOLUME_RANGE, VoiceParamsUpdate};

use crate::commands::Commands;

/// Command-line interface for sentence-by-sentence text-to-speech.
#[derive(Parser, Debug)]
#[command(name = "readaloud")]
#[command(about = "Read text aloud, one sentence at a time")]
#[command(version)]
pub struct Cli {
    /// Speech engine
    #[arg(
        long,
        value_enum,
        global = true,
        default_value_t = EngineKind::Espeak,
        env = "READALOUD_ENGINE"
    )]
    pub engine: EngineKind,

    /// JSON settings file with lang, voice, pitch, rate and volume keys
    #[arg(long, global = true, env = "READALOUD_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(flatten)]
    pub voice: VoiceArgs,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available speech engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineKind {
    /// espeak-ng child process (unix)
    Espeak,
    /// Silent, clock-driven engine for dry runs
    Simulated,
}

/// Voice parameter overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct VoiceArgs {
    /// Language tag, e.g. zh-CN or en-US
    #[arg(long, global = true, env = "READALOUD_LANG")]
    pub lang: Option<String>,

    /// Voice name as listed by `readaloud voices`
    #[arg(long, global = true, env = "READALOUD_VOICE")]
    pub voice: Option<String>,

    /// Pitch, 0 to 2
    #[arg(long, global = true, env = "READALOUD_PITCH", value_parser = parse_pitch)]
    pub pitch: Option<f32>,

    /// Speaking rate multiplier, 0.1 to 10
    #[arg(long, global = true, env = "READALOUD_RATE", value_parser = parse_rate)]
    pub rate: Option<f32>,

    /// Volume, 0 to 1
    #[arg(long, global = true, env = "READALOUD_VOLUME", value_parser = parse_volume)]
    pub volume: Option<f32>,
}

impl VoiceArgs {
    pub fn to_update(&self) -> VoiceParamsUpdate {
        VoiceParamsUpdate {
            lang: self.lang.clone(),
            voice: self.voice.clone(),
            pitch: self.pitch,
            rate: self.rate,
            volume: self.volume,
        }
    }
}

fn parse_pitch(value: &str) -> Result<f32, String> {
    parse_in_range(value, &PITCH_RANGE)
}

fn parse_rate(value: &str) -> Result<f32, String> {
    parse_in_range(value, &RATE_RANGE)
}

fn parse_volume(value: &str) -> Result<f32, String> {
    parse_in_range(value, &VOLUME_RANGE)
}

fn parse_in_range(value: &str, range: &RangeInclusive<f32>) -> Result<f32, String> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if parsed.is_finite() && range.contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!(
            "{parsed} is outside {}..={}",
            range.start(),
            range.end()
        ))
    }
}
