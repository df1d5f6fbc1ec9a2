//! CLI composition root.
//!
//! Resolves settings, picks the speech engine and hands both to the
//! handlers through [`CliContext`].

use std::sync::Arc;

use readaloud_core::SpeechEngine;
#[cfg(unix)]
use readaloud_player::EspeakEngine;
use readaloud_player::{PlaybackController, PlayerConfig, SimulatedEngine};

use crate::error::CliError;
use crate::parser::{Cli, EngineKind};
use crate::settings_file;

/// Everything a handler needs to run.
pub struct CliContext {
    pub engine: Arc<dyn SpeechEngine>,
    pub config: PlayerConfig,
}

impl CliContext {
    /// Create a controller over `segments` on this context's engine.
    pub fn controller(&self, segments: Vec<String>) -> PlaybackController {
        PlaybackController::new(segments, Arc::clone(&self.engine), self.config.clone())
    }

    /// Fail with [`CliError::Unavailable`] when the engine cannot speak.
    pub fn ensure_available(&self) -> Result<(), CliError> {
        if self.engine.is_available() {
            Ok(())
        } else {
            Err(CliError::Unavailable(format!(
                "{} engine is not available",
                self.engine.name()
            )))
        }
    }
}

/// Build the [`CliContext`] for a parsed command line.
pub fn bootstrap(cli: &Cli) -> Result<CliContext, CliError> {
    let update = settings_file::resolve(cli.settings.as_deref(), cli.voice.to_update())?;
    let config = PlayerConfig::from_update(&update);
    let engine = build_engine(cli.engine)?;
    tracing::debug!(engine = engine.name(), params = ?config.params, "Bootstrapped");
    Ok(CliContext { engine, config })
}

fn build_engine(kind: EngineKind) -> Result<Arc<dyn SpeechEngine>, CliError> {
    match kind {
        EngineKind::Simulated => Ok(Arc::new(SimulatedEngine::new())),
        #[cfg(unix)]
        EngineKind::Espeak => Ok(Arc::new(EspeakEngine::locate()?)),
        #[cfg(not(unix))]
        EngineKind::Espeak => Err(CliError::Unavailable(
            "the espeak-ng engine is only supported on unix".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_bootstrap_simulated_with_flags() {
        let cli = Cli::parse_from([
            "readaloud",
            "--engine",
            "simulated",
            "--lang",
            "en-US",
            "--pitch",
            "1.5",
            "voices",
        ]);
        let ctx = bootstrap(&cli).unwrap();
        assert_eq!(ctx.engine.name(), "simulated");
        assert!(ctx.ensure_available().is_ok());
        assert_eq!(ctx.config.params.lang(), "en-US");
        assert!((ctx.config.params.pitch() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bootstrap_missing_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let cli = Cli::parse_from([
            "readaloud",
            "--engine",
            "simulated",
            "--settings",
            path.to_str().unwrap(),
            "voices",
        ]);
        let err = bootstrap(&cli).err().unwrap();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn test_unavailable_engine_is_reported() {
        let ctx = CliContext {
            engine: Arc::new(SimulatedEngine::builder().unavailable().build()),
            config: PlayerConfig::default(),
        };
        let err = ctx.ensure_available().unwrap_err();
        assert_eq!(err.exit_code(), 69);
    }
}
