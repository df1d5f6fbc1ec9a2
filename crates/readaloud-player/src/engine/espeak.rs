//! `espeak-ng` speech engine.
//!
//! Each utterance runs as its own `espeak-ng` child process writing straight
//! to the audio device. Pause and resume stop and continue the child with
//! `SIGSTOP`/`SIGCONT`; cancel kills it. The voice list is read once from
//! `espeak-ng --voices` when the engine is created.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use readaloud_core::{EngineError, SpeechEngine, Utterance, UtteranceEvents, UtteranceId, Voice};
use tokio::process::Command;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PlayerError;

/// Binary looked up on `PATH`.
pub const ESPEAK_PROGRAM: &str = "espeak-ng";

/// Words per minute at rate 1.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;
const MIN_WORDS_PER_MINUTE: f32 = 80.0;
const MAX_WORDS_PER_MINUTE: f32 = 450.0;

struct ActiveChild {
    id: UtteranceId,
    pid: Option<u32>,
    token: CancellationToken,
    events: UtteranceEvents,
    stopped: bool,
}

/// Speech engine backed by the `espeak-ng` command-line synthesizer.
pub struct EspeakEngine {
    program: PathBuf,
    voices: Vec<Voice>,
    active: Arc<Mutex<Option<ActiveChild>>>,
}

impl EspeakEngine {
    /// Locate `espeak-ng` on `PATH` and read its voice list.
    pub fn locate() -> Result<Self, PlayerError> {
        let program = which::which(ESPEAK_PROGRAM)
            .map_err(|e| PlayerError::EngineNotFound(format!("{ESPEAK_PROGRAM}: {e}")))?;
        Ok(Self::with_program(program))
    }

    /// Use an explicit `espeak-ng` binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let voices = match list_voices(&program) {
            Ok(voices) => voices,
            Err(e) => {
                tracing::warn!(program = %program.display(), error = %e, "Could not list espeak-ng voices");
                Vec::new()
            }
        };
        tracing::debug!(program = %program.display(), voices = voices.len(), "espeak-ng engine ready");

        Self {
            program,
            voices,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveChild>> {
        lock(&self.active)
    }

    fn signal_active(&self, signal: Signal, stopped: bool) {
        let mut active = self.active();
        let Some(child) = active.as_mut() else {
            return;
        };
        if child.stopped == stopped {
            return;
        }
        let Some(pid) = child.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };

        match signal::kill(Pid::from_raw(pid), signal) {
            Ok(()) => {
                child.stopped = stopped;
                if stopped {
                    child.events.paused();
                } else {
                    child.events.resumed();
                }
            }
            // Process already exited; its end event is on the way
            Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => {
                tracing::warn!(utterance = %child.id, pid, ?signal, error = %e, "Failed to signal espeak-ng");
            }
        }
    }
}

impl SpeechEngine for EspeakEngine {
    fn name(&self) -> &str {
        ESPEAK_PROGRAM
    }

    fn is_available(&self) -> bool {
        self.program.is_file()
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance, events: UtteranceEvents) -> Result<(), EngineError> {
        let id = utterance.id;
        let mut child = Command::new(&self.program)
            .args(espeak_args(&utterance))
            .arg("--")
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", self.program.display())))?;

        let token = CancellationToken::new();
        let previous = self.active().replace(ActiveChild {
            id,
            pid: child.id(),
            token: token.clone(),
            events: events.clone(),
            stopped: false,
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            events.started();
            let started_at = Instant::now();

            let status = tokio::select! {
                () = token.cancelled() => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(utterance = %id, error = %e, "espeak-ng already gone");
                    }
                    None
                }
                status = child.wait() => Some(status),
            };

            {
                let mut active = lock(&active);
                if active.as_ref().is_some_and(|c| c.id == id) {
                    *active = None;
                }
            }

            match status {
                None => events.ended(started_at.elapsed()),
                Some(Ok(status)) if status.success() => events.ended(started_at.elapsed()),
                Some(Ok(status)) => events.failed(format!("espeak-ng exited with {status}")),
                Some(Err(e)) => events.failed(e.to_string()),
            }
        });

        Ok(())
    }

    fn cancel_all(&self) {
        if let Some(child) = self.active().take() {
            child.token.cancel();
        }
    }

    fn pause(&self) {
        self.signal_active(Signal::SIGSTOP, true);
    }

    fn resume(&self) {
        self.signal_active(Signal::SIGCONT, false);
    }
}

fn lock(active: &Mutex<Option<ActiveChild>>) -> MutexGuard<'_, Option<ActiveChild>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Command-line flags for one utterance (everything before the text).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let voice = utterance
        .voice
        .as_ref()
        .map_or_else(|| utterance.lang.clone(), |v| v.lang.clone())
        .replace('_', "-")
        .to_ascii_lowercase();

    let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate)
        .round()
        .clamp(MIN_WORDS_PER_MINUTE, MAX_WORDS_PER_MINUTE) as u32;
    // espeak pitch is 0..=99 with 50 as neutral; amplitude 0..=200 with 100 as neutral
    let pitch = (utterance.pitch / 2.0 * 99.0).round().clamp(0.0, 99.0) as u32;
    let amplitude = (utterance.volume * 100.0).round().clamp(0.0, 200.0) as u32;

    vec![
        "-v".to_string(),
        voice,
        "-s".to_string(),
        words_per_minute.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
    ]
}

fn list_voices(program: &Path) -> Result<Vec<Voice>, EngineError> {
    let output = std::process::Command::new(program)
        .arg("--voices")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()?;

    if !output.status.success() {
        return Err(EngineError::Spawn(format!(
            "espeak-ng --voices exited with {}",
            output.status
        )));
    }

    Ok(parse_voices(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
/// ```
fn parse_voices(table: &str) -> Vec<Voice> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let lang = columns.next()?;
            let _age_gender = columns.next()?;
            let name = columns.next()?;
            Some(Voice::new(name.replace('_', " "), lang))
        })
        .collect()
}
