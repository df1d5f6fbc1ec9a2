//! Speech engine port.
//!
//! A [`SpeechEngine`] starts speech asynchronously and reports progress for
//! each utterance through the [`UtteranceEvents`] handed to [`SpeechEngine::speak`].
//!
//! # Engine contract
//!
//! - `speak` must not block; synthesis and playback run in the background.
//! - Every utterance eventually produces exactly one terminal event (`End` or
//!   `Error`). Cancelling an utterance, started or still queued, produces
//!   `End`.
//! - `resume` is idempotent: calling it while nothing is paused is a no-op.
//!
//! Engines are allowed to be sloppy about the rest (duplicate `Start` or `End`
//! events, spontaneous pauses); the playback controller filters those.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::voice::{Voice, VoiceParams, resolve_voice};

/// Identifier of a single utterance, unique per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(u64);

impl UtteranceId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// One speech request: a text plus the voice settings to speak it with.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub lang: String,
    /// Resolved engine voice; `None` lets the engine pick its default.
    pub voice: Option<Voice>,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(
        id: UtteranceId,
        text: impl Into<String>,
        params: &VoiceParams,
        voice: Option<Voice>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            lang: params.lang().to_string(),
            voice,
            pitch: params.pitch(),
            rate: params.rate(),
            volume: params.volume(),
        }
    }
}

/// Progress reported by an engine for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEventKind {
    /// Audio started.
    Start,

    /// Utterance finished or was cancelled.
    End {
        /// Time between start and end as measured by the engine.
        elapsed: Duration,
    },

    /// Synthesis failed.
    Error(String),

    /// Engine paused this utterance.
    Pause,

    /// Engine resumed this utterance.
    Resume,
}

/// An engine event tagged with the utterance it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub utterance: UtteranceId,
    pub kind: UtteranceEventKind,
}

/// Event sink for one utterance.
///
/// Cheap to clone. Sending never fails from the engine's point of view; if the
/// controller is gone the event is dropped.
#[derive(Debug, Clone)]
pub struct UtteranceEvents {
    utterance: UtteranceId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl UtteranceEvents {
    pub const fn new(utterance: UtteranceId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { utterance, tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel(utterance: UtteranceId) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(utterance, tx), rx)
    }

    pub const fn utterance(&self) -> UtteranceId {
        self.utterance
    }

    pub fn started(&self) {
        self.emit(UtteranceEventKind::Start);
    }

    pub fn ended(&self, elapsed: Duration) {
        self.emit(UtteranceEventKind::End { elapsed });
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.emit(UtteranceEventKind::Error(message.into()));
    }

    pub fn paused(&self) {
        self.emit(UtteranceEventKind::Pause);
    }

    pub fn resumed(&self) {
        self.emit(UtteranceEventKind::Resume);
    }

    fn emit(&self, kind: UtteranceEventKind) {
        let event = EngineEvent {
            utterance: self.utterance,
            kind,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(utterance = %self.utterance, "Utterance event receiver dropped");
        }
    }
}

/// Backend-agnostic speech engine capability.
///
/// Implementations must be `Send + Sync`; the controller shares one engine
/// between its sequencer task and the engine's own background work.
#[cfg_attr(test, mockall::automock)]
pub trait SpeechEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Whether speech is possible on this platform at all.
    ///
    /// Checked once when a controller is created.
    fn is_available(&self) -> bool;

    /// Voices the engine can speak with.
    fn voices(&self) -> Vec<Voice>;

    /// Begin speaking `utterance`, reporting progress through `events`.
    fn speak(&self, utterance: Utterance, events: UtteranceEvents) -> Result<(), EngineError>;

    /// Cancel the current and any queued utterances.
    fn cancel_all(&self);

    /// Pause the current utterance.
    fn pause(&self);

    /// Resume a paused utterance. No-op when nothing is paused.
    fn resume(&self);
}

/// Build an utterance for `text`, resolving the configured voice against the
/// engine's voice list.
pub fn prepare_utterance(
    engine: &dyn SpeechEngine,
    id: UtteranceId,
    text: &str,
    params: &VoiceParams,
) -> Utterance {
    let voices = engine.voices();
    let voice = resolve_voice(&voices, params);
    if voice.is_none() && !params.voice().is_empty() {
        tracing::debug!(
            requested = params.voice(),
            lang = params.lang(),
            engine = engine.name(),
            "Requested voice not offered; using engine default"
        );
    }
    Utterance::new(id, text, params, voice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn events_are_tagged_with_utterance() {
        let id = UtteranceId::new(7);
        let (events, mut rx) = UtteranceEvents::channel(id);

        events.started();
        events.ended(Duration::from_millis(120));

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent {
                utterance: id,
                kind: UtteranceEventKind::Start
            }
        );
        assert_eq!(
            rx.try_recv().unwrap().kind,
            UtteranceEventKind::End {
                elapsed: Duration::from_millis(120)
            }
        );
    }

    #[test]
    fn receiver_wakes_on_event() {
        let (events, mut rx) = UtteranceEvents::channel(UtteranceId::new(1));
        let mut recv = task::spawn(rx.recv());

        assert_pending!(recv.poll());
        events.failed("no audio device");
        assert!(recv.is_woken());

        let event = assert_ready!(recv.poll()).unwrap();
        assert_eq!(event.kind, UtteranceEventKind::Error("no audio device".into()));
    }

    #[test]
    fn emitting_after_receiver_dropped_is_silent() {
        let (events, rx) = UtteranceEvents::channel(UtteranceId::new(2));
        drop(rx);
        events.paused();
        events.resumed();
    }

    #[test]
    fn prepare_utterance_resolves_voice_from_engine() {
        let mut engine = MockSpeechEngine::new();
        engine.expect_voices().times(1).returning(|| {
            vec![
                Voice::new("Ting-Ting", "zh-CN"),
                Voice::new("Samantha", "en-US"),
            ]
        });
        engine.expect_name().return_const("mock".to_string());

        let mut params = VoiceParams::default();
        params.set_voice("Samantha");
        params.set_rate(1.5);

        let utterance = prepare_utterance(&engine, UtteranceId::new(3), "hello", &params);
        assert_eq!(utterance.voice.unwrap().name, "Samantha");
        assert_eq!(utterance.text, "hello");
        assert_eq!(utterance.lang, "zh-CN");
        assert!((utterance.rate - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn prepare_utterance_without_match_leaves_voice_unset() {
        let mut engine = MockSpeechEngine::new();
        engine
            .expect_voices()
            .returning(|| vec![Voice::new("Samantha", "en-US")]);
        engine.expect_name().return_const("mock".to_string());

        let mut params = VoiceParams::default();
        params.set_voice("Missing");

        let utterance = prepare_utterance(&engine, UtteranceId::new(4), "你好", &params);
        assert!(utterance.voice.is_none());
    }
}
