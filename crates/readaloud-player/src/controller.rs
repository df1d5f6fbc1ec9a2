//! Public handle to a playback sequencer.
//!
//! [`PlaybackController`] is cheap to clone; every clone talks to the same
//! sequencer task. Commands are async and resolve once the sequencer has
//! applied them. The task stops (cancelling the engine) when the last clone
//! is dropped.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use readaloud_core::{SpeechEngine, VoiceParams, VoiceParamsUpdate};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::PlayerConfig;
use crate::sequencer::{Command, Envelope, Sequencer};
use crate::state::{PlaybackState, PlaybackStatus};

/// Segment start/end notification. Receives the segment index.
///
/// Runs on the sequencer task and must not block.
pub type SegmentCallback = Box<dyn FnMut(usize) + Send + 'static>;

/// Completion notification for [`PlaybackController::speak`].
pub type EndCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a sequential playback controller over a fixed segment list.
#[derive(Clone)]
pub struct PlaybackController {
    /// `None` when the engine is unavailable; every command is then a no-op.
    commands: Option<mpsc::UnboundedSender<Envelope>>,
    status: watch::Receiver<PlaybackStatus>,
    params: Arc<RwLock<VoiceParams>>,
    segments: Arc<[String]>,
}

impl PlaybackController {
    /// Create a controller and spawn its sequencer task.
    ///
    /// Must be called from within a tokio runtime. If the engine reports
    /// itself unavailable the controller is created disabled: a warning is
    /// logged once and every command is ignored.
    pub fn new(
        segments: impl Into<Arc<[String]>>,
        engine: Arc<dyn SpeechEngine>,
        config: PlayerConfig,
    ) -> Self {
        let segments = segments.into();
        let params = Arc::new(RwLock::new(config.params));
        let (status_tx, status) = watch::channel(PlaybackStatus::default());

        if !engine.is_available() {
            tracing::warn!(
                engine = engine.name(),
                "Speech synthesis unavailable; playback disabled"
            );
            return Self {
                commands: None,
                status,
                params,
                segments,
            };
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let sequencer = Sequencer::new(
            engine,
            Arc::clone(&segments),
            Arc::clone(&params),
            status_tx,
            commands_rx,
        );
        tokio::spawn(sequencer.run());

        Self {
            commands: Some(commands_tx),
            status,
            params,
            segments,
        }
    }

    /// Whether the controller can speak at all.
    pub const fn is_enabled(&self) -> bool {
        self.commands.is_some()
    }

    // ── Commands ───────────────────────────────────────────────────

    /// Start continuous playback from the first segment.
    ///
    /// Any earlier run is cancelled first. Its interrupted segment still
    /// reports `on_segment_end`; nothing else from it reaches the callbacks.
    pub async fn play(&self) {
        self.send(Command::Play).await;
    }

    /// Pause the engine and freeze sequencing.
    ///
    /// An utterance not yet handed to the engine is held until `resume`.
    pub async fn pause(&self) {
        self.send(Command::Pause).await;
    }

    /// Resume after [`pause`](Self::pause).
    pub async fn resume(&self) {
        self.send(Command::Resume).await;
    }

    /// Cancel the current utterance; continuous playback moves on to the next
    /// segment.
    pub async fn skip(&self) {
        self.send(Command::Skip).await;
    }

    /// Stop playback and rewind to the first segment.
    pub async fn reset(&self) {
        self.send(Command::Reset).await;
    }

    /// Speak one segment by index, outside of continuous playback.
    ///
    /// Fires the segment callbacks for `index`. Out-of-range indexes are
    /// ignored.
    pub async fn play_at(&self, index: usize) {
        self.send(Command::PlayAt(index)).await;
    }

    /// Speak arbitrary text, stopping continuous playback.
    ///
    /// `on_end` runs once when the utterance ends, fails or is cancelled.
    pub async fn speak<F>(&self, text: impl Into<String>, on_end: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Command::Speak {
            text: text.into(),
            on_end: Box::new(on_end),
        })
        .await;
    }

    /// Register the segment-start callback, replacing any previous one.
    pub async fn on_segment_start<F>(&self, callback: F)
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.send(Command::OnSegmentStart(Box::new(callback))).await;
    }

    /// Register the segment-end callback, replacing any previous one.
    pub async fn on_segment_end<F>(&self, callback: F)
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.send(Command::OnSegmentEnd(Box::new(callback))).await;
    }

    async fn send(&self, command: Command) {
        let Some(commands) = &self.commands else {
            tracing::debug!(
                command = command.name(),
                "Playback disabled; ignoring command"
            );
            return;
        };

        let name = command.name();
        let (ack, done) = oneshot::channel();
        if commands.send(Envelope { command, ack }).is_err() {
            tracing::warn!(command = name, "Playback sequencer has stopped");
            return;
        }
        if done.await.is_err() {
            tracing::warn!(command = name, "Playback sequencer dropped command");
        }
    }

    // ── Status ─────────────────────────────────────────────────────

    pub fn state(&self) -> PlaybackState {
        self.status.borrow().state
    }

    pub fn current_index(&self) -> usize {
        self.status.borrow().current_index
    }

    pub fn generation(&self) -> u64 {
        self.status.borrow().generation
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    // ── Voice parameters ───────────────────────────────────────────

    fn read_params(&self) -> RwLockReadGuard<'_, VoiceParams> {
        self.params.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_params(&self) -> RwLockWriteGuard<'_, VoiceParams> {
        self.params.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current voice parameters.
    pub fn params(&self) -> VoiceParams {
        self.read_params().clone()
    }

    pub fn lang(&self) -> String {
        self.read_params().lang().to_string()
    }

    pub fn voice(&self) -> String {
        self.read_params().voice().to_string()
    }

    pub fn pitch(&self) -> f32 {
        self.read_params().pitch()
    }

    pub fn rate(&self) -> f32 {
        self.read_params().rate()
    }

    pub fn volume(&self) -> f32 {
        self.read_params().volume()
    }

    pub fn set_lang(&self, lang: impl Into<String>) {
        self.write_params().set_lang(lang);
    }

    pub fn set_voice(&self, voice: impl Into<String>) {
        self.write_params().set_voice(voice);
    }

    /// Returns `false` (keeping the old value) when `pitch` is outside `[0, 2]`.
    pub fn set_pitch(&self, pitch: f32) -> bool {
        self.write_params().set_pitch(pitch)
    }

    /// Returns `false` (keeping the old value) when `rate` is outside `[0.1, 10]`.
    pub fn set_rate(&self, rate: f32) -> bool {
        self.write_params().set_rate(rate)
    }

    /// Returns `false` (keeping the old value) when `volume` is outside `[0, 1]`.
    pub fn set_volume(&self, volume: f32) -> bool {
        self.write_params().set_volume(volume)
    }

    /// Apply a partial update, e.g. from a settings change notification.
    ///
    /// Takes effect from the next utterance on.
    pub fn update_config(&self, update: &VoiceParamsUpdate) {
        if update.is_empty() {
            return;
        }
        self.write_params().apply(update);
        tracing::debug!(params = ?self.read_params(), "Voice parameters updated");
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("enabled", &self.is_enabled())
            .field("status", &*self.status.borrow())
            .field("segments", &self.segments.len())
            .finish_non_exhaustive()
    }
}
