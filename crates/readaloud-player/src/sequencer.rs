//! The playback sequencer: a single tokio task that owns all playback state.
//!
//! Three inputs feed the task:
//!
//! - **commands** from [`PlaybackController`](crate::PlaybackController)
//!   handles, each acknowledged once applied;
//! - **engine events** for utterances this task dispatched;
//! - **timers** (segment continuations and delayed dispatches) spawned by this
//!   task and gated by the run that scheduled them.
//!
//! Plus the watchdog ticker, which is only polled while armed.
//!
//! All engine calls happen on this task. Segment utterances remember their
//! [`PlaybackRun`]; a completion whose run has been cancelled still closes its
//! `on_segment_start` with `on_segment_end`, but never moves the index or
//! schedules the next segment.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use readaloud_core::{
    EngineEvent, SpeechEngine, UtteranceEventKind, UtteranceEvents, UtteranceId, VoiceParams,
    prepare_utterance,
};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::{INTER_SEGMENT_DELAY, SPEAK_DELAY, WATCHDOG_PERIOD};
use crate::controller::{EndCallback, SegmentCallback};
use crate::run::PlaybackRun;
use crate::state::{PlaybackState, PlaybackStatus};
use crate::watchdog::Watchdog;

// ── Commands ───────────────────────────────────────────────────────

/// A request from a controller handle.
pub(crate) enum Command {
    Play,
    Pause,
    Resume,
    Skip,
    Reset,
    PlayAt(usize),
    Speak { text: String, on_end: EndCallback },
    OnSegmentStart(SegmentCallback),
    OnSegmentEnd(SegmentCallback),
}

impl Command {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Skip => "skip",
            Self::Reset => "reset",
            Self::PlayAt(_) => "play_at",
            Self::Speak { .. } => "speak",
            Self::OnSegmentStart(_) => "on_segment_start",
            Self::OnSegmentEnd(_) => "on_segment_end",
        }
    }
}

/// A command plus the channel used to acknowledge it.
pub(crate) struct Envelope {
    pub(crate) command: Command,
    pub(crate) ack: oneshot::Sender<()>,
}

// ── Timers ─────────────────────────────────────────────────────────

enum Timer {
    /// Start segment `index` of `run`.
    StartSegment { run: PlaybackRun, index: usize },

    /// Hand utterance `id` to the engine.
    Dispatch(UtteranceId),
}

// ── In-flight utterances ───────────────────────────────────────────

enum UtteranceKind {
    /// Part of continuous playback.
    Segment { run: PlaybackRun, index: usize },

    /// A single segment requested with `play_at`.
    Single { index: usize },

    /// Free text requested with `speak`.
    AdHoc { on_end: EndCallback },
}

struct InFlight {
    kind: UtteranceKind,
    text: String,
    dispatched: bool,
    started: bool,
    /// `on_segment_start` fired; its `on_segment_end` is owed.
    announced: bool,
}

// ── Sequencer ──────────────────────────────────────────────────────

pub(crate) struct Sequencer {
    engine: Arc<dyn SpeechEngine>,
    segments: Arc<[String]>,
    params: Arc<RwLock<VoiceParams>>,
    status: watch::Sender<PlaybackStatus>,

    state: PlaybackState,
    index: usize,
    generation: u64,
    run: Option<PlaybackRun>,

    /// Explicit `pause()` in effect.
    paused: bool,

    /// Segment continuation that fired while paused.
    parked: Option<(PlaybackRun, usize)>,

    /// Utterance whose dispatch came due while paused.
    held: Option<UtteranceId>,

    next_utterance: u64,
    in_flight: HashMap<UtteranceId, InFlight>,
    current: Option<UtteranceId>,
    watchdog: Watchdog,

    on_segment_start: Option<SegmentCallback>,
    on_segment_end: Option<SegmentCallback>,

    commands: mpsc::UnboundedReceiver<Envelope>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    timers_tx: mpsc::UnboundedSender<Timer>,
    timers: mpsc::UnboundedReceiver<Timer>,
}

impl Sequencer {
    pub(crate) fn new(
        engine: Arc<dyn SpeechEngine>,
        segments: Arc<[String]>,
        params: Arc<RwLock<VoiceParams>>,
        status: watch::Sender<PlaybackStatus>,
        commands: mpsc::UnboundedReceiver<Envelope>,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (timers_tx, timers) = mpsc::unbounded_channel();

        Self {
            engine,
            segments,
            params,
            status,
            state: PlaybackState::Idle,
            index: 0,
            generation: 0,
            run: None,
            paused: false,
            parked: None,
            held: None,
            next_utterance: 0,
            in_flight: HashMap::new(),
            current: None,
            watchdog: Watchdog::new(WATCHDOG_PERIOD),
            on_segment_start: None,
            on_segment_end: None,
            commands,
            events_tx,
            events,
            timers_tx,
            timers,
        }
    }

    /// Run until every controller handle has been dropped.
    pub(crate) async fn run(mut self) {
        tracing::debug!(
            engine = self.engine.name(),
            segments = self.segments.len(),
            "Playback sequencer started"
        );

        loop {
            tokio::select! {
                biased;

                Some(event) = self.events.recv() => self.handle_event(event),
                Some(timer) = self.timers.recv() => self.handle_timer(timer),
                envelope = self.commands.recv() => {
                    let Some(Envelope { command, ack }) = envelope else {
                        break;
                    };
                    tracing::trace!(command = command.name(), "Applying command");
                    self.handle_command(command);
                    self.publish();
                    // Caller may have stopped waiting
                    let _ = ack.send(());
                    continue;
                }
                utterance = self.watchdog.tick(), if self.watchdog.is_armed() => {
                    self.keep_alive(utterance);
                }
            }
            self.publish();
        }

        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_run();
        self.watchdog.disarm();
        self.engine.cancel_all();
        tracing::debug!(generation = self.generation, "Playback sequencer stopped");
    }

    // ── State helpers ──────────────────────────────────────────────

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            tracing::debug!(
                from = ?self.state,
                to = ?state,
                generation = self.generation,
                "Playback state changed"
            );
            self.state = state;
        }
    }

    fn publish(&self) {
        let status = PlaybackStatus {
            state: self.state,
            current_index: self.index,
            generation: self.generation,
        };
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }

    fn params_snapshot(&self) -> VoiceParams {
        self.params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stop_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel();
            tracing::trace!(generation = run.generation(), "Playback run cancelled");
        }
        self.parked = None;
    }

    fn is_current_run(&self, run: &PlaybackRun) -> bool {
        run.is_live()
            && self
                .run
                .as_ref()
                .is_some_and(|r| r.generation() == run.generation())
    }

    fn clear_pause(&mut self) {
        self.held = None;
        if self.paused {
            self.paused = false;
            self.engine.resume();
        }
    }

    /// Cancel whatever the engine is doing.
    ///
    /// A current utterance that never reached the engine is finished here,
    /// since no end event will ever arrive for it.
    fn cancel_engine(&mut self) {
        self.watchdog.disarm();
        self.engine.cancel_all();

        if let Some(id) = self.current {
            if self.in_flight.get(&id).is_some_and(|u| !u.dispatched) {
                self.finish_utterance(id);
            }
        }
    }

    fn schedule(&self, delay: Duration, timer: Timer, gate: Option<&PlaybackRun>) {
        let tx = self.timers_tx.clone();
        let gate = gate.map(|run| run.token().clone());

        tokio::spawn(async move {
            let fire = async {
                tokio::time::sleep(delay).await;
                // Receiver only goes away at shutdown
                let _ = tx.send(timer);
            };
            match gate {
                Some(token) => {
                    tokio::select! {
                        () = token.cancelled() => {}
                        () = fire => {}
                    }
                }
                None => fire.await,
            }
        });
    }

    fn fire_segment_start(&mut self, index: usize) {
        if let Some(callback) = self.on_segment_start.as_mut() {
            callback(index);
        }
    }

    fn fire_segment_end(&mut self, index: usize) {
        if let Some(callback) = self.on_segment_end.as_mut() {
            callback(index);
        }
    }

    // ── Commands ───────────────────────────────────────────────────

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Skip => self.skip(),
            Command::Reset => self.reset(),
            Command::PlayAt(index) => self.play_at(index),
            Command::Speak { text, on_end } => self.speak(text, on_end),
            Command::OnSegmentStart(callback) => self.on_segment_start = Some(callback),
            Command::OnSegmentEnd(callback) => self.on_segment_end = Some(callback),
        }
    }

    fn play(&mut self) {
        self.halt();

        self.generation += 1;
        let run = PlaybackRun::new(self.generation);
        self.run = Some(run.clone());
        self.set_state(PlaybackState::Playing);
        tracing::info!(
            generation = self.generation,
            segments = self.segments.len(),
            "Playback started"
        );

        self.schedule(
            Duration::ZERO,
            Timer::StartSegment {
                run: run.clone(),
                index: 0,
            },
            Some(&run),
        );
    }

    fn pause(&mut self) {
        self.paused = true;
        self.watchdog.disarm();
        self.engine.pause();
        if self.state == PlaybackState::Playing {
            self.set_state(PlaybackState::Paused);
        }
    }

    fn resume(&mut self) {
        self.paused = false;
        self.engine.resume();

        if let Some(id) = self.current {
            if self.in_flight.get(&id).is_some_and(|u| u.started) {
                self.watchdog.arm(id);
            }
        }

        if let Some(id) = self.held.take() {
            self.dispatch(id);
        }

        if self.state == PlaybackState::Paused {
            self.set_state(PlaybackState::Playing);
            if let Some((run, index)) = self.parked.take() {
                self.start_segment(run, index);
            }
        }
    }

    fn skip(&mut self) {
        tracing::debug!(index = self.index, "Skipping current utterance");
        self.cancel_engine();
    }

    fn reset(&mut self) {
        self.halt();
        self.set_state(PlaybackState::Stopped);
    }

    /// Tear down continuous playback without choosing the next state.
    fn halt(&mut self) {
        self.stop_run();
        self.clear_pause();
        self.cancel_engine();
        self.index = 0;
    }

    fn speak(&mut self, text: String, on_end: EndCallback) {
        self.stop_ad_hoc();
        self.begin_utterance(text, UtteranceKind::AdHoc { on_end });
    }

    fn play_at(&mut self, index: usize) {
        let Some(text) = self.segments.get(index).cloned() else {
            tracing::warn!(
                index,
                segments = self.segments.len(),
                "Ignoring play_at beyond the segment list"
            );
            return;
        };
        self.stop_ad_hoc();
        self.begin_utterance(text, UtteranceKind::Single { index });
    }

    /// Ad-hoc speech supersedes continuous playback.
    fn stop_ad_hoc(&mut self) {
        self.stop_run();
        if self.state.is_active() {
            self.set_state(PlaybackState::Stopped);
        }
        self.clear_pause();
    }

    // ── Timers ─────────────────────────────────────────────────────

    fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::StartSegment { run, index } => self.start_segment(run, index),
            Timer::Dispatch(id) => self.dispatch(id),
        }
    }

    fn start_segment(&mut self, run: PlaybackRun, index: usize) {
        if !self.is_current_run(&run) {
            tracing::debug!(
                generation = run.generation(),
                index,
                "Dropping continuation from superseded run"
            );
            return;
        }

        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Paused => {
                tracing::debug!(index, "Paused; holding next segment");
                self.parked = Some((run, index));
                return;
            }
            PlaybackState::Idle | PlaybackState::Stopped => return,
        }

        let Some(text) = self.segments.get(index).cloned() else {
            self.stop_run();
            self.index = 0;
            self.set_state(PlaybackState::Stopped);
            tracing::info!(generation = self.generation, "Playback finished");
            return;
        };

        self.index = index;
        tracing::debug!(generation = run.generation(), index, "Starting segment");
        self.begin_utterance(text, UtteranceKind::Segment { run, index });
    }

    fn begin_utterance(&mut self, text: String, kind: UtteranceKind) {
        self.cancel_engine();

        self.next_utterance += 1;
        let id = UtteranceId::new(self.next_utterance);
        let gate = if let UtteranceKind::Segment { run, .. } = &kind {
            Some(run.clone())
        } else {
            None
        };

        self.in_flight.insert(
            id,
            InFlight {
                kind,
                text,
                dispatched: false,
                started: false,
                announced: false,
            },
        );
        self.current = Some(id);
        self.schedule(SPEAK_DELAY, Timer::Dispatch(id), gate.as_ref());
    }

    fn dispatch(&mut self, id: UtteranceId) {
        // Engines need not keep a pause across a new `speak`
        if self.paused && self.in_flight.contains_key(&id) {
            tracing::debug!(utterance = %id, "Paused; holding dispatch");
            self.held = Some(id);
            return;
        }

        let text = match self.in_flight.get_mut(&id) {
            Some(record) if !record.dispatched => {
                record.dispatched = true;
                record.text.clone()
            }
            // Finished before it was dispatched
            _ => return,
        };

        let params = self.params_snapshot();
        let utterance = prepare_utterance(self.engine.as_ref(), id, &text, &params);
        let events = UtteranceEvents::new(id, self.events_tx.clone());

        tracing::debug!(
            utterance = %id,
            chars = text.chars().count(),
            lang = %utterance.lang,
            voice = utterance.voice.as_ref().map(|v| v.name.as_str()),
            "Dispatching utterance"
        );
        if let Err(e) = self.engine.speak(utterance, events) {
            tracing::warn!(utterance = %id, error = %e, "Speech engine rejected utterance");
            self.finish_utterance(id);
        }
    }

    // ── Engine events ──────────────────────────────────────────────

    fn handle_event(&mut self, event: EngineEvent) {
        let id = event.utterance;
        match event.kind {
            UtteranceEventKind::Start => self.utterance_started(id),
            UtteranceEventKind::End { elapsed } => {
                tracing::debug!(
                    utterance = %id,
                    elapsed_ms = elapsed.as_millis(),
                    "Utterance ended"
                );
                self.finish_utterance(id);
            }
            UtteranceEventKind::Error(message) => {
                tracing::warn!(utterance = %id, error = %message, "Speech engine error");
                self.finish_utterance(id);
            }
            UtteranceEventKind::Pause => {
                tracing::debug!(utterance = %id, "Engine paused utterance");
                self.watchdog.disarm_for(id);
            }
            UtteranceEventKind::Resume => {
                tracing::debug!(utterance = %id, "Engine resumed utterance");
                let speaking = self.current == Some(id)
                    && self.in_flight.get(&id).is_some_and(|u| u.started);
                if speaking && !self.paused {
                    self.watchdog.arm(id);
                }
            }
        }
    }

    fn utterance_started(&mut self, id: UtteranceId) {
        let Some(record) = self.in_flight.get_mut(&id) else {
            tracing::debug!(utterance = %id, "Start for an utterance already finished");
            return;
        };

        if record.started {
            tracing::warn!(utterance = %id, "Engine repeated an utterance; cancelling");
            self.engine.cancel_all();
            return;
        }
        record.started = true;

        let is_current = self.current == Some(id);
        let index = match &record.kind {
            UtteranceKind::Segment { run, index } if run.is_live() => Some(*index),
            UtteranceKind::Single { index } if is_current => Some(*index),
            _ => None,
        };

        if index.is_some() {
            record.announced = true;
        }

        if is_current && !self.paused {
            self.watchdog.arm(id);
        }
        if let Some(index) = index {
            self.fire_segment_start(index);
        }
    }

    /// Process the end (or error) of `id` exactly once.
    fn finish_utterance(&mut self, id: UtteranceId) {
        let Some(record) = self.in_flight.remove(&id) else {
            tracing::debug!(utterance = %id, "Dropping duplicate completion");
            return;
        };

        self.watchdog.disarm_for(id);
        if self.current == Some(id) {
            self.current = None;
        }

        match record.kind {
            UtteranceKind::Segment { run, index } => {
                if record.announced {
                    self.fire_segment_end(index);
                }
                if !self.is_current_run(&run) {
                    tracing::debug!(
                        generation = run.generation(),
                        index,
                        "Discarding completion from superseded run"
                    );
                    return;
                }
                self.index = index + 1;
                self.schedule(
                    INTER_SEGMENT_DELAY,
                    Timer::StartSegment {
                        run: run.clone(),
                        index: index + 1,
                    },
                    Some(&run),
                );
            }
            UtteranceKind::Single { index } => self.fire_segment_end(index),
            UtteranceKind::AdHoc { on_end } => on_end(),
        }
    }

    // ── Watchdog ───────────────────────────────────────────────────

    fn keep_alive(&self, utterance: UtteranceId) {
        if self.paused {
            return;
        }
        tracing::trace!(%utterance, "Watchdog keep-alive");
        self.engine.resume();
    }
}
