//! Deterministic speech engine driven by the tokio clock.
//!
//! Speaking time is `char_duration × chars ÷ rate`. The engine honors
//! pause, resume and cancel the way a platform engine does, and can inject
//! the defects the playback controller guards against:
//!
//! - **stall**: with [`SimulatedEngineBuilder::stall_after`] an utterance
//!   stops advancing once that long has passed without a `resume()` call,
//!   and never reports its end on its own;
//! - **duplicate completion**: a naturally finished utterance reports `End`
//!   twice;
//! - **duplicate start**: an utterance reports `Start` twice;
//! - **failures**: chosen texts fail asynchronously (`Error` event) or are
//!   rejected synchronously by `speak`.
//!
//! Everything the engine was asked to do is recorded for assertions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use readaloud_core::{
    DEFAULT_LANG, EngineError, SpeechEngine, Utterance, UtteranceEvents, UtteranceId, Voice,
};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Builder for [`SimulatedEngine`].
#[derive(Debug, Clone)]
pub struct SimulatedEngineBuilder {
    char_duration: Duration,
    start_latency: Duration,
    stall_after: Option<Duration>,
    duplicate_end: bool,
    duplicate_start: bool,
    fail_on: Vec<String>,
    reject_on: Vec<String>,
    voices: Vec<Voice>,
    available: bool,
}

impl Default for SimulatedEngineBuilder {
    fn default() -> Self {
        Self {
            char_duration: Duration::from_millis(100),
            start_latency: Duration::from_millis(10),
            stall_after: None,
            duplicate_end: false,
            duplicate_start: false,
            fail_on: Vec::new(),
            reject_on: Vec::new(),
            voices: vec![
                Voice::new("Simulated Mandarin", DEFAULT_LANG).with_default(true),
                Voice::new("Simulated Cantonese", "zh-HK"),
                Voice::new("Simulated English", "en-US").with_default(true),
            ],
            available: true,
        }
    }
}

impl SimulatedEngineBuilder {
    /// Speaking time per character at rate 1.
    #[must_use]
    pub const fn char_duration(mut self, duration: Duration) -> Self {
        self.char_duration = duration;
        self
    }

    /// Delay between `speak` and the `Start` event.
    #[must_use]
    pub const fn start_latency(mut self, latency: Duration) -> Self {
        self.start_latency = latency;
        self
    }

    /// Stop advancing once `limit` has passed without a `resume()` call.
    #[must_use]
    pub const fn stall_after(mut self, limit: Duration) -> Self {
        self.stall_after = Some(limit);
        self
    }

    /// Report `End` twice for every utterance that finishes naturally.
    #[must_use]
    pub const fn duplicate_end(mut self, enabled: bool) -> Self {
        self.duplicate_end = enabled;
        self
    }

    /// Report `Start` twice for every utterance.
    #[must_use]
    pub const fn duplicate_start(mut self, enabled: bool) -> Self {
        self.duplicate_start = enabled;
        self
    }

    /// Fail utterances with exactly this text via an `Error` event.
    #[must_use]
    pub fn fail_on(mut self, text: impl Into<String>) -> Self {
        self.fail_on.push(text.into());
        self
    }

    /// Make `speak` return an error for utterances with exactly this text.
    #[must_use]
    pub fn reject_on(mut self, text: impl Into<String>) -> Self {
        self.reject_on.push(text.into());
        self
    }

    #[must_use]
    pub fn voices(mut self, voices: Vec<Voice>) -> Self {
        self.voices = voices;
        self
    }

    /// Report the engine as unavailable on this platform.
    #[must_use]
    pub const fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn build(self) -> SimulatedEngine {
        let (control, _) = watch::channel(Control {
            paused: false,
            last_kick: Instant::now(),
        });

        SimulatedEngine {
            shared: Arc::new(Shared {
                settings: self,
                control,
                book: Mutex::new(Book::default()),
            }),
        }
    }

    fn speaking_time(&self, utterance: &Utterance) -> Duration {
        let chars = u32::try_from(utterance.text.chars().count()).unwrap_or(u32::MAX);
        let base = self.char_duration.saturating_mul(chars);
        if utterance.rate.is_finite() && utterance.rate > 0.0 {
            Duration::try_from_secs_f32(base.as_secs_f32() / utterance.rate).unwrap_or(Duration::MAX)
        } else {
            base
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Control {
    paused: bool,
    /// Last `resume()` call or utterance start.
    last_kick: Instant,
}

struct Active {
    id: UtteranceId,
    token: CancellationToken,
    events: UtteranceEvents,
}

#[derive(Default)]
struct Book {
    active: Option<Active>,
    spoken: Vec<Utterance>,
    resume_calls: usize,
    pause_calls: usize,
    cancel_calls: usize,
}

struct Shared {
    settings: SimulatedEngineBuilder,
    control: watch::Sender<Control>,
    book: Mutex<Book>,
}

impl Shared {
    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: UtteranceId) {
        let mut book = self.book();
        if book.active.as_ref().is_some_and(|a| a.id == id) {
            book.active = None;
        }
    }

    fn active_events(&self) -> Option<UtteranceEvents> {
        self.book().active.as_ref().map(|a| a.events.clone())
    }

    /// Advance through `duration` of speech. Returns `false` if cancelled.
    async fn play_out(&self, duration: Duration, token: &CancellationToken) -> bool {
        let mut control = self.control.subscribe();
        let mut remaining = duration;

        while !remaining.is_zero() {
            let Control { paused, last_kick } = *control.borrow_and_update();
            let budget = if paused {
                Duration::ZERO
            } else {
                self.settings.stall_after.map_or(remaining, |limit| {
                    (last_kick + limit).saturating_duration_since(Instant::now())
                })
            };
            let step = budget.min(remaining);
            let began = Instant::now();

            tokio::select! {
                () = token.cancelled() => return false,
                changed = control.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                    remaining = remaining.saturating_sub(began.elapsed().min(step));
                }
                () = sleep(step), if !step.is_zero() => {
                    remaining = remaining.saturating_sub(step);
                }
            }
        }

        true
    }
}

/// Clock-driven engine for tests and dry runs.
#[derive(Clone)]
pub struct SimulatedEngine {
    shared: Arc<Shared>,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SimulatedEngineBuilder {
        SimulatedEngineBuilder::default()
    }

    /// Every utterance passed to `speak`, in order.
    pub fn spoken(&self) -> Vec<Utterance> {
        self.shared.book().spoken.clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.shared
            .book()
            .spoken
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn resume_calls(&self) -> usize {
        self.shared.book().resume_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.shared.book().pause_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.shared.book().cancel_calls
    }

    pub fn is_paused(&self) -> bool {
        self.shared.control.borrow().paused
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.book().active.is_some()
    }
}

impl SpeechEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_available(&self) -> bool {
        self.shared.settings.available
    }

    fn voices(&self) -> Vec<Voice> {
        self.shared.settings.voices.clone()
    }

    fn speak(&self, utterance: Utterance, events: UtteranceEvents) -> Result<(), EngineError> {
        let settings = &self.shared.settings;
        if !settings.available {
            return Err(EngineError::Unavailable("simulated engine disabled".into()));
        }
        if settings.reject_on.contains(&utterance.text) {
            return Err(EngineError::Synthesis(format!(
                "rejected utterance {}",
                utterance.id
            )));
        }

        let id = utterance.id;
        let duration = settings.speaking_time(&utterance);
        let fail = settings.fail_on.contains(&utterance.text);
        let token = CancellationToken::new();

        let previous = {
            let mut book = self.shared.book();
            book.spoken.push(utterance);
            book.active.replace(Active {
                id,
                token: token.clone(),
                events: events.clone(),
            })
        };
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        tracing::trace!(utterance = %id, duration_ms = duration.as_millis(), "Simulated speak");
        tokio::spawn(speak_utterance(
            Arc::clone(&self.shared),
            id,
            duration,
            fail,
            token,
            events,
        ));
        Ok(())
    }

    fn cancel_all(&self) {
        let active = {
            let mut book = self.shared.book();
            book.cancel_calls += 1;
            book.active.take()
        };
        if let Some(active) = active {
            active.token.cancel();
        }
    }

    fn pause(&self) {
        self.shared.book().pause_calls += 1;
        let newly_paused = self.shared.control.send_if_modified(|control| {
            let changed = !control.paused;
            control.paused = true;
            changed
        });
        if newly_paused {
            if let Some(events) = self.shared.active_events() {
                events.paused();
            }
        }
    }

    fn resume(&self) {
        self.shared.book().resume_calls += 1;
        let mut was_paused = false;
        self.shared.control.send_modify(|control| {
            was_paused = control.paused;
            control.paused = false;
            control.last_kick = Instant::now();
        });
        if was_paused {
            if let Some(events) = self.shared.active_events() {
                events.resumed();
            }
        }
    }
}

async fn speak_utterance(
    shared: Arc<Shared>,
    id: UtteranceId,
    duration: Duration,
    fail: bool,
    token: CancellationToken,
    events: UtteranceEvents,
) {
    let queued_at = Instant::now();
    tokio::select! {
        () = token.cancelled() => {
            shared.release(id);
            events.ended(queued_at.elapsed());
            return;
        }
        () = sleep(shared.settings.start_latency) => {}
    }

    if fail {
        shared.release(id);
        events.failed("simulated synthesis failure");
        return;
    }

    shared
        .control
        .send_modify(|control| control.last_kick = Instant::now());
    events.started();
    if shared.settings.duplicate_start {
        events.started();
    }

    let started_at = Instant::now();
    let completed = shared.play_out(duration, &token).await;
    shared.release(id);

    let elapsed = started_at.elapsed();
    events.ended(elapsed);
    if completed && shared.settings.duplicate_end {
        events.ended(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readaloud_core::{EngineEvent, UtteranceEventKind, VoiceParams};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    fn utterance(id: u64, text: &str) -> Utterance {
        Utterance::new(UtteranceId::new(id), text, &VoiceParams::default(), None)
    }

    fn speak(engine: &SimulatedEngine, utterance: Utterance) -> UnboundedReceiver<EngineEvent> {
        let (events, rx) = UtteranceEvents::channel(utterance.id);
        engine.speak(utterance, events).unwrap();
        rx
    }

    async fn next_kind(rx: &mut UnboundedReceiver<EngineEvent>) -> UtteranceEventKind {
        timeout(Duration::from_secs(120), rx.recv())
            .await
            .expect("engine went quiet")
            .expect("event channel closed")
            .kind
    }

    fn assert_end_near(kind: &UtteranceEventKind, expected: Duration) {
        match kind {
            UtteranceEventKind::End { elapsed } => {
                let diff = elapsed.abs_diff(expected);
                assert!(
                    diff <= Duration::from_millis(5),
                    "elapsed {elapsed:?}, expected {expected:?}"
                );
            }
            other => panic!("expected End, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn speaking_time_scales_with_length_and_rate() {
        let engine = SimulatedEngine::new();

        let mut rx = speak(&engine, utterance(1, "hello"));
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Start);
        assert_end_near(&next_kind(&mut rx).await, Duration::from_millis(500));

        let mut fast = utterance(2, "hello");
        fast.rate = 2.0;
        let mut rx = speak(&engine, fast);
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Start);
        assert_end_near(&next_kind(&mut rx).await, Duration::from_millis(250));

        assert_eq!(engine.spoken_texts(), vec!["hello", "hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_raises_end() {
        let engine = SimulatedEngine::new();
        let mut rx = speak(&engine, utterance(1, "a long sentence to cancel"));
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Start);

        sleep(Duration::from_millis(300)).await;
        engine.cancel_all();

        assert_end_near(&next_kind(&mut rx).await, Duration::from_millis(300));
        assert!(!engine.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_start_still_ends() {
        let engine = SimulatedEngine::new();
        let mut rx = speak(&engine, utterance(1, "queued"));
        engine.cancel_all();

        assert!(matches!(
            next_kind(&mut rx).await,
            UtteranceEventKind::End { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_progress_until_resume() {
        let engine = SimulatedEngine::new();
        let mut rx = speak(&engine, utterance(1, "0123456789"));
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Start);

        sleep(Duration::from_millis(400)).await;
        engine.pause();
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Pause);

        sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        engine.resume();
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Resume);
        // 400ms before the pause, 5s paused, 600ms after
        assert_end_near(&next_kind(&mut rx).await, Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_without_pause_emits_nothing() {
        let engine = SimulatedEngine::new();
        let mut rx = speak(&engine, utterance(1, "ab"));
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Start);

        engine.resume();
        engine.resume();

        assert_end_near(&next_kind(&mut rx).await, Duration::from_millis(200));
        assert_eq!(engine.resume_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_utterance_needs_resume_to_finish() {
        let engine = SimulatedEngine::builder()
            .stall_after(Duration::from_secs(2))
            .build();
        // 5 seconds of speech
        let mut rx = speak(&engine, utterance(1, "0123456789".repeat(5).as_str()));
        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Start);

        sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err(), "stalled utterance must not end");

        let kicker = {
            let engine = engine.clone();
            tokio::spawn(async move {
                loop {
                    sleep(Duration::from_secs(1)).await;
                    engine.resume();
                }
            })
        };

        assert!(matches!(
            next_kind(&mut rx).await,
            UtteranceEventKind::End { .. }
        ));
        kicker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_end_is_injected() {
        let engine = SimulatedEngine::builder().duplicate_end(true).build();
        let mut rx = speak(&engine, utterance(1, "hi"));

        assert_eq!(next_kind(&mut rx).await, UtteranceEventKind::Start);
        assert!(matches!(next_kind(&mut rx).await, UtteranceEventKind::End { .. }));
        assert!(matches!(next_kind(&mut rx).await, UtteranceEventKind::End { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_reported() {
        let engine = SimulatedEngine::builder()
            .fail_on("broken")
            .reject_on("refused")
            .build();

        let mut rx = speak(&engine, utterance(1, "broken"));
        assert!(matches!(next_kind(&mut rx).await, UtteranceEventKind::Error(_)));

        let (events, _rx) = UtteranceEvents::channel(UtteranceId::new(2));
        let err = engine.speak(utterance(2, "refused"), events).unwrap_err();
        assert!(matches!(err, EngineError::Synthesis(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn speak_replaces_active_utterance() {
        let engine = SimulatedEngine::new();
        let mut first = speak(&engine, utterance(1, "first sentence"));
        assert_eq!(next_kind(&mut first).await, UtteranceEventKind::Start);

        let mut second = speak(&engine, utterance(2, "second"));
        assert!(matches!(
            next_kind(&mut first).await,
            UtteranceEventKind::End { .. }
        ));
        assert_eq!(next_kind(&mut second).await, UtteranceEventKind::Start);
    }

    #[test]
    fn unavailable_engine_rejects_speech() {
        let engine = SimulatedEngine::builder().unavailable().build();
        assert!(!engine.is_available());

        let (events, _rx) = UtteranceEvents::channel(UtteranceId::new(1));
        let err = engine.speak(utterance(1, "x"), events).unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }
}
