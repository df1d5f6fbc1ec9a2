//! Keep-alive ticker for long utterances.
//!
//! Some engines stop advancing a long utterance without ever reporting its
//! end. While an utterance is speaking the sequencer polls [`Watchdog::tick`]
//! and nudges the engine with `resume()` on every tick.
//!
//! The watchdog is owned by the sequencer task and polled from its `select!`
//! loop, so a tick can never race with the end event that disarms it.

use std::time::Duration;

use readaloud_core::UtteranceId;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

struct Armed {
    utterance: UtteranceId,
    ticker: Interval,
}

pub(crate) struct Watchdog {
    period: Duration,
    armed: Option<Armed>,
}

impl Watchdog {
    pub(crate) const fn new(period: Duration) -> Self {
        Self {
            period,
            armed: None,
        }
    }

    /// Arm for `utterance`, replacing any previous ticker.
    ///
    /// The first tick fires one full period from now.
    pub(crate) fn arm(&mut self, utterance: UtteranceId) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.armed = Some(Armed { utterance, ticker });
        tracing::trace!(%utterance, period_ms = self.period.as_millis(), "Watchdog armed");
    }

    pub(crate) fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            tracing::trace!(utterance = %armed.utterance, "Watchdog disarmed");
        }
    }

    /// Disarm only if armed for `utterance`.
    pub(crate) fn disarm_for(&mut self, utterance: UtteranceId) {
        if self.armed_for() == Some(utterance) {
            self.disarm();
        }
    }

    pub(crate) fn armed_for(&self) -> Option<UtteranceId> {
        self.armed.as_ref().map(|a| a.utterance)
    }

    pub(crate) const fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Wait for the next tick. Never resolves while disarmed.
    pub(crate) async fn tick(&mut self) -> UtteranceId {
        match self.armed.as_mut() {
            Some(armed) => {
                armed.ticker.tick().await;
                armed.utterance
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready, task};

    const PERIOD: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_period() {
        let mut watchdog = Watchdog::new(PERIOD);
        watchdog.arm(UtteranceId::new(1));

        assert!(
            timeout(Duration::from_millis(900), watchdog.tick())
                .await
                .is_err()
        );
        assert_eq!(watchdog.tick().await, UtteranceId::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_repeat_every_period() {
        let mut watchdog = Watchdog::new(PERIOD);
        let start = Instant::now();
        watchdog.arm(UtteranceId::new(1));

        watchdog.tick().await;
        watchdog.tick().await;
        watchdog.tick().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= PERIOD * 3 && elapsed < PERIOD * 3 + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_wakes_when_the_period_elapses() {
        let mut watchdog = Watchdog::new(PERIOD);
        watchdog.arm(UtteranceId::new(3));
        let mut tick = task::spawn(watchdog.tick());

        assert_pending!(tick.poll());
        tokio::time::advance(PERIOD).await;
        assert!(tick.is_woken());
        assert_eq!(assert_ready!(tick.poll()), UtteranceId::new(3));
    }

    #[test]
    fn disarmed_tick_is_pending() {
        let mut watchdog = Watchdog::new(PERIOD);
        let mut tick = task::spawn(watchdog.tick());
        assert_pending!(tick.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_watchdog_never_ticks() {
        let mut watchdog = Watchdog::new(PERIOD);
        watchdog.arm(UtteranceId::new(1));
        watchdog.disarm();

        assert!(!watchdog.is_armed());
        assert!(timeout(PERIOD * 5, watchdog.tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_the_period() {
        let mut watchdog = Watchdog::new(PERIOD);
        watchdog.arm(UtteranceId::new(1));
        tokio::time::sleep(Duration::from_millis(700)).await;

        watchdog.arm(UtteranceId::new(2));
        assert!(
            timeout(Duration::from_millis(500), watchdog.tick())
                .await
                .is_err()
        );
        assert_eq!(watchdog.tick().await, UtteranceId::new(2));
    }

    #[tokio::test]
    async fn disarm_for_ignores_other_utterances() {
        let mut watchdog = Watchdog::new(PERIOD);
        watchdog.arm(UtteranceId::new(5));

        watchdog.disarm_for(UtteranceId::new(4));
        assert_eq!(watchdog.armed_for(), Some(UtteranceId::new(5)));

        watchdog.disarm_for(UtteranceId::new(5));
        assert!(watchdog.armed_for().is_none());
    }
}
