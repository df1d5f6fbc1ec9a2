//! Playback runs.
//!
//! Every `play()` opens a new [`PlaybackRun`]. Continuations and segment
//! utterances carry the run that scheduled them; once the run's token is
//! cancelled they are inert.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub(crate) struct PlaybackRun {
    generation: u64,
    token: CancellationToken,
}

impl PlaybackRun {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            token: CancellationToken::new(),
        }
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Token shared by every clone of this run.
    pub(crate) const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_one_clone_kills_all() {
        let run = PlaybackRun::new(3);
        let continuation = run.clone();

        assert!(continuation.is_live());
        run.cancel();
        assert!(!continuation.is_live());
        assert_eq!(continuation.generation(), 3);
    }

    #[test]
    fn runs_are_independent() {
        let first = PlaybackRun::new(1);
        let second = PlaybackRun::new(2);

        first.cancel();
        assert!(second.is_live());
    }
}
