//! Polling of the remote playback state and local progress interpolation.
//!
//! The poller is a two-state machine:
//!
//! ```text
//! STOPPED --start--> POLLING --stop--> STOPPED
//! ```
//!
//! While polling, a [`Ticker`] fires at the poll interval and the integration
//! reads the current playback state on each [`Tick::Poll`]. Between polls a
//! second, one-second ticker advances the position locally so the host's
//! progress bar moves; it only runs while the last snapshot says playing.

use std::{fmt, time::Duration};

use crate::{scheduler::Ticker, state::Snapshot};

/// Poller state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PollerState {
    #[default]
    Stopped,
    Polling,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Polling => write!(f, "polling"),
        }
    }
}

/// What a completed wait on the poller asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tick {
    /// Time to read the remote playback state.
    Poll,
    /// One second of playback has passed locally.
    Progress,
}

#[derive(Debug)]
pub struct Poller {
    poll: Ticker,
    progress: Ticker,
    position: Duration,
    duration: Duration,
}

impl Poller {
    /// Default interval between playback state reads.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(4);

    /// Interval of the local position interpolation.
    pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

    /// Creates a stopped poller.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            poll: Ticker::new(interval),
            progress: Ticker::new(Self::PROGRESS_INTERVAL),
            position: Duration::ZERO,
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn state(&self) -> PollerState {
        if self.poll.is_running() {
            PollerState::Polling
        } else {
            PollerState::Stopped
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.poll.period()
    }

    /// Starts polling. Does nothing when already polling.
    pub fn start(&mut self) {
        if !self.poll.is_running() {
            self.poll.start();
        }
    }

    /// Stops both tickers.
    pub fn stop(&mut self) {
        self.poll.stop();
        self.progress.stop();
    }

    /// Takes position and duration from a fresh snapshot, and runs the
    /// progress ticker only while it is playing.
    pub fn apply(&mut self, snapshot: &Snapshot) {
        self.position = snapshot.position;
        self.duration = snapshot.duration;

        if snapshot.is_playing() && self.poll.is_running() {
            if !self.progress.is_running() {
                self.progress.start();
            }
        } else {
            self.progress.stop();
        }
    }

    #[must_use]
    pub fn is_progressing(&self) -> bool {
        self.progress.is_running()
    }

    #[must_use]
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Advances the position by one progress interval, capped at the
    /// duration, and returns it.
    pub fn advance(&mut self) -> Duration {
        self.position = (self.position + Self::PROGRESS_INTERVAL).min(self.duration);
        self.position
    }

    /// Waits for the next tick of either ticker.
    ///
    /// Pending forever while stopped. Cancel safe.
    pub async fn next(&mut self) -> Tick {
        let Self { poll, progress, .. } = self;
        tokio::select! {
            _ = poll.tick() => Tick::Poll,
            _ = progress.tick() => Tick::Progress,
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::state::PlayerState;

    fn playing(position: u64, duration: u64) -> Snapshot {
        Snapshot {
            state: PlayerState::Playing,
            title: "So What".to_owned(),
            position: Duration::from_secs(position),
            duration: Duration::from_secs(duration),
            ..Snapshot::off()
        }
    }

    #[test]
    fn starts_stopped() {
        let poller = Poller::default();
        assert_eq!(poller.state(), PollerState::Stopped);
        assert_eq!(poller.interval(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_at_interval() {
        let start = Instant::now();
        let mut poller = Poller::new(Duration::from_secs(4));
        poller.start();
        poller.start();

        assert_eq!(poller.next().await, Tick::Poll);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn progresses_only_while_playing() {
        let mut poller = Poller::new(Duration::from_secs(10));
        poller.start();

        poller.apply(&playing(30, 300));
        assert!(poller.is_progressing());
        assert_eq!(poller.next().await, Tick::Progress);
        assert_eq!(poller.advance(), Duration::from_secs(31));

        poller.apply(&Snapshot::off());
        assert!(!poller.is_progressing());
        assert_eq!(poller.position(), Duration::ZERO);
    }

    #[test]
    fn position_is_capped_at_duration() {
        let mut poller = Poller::default();
        poller.apply(&playing(299, 300));
        poller.advance();
        assert_eq!(poller.advance(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_stops_progress() {
        let mut poller = Poller::default();
        poller.start();
        poller.apply(&playing(0, 300));
        poller.stop();

        assert_eq!(poller.state(), PollerState::Stopped);
        assert!(!poller.is_progressing());
        let tick = tokio::time::timeout(Duration::from_secs(10), poller.next()).await;
        assert!(tick.is_err());
    }
}
