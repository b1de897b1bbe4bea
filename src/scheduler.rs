//! Timers owned by the integration task.
//!
//! * [`Deadline`] - single-shot, e.g. the token refresh
//! * [`Ticker`] - periodic, e.g. polling and progress
//!
//! Both are plain values polled from a `tokio::select!` loop. Arming or
//! starting one that is already running replaces it, so timers never stack.
//! While disarmed or stopped, waiting on them never completes, which lets
//! the select loop keep a branch for every timer at all times.
//!
//! Everything runs on the tokio clock: tests pause it with
//! `#[tokio::test(start_paused = true)]` and let it auto-advance.

use std::{future, pin::Pin, time::Duration};

use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

/// Single-shot timer.
#[derive(Debug, Default)]
pub struct Deadline {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the deadline to fire after `delay`, cancelling any previous one.
    pub fn arm(&mut self, delay: Duration) {
        let deadline = Instant::now() + delay;
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(time::sleep_until(deadline))),
        }
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// When the deadline fires, if armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|sleep| sleep.deadline())
    }

    /// Time left until the deadline fires, if armed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Completes when the deadline fires, and disarms it.
    ///
    /// Pending forever while disarmed. Cancel safe: dropping the future
    /// leaves the deadline armed.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.await;
                self.sleep = None;
            }
            None => future::pending().await,
        }
    }
}

/// Periodic timer.
///
/// The first tick completes one period after starting. Ticks missed because
/// the task was busy are delayed rather than burst.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    interval: Option<Interval>,
}

impl Ticker {
    /// Creates a stopped ticker.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        assert!(!period.is_zero(), "ticker period is zero");
        Self {
            period,
            interval: None,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts ticking, restarting the period if already running.
    pub fn start(&mut self) {
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Completes on the next tick. Pending forever while stopped.
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => future::pending().await,
        }
    }
}
