#![forbid(unsafe_code)]

//! Host-clocked coalescing timer.
//!
//! Owns a single optional deadline. Callers `schedule` as often as they like;
//! the timer fires at most once per armed deadline when the host `poll`s past
//! it. Time is supplied by the caller as a monotonic [`Duration`], so the
//! timer never reads a clock itself.
//!
//! # Modes
//!
//! | Mode | `schedule` while armed |
//! |------|------------------------|
//! | [`TimerMode::Coalesce`] | keeps the first deadline (fixed window) |
//! | [`TimerMode::Debounce`] | pushes the deadline out (quiet period) |
//!
//! A debouncing timer given a `max_wait` never pushes its deadline past
//! `max_wait` after the schedule that armed it, so a steady stream of
//! schedules still fires.
//!
//! # Invariants
//!
//! 1. At most one deadline is pending.
//! 2. `poll` returns `true` at most once per armed deadline.
//! 3. `cancel` and `flush` both disarm; only `flush` reports a firing.
//! 4. With `max_wait` set, the deadline is at most `armed_at + max_wait`.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Coalesce,
    Debounce,
}

#[derive(Debug, Clone)]
pub struct CoalescingTimer {
    delay: Duration,
    mode: TimerMode,
    max_wait: Option<Duration>,
    armed_at: Option<Duration>,
    deadline: Option<Duration>,
    fired: u64,
}

impl CoalescingTimer {
    #[must_use]
    pub fn new(delay: Duration, mode: TimerMode) -> Self {
        Self {
            delay,
            mode,
            max_wait: None,
            armed_at: None,
            deadline: None,
            fired: 0,
        }
    }

    /// Fixed-window timer: the first `schedule` in a window sets the deadline.
    #[must_use]
    pub fn coalescing(delay: Duration) -> Self {
        Self::new(delay, TimerMode::Coalesce)
    }

    /// Quiet-period timer: every `schedule` restarts the delay.
    #[must_use]
    pub fn debouncing(delay: Duration) -> Self {
        Self::new(delay, TimerMode::Debounce)
    }

    /// Cap how far a debouncing timer may push its deadline.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    fn capped(&self, armed_at: Duration, target: Duration) -> Duration {
        match self.max_wait {
            Some(max_wait) => target.min(armed_at.saturating_add(max_wait)),
            None => target,
        }
    }

    /// Arm the timer. Returns `true` if it was idle before.
    pub fn schedule(&mut self, now: Duration) -> bool {
        let target = now.saturating_add(self.delay);
        match (self.deadline, self.armed_at, self.mode) {
            (None, _, _) | (Some(_), None, _) => {
                self.armed_at = Some(now);
                self.deadline = Some(self.capped(now, target));
                true
            }
            (Some(_), Some(_), TimerMode::Coalesce) => false,
            (Some(_), Some(armed_at), TimerMode::Debounce) => {
                self.deadline = Some(self.capped(armed_at, target));
                false
            }
        }
    }

    fn disarm(&mut self) -> bool {
        self.armed_at = None;
        self.deadline.take().is_some()
    }

    /// Disarm without firing. Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.disarm()
    }

    /// Fire immediately if armed.
    pub fn flush(&mut self) -> bool {
        if self.disarm() {
            self.fired += 1;
            true
        } else {
            false
        }
    }

    /// Fire if the deadline has passed.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.disarm();
                self.fired += 1;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of times the timer fired.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.fired
    }
}
