//! Retry policy, backoff schedule, and politeness pacing.
//!
//! All waiting goes through the [`Sleeper`] trait so tests can record the
//! requested delays instead of actually blocking.

use std::time::{Duration, Instant};

use crate::config::ClientConfig;

/// Something that can block the current thread for a duration.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Exponential backoff: retry `n` (counting from 0) waits `base * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base())
    }

    /// Delay before the retry following failed attempt `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// Total attempts a request may make, first try included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Enforces a minimum gap between consecutive requests.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    /// Block until at least `delay` has passed since the previous request
    /// finished. The first request never waits.
    pub fn wait<S: Sleeper + ?Sized>(&self, sleeper: &S) {
        let Some(last) = self.last else {
            return;
        };
        let elapsed = last.elapsed();
        if elapsed < self.delay {
            sleeper.sleep(self.delay - elapsed);
        }
    }

    /// Record that a request just finished.
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }
}
