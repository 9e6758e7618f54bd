//! Exponential backoff for the per-symbol fetch loop
//!
//! The policy is immutable configuration; the current delay lives in a
//! [`BackoffState`] that the caller owns and passes into each symbol step.
//! The same delay value paces both retries and the pause between symbols.
//!
//! By default the delay is never reset: every fetch failure during a run
//! doubles it for the remainder of that run. Set
//! [`BackoffPolicy::reset_per_symbol`] to start each symbol from the initial
//! delay instead.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Starting delay in milliseconds (default: 1000)
    pub initial_delay_ms: u64,
    /// Total fetch attempts per symbol, including the first (default: 3)
    pub max_attempts: u32,
    /// Upper bound on the delay in milliseconds (default: none)
    pub max_delay_ms: Option<u64>,
    /// Reset the delay before every symbol (default: false)
    pub reset_per_symbol: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_attempts: 3,
            max_delay_ms: None,
            reset_per_symbol: false,
        }
    }
}

impl BackoffPolicy {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn with_reset_per_symbol(mut self, reset: bool) -> Self {
        self.reset_per_symbol = reset;
        self
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Fresh state at the initial delay
    pub fn start(&self) -> BackoffState {
        BackoffState {
            delay: self.initial_delay(),
            failures: 0,
            max_delay: self.max_delay_ms.map(Duration::from_millis),
        }
    }
}

/// Mutable backoff state for one scan run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffState {
    delay: Duration,
    failures: u32,
    max_delay: Option<Duration>,
}

impl BackoffState {
    pub fn current(&self) -> Duration {
        self.delay
    }

    /// Failures recorded since this state was created or last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failure and double the delay
    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        let doubled = self.delay.saturating_mul(2);
        self.delay = match self.max_delay {
            Some(cap) => doubled.min(cap),
            None => doubled,
        };
    }

    pub fn reset(&mut self, policy: &BackoffPolicy) {
        *self = policy.start();
    }
}
