//! Restart policy and failure backoff

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Governs how consecutive tick failures translate into increased inter-tick
/// delay and, beyond the failure cap, into permanently disabled scheduling.
///
/// Failure `n` (1-based) delays the next dispatch by
/// `min(backoff_base * backoff_multiplier^(n-1), backoff_max)` instead of the
/// nominal cadence; any successful tick resets the count and restores the
/// cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// Consecutive failures tolerated before scheduling stops for good;
    /// `None` means restart forever
    pub max_consecutive_failures: Option<u32>,

    /// Delay after the first failure
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    /// Upper bound on the backoff delay
    #[serde(with = "humantime_serde")]
    pub backoff_max: Duration,

    /// Growth factor per consecutive failure (>= 1)
    pub backoff_multiplier: f64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: Some(3),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RestartPolicy {
    /// A policy that restarts forever with the default backoff curve
    pub fn unbounded() -> Self {
        Self {
            max_consecutive_failures: None,
            ..Self::default()
        }
    }

    /// Sets the failure cap (`None` = unbounded)
    pub fn with_max_consecutive_failures(mut self, cap: Option<u32>) -> Self {
        self.max_consecutive_failures = cap;
        self
    }

    /// Sets the base backoff delay
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Sets the backoff ceiling
    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    /// Sets the backoff growth factor
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before the next dispatch after `consecutive_failures` failures
    /// in a row (1-based). Returns zero for a count of zero.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }
        // Cap the exponent so the f64 math cannot overflow to infinity
        let exponent = (consecutive_failures - 1).min(64) as i32;
        let delay = self.backoff_base.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let max = self.backoff_max.as_secs_f64();
        Duration::from_secs_f64(delay.min(max))
    }

    /// Whether `consecutive_failures` has gone past the cap
    pub fn cap_exceeded(&self, consecutive_failures: u32) -> bool {
        self.max_consecutive_failures
            .is_some_and(|cap| consecutive_failures > cap)
    }
}

impl From<cadre_core::config::RestartSettings> for RestartPolicy {
    fn from(settings: cadre_core::config::RestartSettings) -> Self {
        Self {
            max_consecutive_failures: settings.max_consecutive_failures,
            backoff_base: settings.backoff_base,
            backoff_max: settings.backoff_max,
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}
