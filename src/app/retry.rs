//! Exponential cooldown between retry attempts
//!
//! Shared by size probing and file transfers. Attempt 0 is the first try and
//! never waits; attempt `n >= 1` waits `cooldown × base^(n-1)`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Cooldown schedule for retried network operations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownPolicy {
    /// Cooldown before the first retry, in seconds; 0 disables sleeping
    pub cooldown_secs: f64,
    /// Growth factor applied for every further retry
    pub exponential_base: f64,
}

impl CooldownPolicy {
    pub fn new(cooldown_secs: f64, exponential_base: f64) -> Self {
        Self {
            cooldown_secs,
            exponential_base,
        }
    }

    /// Delay to apply before the given attempt (0-based)
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.cooldown_secs <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.cooldown_secs * self.exponential_base.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Sleeps before the given attempt unless cancellation is requested
    ///
    /// Returns `false` when the token was (or became) cancelled, in which case
    /// the caller must not start the attempt.
    pub async fn wait(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        let delay = self.delay_before(attempt);
        if delay.is_zero() {
            return true;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => !cancel.is_cancelled(),
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        use crate::constants::defaults;
        Self::new(
            defaults::RETRY_COOLDOWN_SECS,
            defaults::RETRY_EXPONENTIAL_BASE,
        )
    }
}
