//! Reconnect delay policy.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;

/// How the delay grows between consecutive failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every attempt.
    Fixed,
    /// Delay multiplied by `multiplier` per attempt, capped at `max_delay_ms`.
    Exponential,
}

/// Reconnect policy for a dropped event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub strategy: BackoffStrategy,
    /// Delay before the first reconnect attempt.
    pub delay_ms: u64,
    /// Upper bound for exponential growth.
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Fraction of the delay (0.0-1.0) randomly shaved off each wait.
    pub jitter: f64,
    /// Consecutive failed attempts before giving up (None = retry forever).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            delay_ms: 3_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    /// Fixed delay with no jitter and no attempt limit.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            delay_ms: duration_ms(delay),
            max_delay_ms: duration_ms(delay),
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: None,
        }
    }

    /// Exponential backoff starting at `initial`, capped at `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            delay_ms: duration_ms(initial),
            max_delay_ms: duration_ms(max),
            ..Self::default()
        }
    }

    /// Set the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before `attempt` (1-based), without jitter.
    ///
    /// Returns `None` once `attempt` exceeds `max_attempts`.
    pub fn base_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return Some(Duration::ZERO);
        }
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }

        let millis = match self.strategy {
            BackoffStrategy::Fixed => self.delay_ms,
            BackoffStrategy::Exponential => {
                let exponent = (attempt - 1).min(63) as i32;
                let scaled = self.delay_ms as f64 * self.multiplier.powi(exponent);
                if scaled.is_finite() {
                    (scaled as u64).min(self.max_delay_ms.max(self.delay_ms))
                } else {
                    self.max_delay_ms.max(self.delay_ms)
                }
            }
        };
        Some(Duration::from_millis(millis))
    }

    /// Delay before `attempt` with jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        let base = self.base_delay(attempt)?;
        if self.jitter <= 0.0 || base.is_zero() {
            return Some(base);
        }
        let factor: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let shave = base.as_millis() as f64 * self.jitter.min(1.0) * factor;
        let millis = (base.as_millis() as f64 - shave).max(1.0) as u64;
        Some(Duration::from_millis(millis))
    }

    /// Reject settings that would spin or never wait.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.delay_ms == 0 {
            return Err(CoreError::config("reconnect delay_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(CoreError::config(format!(
                "reconnect jitter must be within [0, 1], got {}",
                self.jitter
            )));
        }
        if self.strategy == BackoffStrategy::Exponential && !(self.multiplier >= 1.0) {
            return Err(CoreError::config(format!(
                "reconnect multiplier must be >= 1, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
