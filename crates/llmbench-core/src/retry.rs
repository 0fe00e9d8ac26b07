//! Failure classification and exponential backoff.
//!
//! Pure: the outcome depends only on (failure kind, attempts made).

use crate::config::RetryConfig;
use crate::errors::FailureKind;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Recoverable,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue the item; it may be leased again after `delay`.
    Retry { delay: Duration },
    /// Fail the item. `exhausted` is set when a recoverable failure hit the ceiling.
    Fail { exhausted: bool },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn classify(&self, kind: FailureKind) -> Disposition {
        match kind {
            FailureKind::ProviderRateLimit
            | FailureKind::ProviderTimeout
            | FailureKind::ProviderServer
            | FailureKind::Network
            | FailureKind::InvalidResponse
            | FailureKind::JudgeParse => Disposition::Recoverable,
            FailureKind::Auth
            | FailureKind::InvalidRequest
            | FailureKind::InvalidConfig
            | FailureKind::Other => Disposition::Terminal,
        }
    }

    /// Delay before the attempt following attempt number `attempts` (1-based).
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(63) as i32;
        let raw = self.config.base_delay_ms as f64 * self.config.multiplier.powi(exp);
        let capped = if raw.is_finite() {
            raw.min(self.config.max_delay_ms as f64)
        } else {
            self.config.max_delay_ms as f64
        };
        Duration::from_millis(capped as u64)
    }

    /// `attempts` counts the attempts already made in the failing phase,
    /// including the one that just failed.
    pub fn decide(&self, kind: FailureKind, attempts: u32) -> RetryDecision {
        match self.classify(kind) {
            Disposition::Terminal => RetryDecision::Fail { exhausted: false },
            Disposition::Recoverable if attempts >= self.config.max_attempts => {
                RetryDecision::Fail { exhausted: true }
            }
            Disposition::Recoverable => RetryDecision::Retry {
                delay: self.next_delay(attempts),
            },
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
