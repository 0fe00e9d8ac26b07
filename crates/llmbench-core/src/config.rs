//! Engine tuning knobs. Every value has a default so a workspace file may
//! omit the whole `engine:` section.

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts allowed per phase before a recoverable failure turns terminal.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    pub lease_duration_ms: u64,
    pub reap_interval_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            lease_duration_ms: 120_000,
            reap_interval_ms: 15_000,
        }
    }
}

impl LeaseConfig {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub task_workers: usize,
    pub judge_workers: usize,
    pub idle_poll_min_ms: u64,
    pub idle_poll_max_ms: u64,
    /// Period of the aggregator's fallback sweep.
    pub sweep_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            task_workers: 4,
            judge_workers: 2,
            idle_poll_min_ms: 200,
            idle_poll_max_ms: 5_000,
            sweep_interval_ms: 10_000,
        }
    }
}

impl PoolConfig {
    pub fn idle_poll_min(&self) -> Duration {
        Duration::from_millis(self.idle_poll_min_ms)
    }

    pub fn idle_poll_max(&self) -> Duration {
        Duration::from_millis(self.idle_poll_max_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub lease: LeaseConfig,
    pub workers: PoolConfig,
    pub provider_timeout_ms: Option<u64>,
}

const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 60_000;

impl EngineConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(
            self.provider_timeout_ms
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_MS),
        )
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.retry.max_attempts == 0 {
            return Err(EngineError::validation("retry.max_attempts must be >= 1"));
        }
        if self.retry.multiplier < 1.0 || !self.retry.multiplier.is_finite() {
            return Err(EngineError::validation("retry.multiplier must be >= 1.0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(EngineError::validation(
                "retry.base_delay_ms must not exceed retry.max_delay_ms",
            ));
        }
        if self.lease.lease_duration_ms == 0 {
            return Err(EngineError::validation("lease.lease_duration_ms must be > 0"));
        }
        if self.lease.reap_interval_ms == 0 {
            return Err(EngineError::validation("lease.reap_interval_ms must be > 0"));
        }
        if self.workers.idle_poll_min_ms == 0 {
            return Err(EngineError::validation("workers.idle_poll_min_ms must be > 0"));
        }
        if self.workers.idle_poll_min_ms > self.workers.idle_poll_max_ms {
            return Err(EngineError::validation(
                "workers.idle_poll_min_ms must not exceed workers.idle_poll_max_ms",
            ));
        }
        if self.workers.sweep_interval_ms == 0 {
            return Err(EngineError::validation("workers.sweep_interval_ms must be > 0"));
        }
        if self.provider_timeout_ms == Some(0) {
            return Err(EngineError::validation("provider_timeout_ms must be > 0"));
        }
        // a call that may outlive its lease can never complete it
        if self.provider_timeout() >= self.lease.lease_duration() {
            return Err(EngineError::validation(
                "provider_timeout_ms must be below lease.lease_duration_ms",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.provider_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: EngineConfig = serde_yaml::from_str(
            "retry:\n  max_attempts: 5\nworkers:\n  task_workers: 8\n",
        )
        .unwrap();
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.base_delay_ms, 2_000);
        assert_eq!(cfg.workers.task_workers, 8);
        assert_eq!(cfg.workers.judge_workers, 2);
        assert_eq!(cfg.lease.lease_duration_ms, 120_000);
    }

    #[test]
    fn rejects_zero_attempts_and_inverted_poll_bounds() {
        let mut cfg = EngineConfig::default();
        cfg.retry.max_attempts = 0;
        assert!(matches!(cfg.validate(), Err(EngineError::Validation(_))));

        let mut cfg = EngineConfig::default();
        cfg.workers.idle_poll_min_ms = 10_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_idle_poll() {
        let mut cfg = EngineConfig::default();
        cfg.workers.idle_poll_min_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("idle_poll_min_ms"), "{}", err);
    }

    #[test]
    fn provider_timeout_must_fit_inside_lease() {
        let mut cfg = EngineConfig::default();
        cfg.lease.lease_duration_ms = 30_000;
        cfg.provider_timeout_ms = Some(30_000);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("lease_duration_ms"), "{}", err);

        // the default timeout counts too
        cfg.provider_timeout_ms = None;
        assert!(cfg.validate().is_err());

        cfg.provider_timeout_ms = Some(29_999);
        cfg.validate().unwrap();
    }
}
