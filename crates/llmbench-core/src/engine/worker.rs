//! Plumbing shared by the task and judge workers: collaborators, the bounded
//! provider call, lease settlement and the poll loop.

use super::aggregator::RunStatusAggregator;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::lease::{ItemLeaseManager, Transition};
use crate::providers::{
    InferenceRequest, InferenceResponse, ProviderClient, ProviderConfig, ProviderError,
    ProviderStore,
};
use crate::tasks::TaskStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Everything a worker needs; cheap to share behind an `Arc`.
pub struct WorkerContext {
    pub leases: ItemLeaseManager,
    pub aggregator: RunStatusAggregator,
    pub providers: Arc<dyn ProviderStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub client: Arc<dyn ProviderClient>,
    pub config: EngineConfig,
}

/// What one iteration of a worker did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Empty poll.
    Idle,
    Processed(Transition),
    /// Lease lost before completion; result thrown away.
    Discarded { item_id: i64 },
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn id(&self) -> &str;

    async fn run_once(&self) -> Result<StepOutcome, EngineError>;
}

/// Calls the provider, turning an overrun of `request.timeout` into
/// `ProviderError::Timeout` even if the client ignores the deadline.
pub(crate) async fn call_provider(
    client: &dyn ProviderClient,
    provider: &ProviderConfig,
    request: &InferenceRequest,
) -> Result<InferenceResponse, ProviderError> {
    match tokio::time::timeout(request.timeout, client.infer(provider, request)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            timeout_ms: request.timeout.as_millis() as u64,
        }),
    }
}

/// Turns the result of a `complete*` call into a step outcome. A stale lease
/// is a no-op; a terminal transition nudges the aggregator.
pub(crate) fn settle(
    ctx: &WorkerContext,
    worker_id: &str,
    item_id: i64,
    completion: Result<Transition, EngineError>,
    now: DateTime<Utc>,
) -> Result<StepOutcome, EngineError> {
    match completion {
        Ok(transition) => {
            if transition.is_terminal() {
                // the periodic sweep finalizes the run if this fails
                if let Err(e) = ctx.aggregator.on_item_terminal(&transition, now) {
                    warn!(run_id = %transition.run_id, error = %e, "run finalization deferred");
                }
            }
            Ok(StepOutcome::Processed(transition))
        }
        Err(e) if e.is_stale_lease() => {
            debug!(item_id, worker_id, "lease lost, discarding result");
            Ok(StepOutcome::Discarded { item_id })
        }
        Err(e) => Err(e),
    }
}

/// Shortest idle sleep; a zero minimum would never grow.
const MIN_IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Exponential idle backoff between `min` and `max`.
#[derive(Debug, Clone, Copy)]
pub struct IdleBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl IdleBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min = min.max(MIN_IDLE_SLEEP);
        Self {
            min,
            max: max.max(min),
            current: min,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// Returns the delay to sleep now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }
}

/// Polls `worker` until `stop` flips to true or its sender is dropped.
/// Iteration errors are logged and backed off; they never end the loop.
pub async fn run_loop<W: Worker + ?Sized>(
    worker: &W,
    mut backoff: IdleBackoff,
    mut stop: watch::Receiver<bool>,
) {
    debug!(worker_id = worker.id(), "worker started");
    loop {
        if *stop.borrow() {
            break;
        }
        let pause = match worker.run_once().await {
            Ok(StepOutcome::Idle) => Some(backoff.next_delay()),
            Ok(_) => {
                backoff.reset();
                None
            }
            Err(e) => {
                warn!(worker_id = worker.id(), error = %e, "worker iteration failed");
                Some(backoff.next_delay())
            }
        };
        if let Some(pause) = pause {
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
    debug!(worker_id = worker.id(), "worker stopped");
}
