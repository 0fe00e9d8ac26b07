//! Execution engine: workers, aggregation and the run coordinator, wired
//! together by `BenchmarkEngine`.

pub mod aggregator;
pub mod coordinator;
pub mod executor;
pub mod judge_worker;
pub mod pool;
pub mod worker;

pub use aggregator::RunStatusAggregator;
pub use coordinator::{CancelOutcome, RunCoordinator, StartRunRequest};
pub use executor::TaskExecutor;
pub use judge_worker::JudgeEvaluator;
pub use pool::{Role, WorkerPool};
pub use worker::{StepOutcome, Worker, WorkerContext};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::lease::ItemLeaseManager;
use crate::model::{RunDetail, RunStatus};
use crate::providers::{ProviderClient, ProviderStore};
use crate::retry::RetryPolicy;
use crate::storage::Store;
use crate::tasks::TaskStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub struct BenchmarkEngine {
    ctx: Arc<WorkerContext>,
    coordinator: RunCoordinator,
}

impl BenchmarkEngine {
    pub fn new(
        store: Store,
        config: EngineConfig,
        providers: Arc<dyn ProviderStore>,
        tasks: Arc<dyn TaskStore>,
        client: Arc<dyn ProviderClient>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let leases = ItemLeaseManager::new(store.clone(), RetryPolicy::new(config.retry.clone()));
        let aggregator = RunStatusAggregator::new(store);
        let coordinator = RunCoordinator::new(
            leases.clone(),
            aggregator.clone(),
            providers.clone(),
            tasks.clone(),
        );
        let ctx = Arc::new(WorkerContext {
            leases,
            aggregator,
            providers,
            tasks,
            client,
            config,
        });
        Ok(Self { ctx, coordinator })
    }

    pub fn coordinator(&self) -> &RunCoordinator {
        &self.coordinator
    }

    pub fn leases(&self) -> &ItemLeaseManager {
        &self.ctx.leases
    }

    pub fn aggregator(&self) -> &RunStatusAggregator {
        &self.ctx.aggregator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Spawns the configured pool. Must be called inside a tokio runtime.
    pub fn start_workers(&self) -> WorkerPool {
        WorkerPool::start(self.ctx.clone())
    }

    /// A single task worker for callers that drive iterations themselves.
    pub fn task_executor(&self, id: impl Into<String>) -> TaskExecutor {
        TaskExecutor::new(id, self.ctx.clone())
    }

    pub fn judge_evaluator(&self, id: impl Into<String>) -> JudgeEvaluator {
        JudgeEvaluator::new(id, self.ctx.clone())
    }

    /// Polls until the run is FINISHED. Wrap in `tokio::time::timeout` to bound it.
    pub async fn wait_for_run(&self, run_id: &str, poll: Duration) -> Result<RunDetail, EngineError> {
        loop {
            self.ctx.aggregator.finalize(run_id, Utc::now())?;
            let detail = self.coordinator.get_run(run_id)?;
            if detail.run.status == RunStatus::Finished {
                return Ok(detail);
            }
            tokio::time::sleep(poll).await;
        }
    }
}
