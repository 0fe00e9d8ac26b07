//! RunCoordinator: validates a run request, fans it out into items and
//! answers run lifecycle queries. It never waits for execution.

use super::aggregator::RunStatusAggregator;
use crate::errors::EngineError;
use crate::lease::{ItemLeaseManager, CANCELED_MESSAGE};
use crate::model::{BenchmarkRun, ItemSpec, RunDetail, RunStatus, Target};
use crate::providers::ProviderStore;
use crate::tasks::TaskStore;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRunRequest {
    pub task_collection_id: String,
    pub judge: Target,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    /// False when the run had already been canceled.
    pub newly_canceled: bool,
    /// Idle items failed by this call.
    pub failed_items: usize,
    /// Whether the run is FINISHED after this call.
    pub finished: bool,
}

#[derive(Clone)]
pub struct RunCoordinator {
    leases: ItemLeaseManager,
    aggregator: RunStatusAggregator,
    providers: Arc<dyn ProviderStore>,
    tasks: Arc<dyn TaskStore>,
}

impl RunCoordinator {
    pub fn new(
        leases: ItemLeaseManager,
        aggregator: RunStatusAggregator,
        providers: Arc<dyn ProviderStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            leases,
            aggregator,
            providers,
            tasks,
        }
    }

    /// Creates the run and its task x target items; returns the run id.
    pub fn start_run(&self, request: &StartRunRequest) -> Result<String, EngineError> {
        if request.targets.is_empty() {
            return Err(EngineError::validation("at least one target is required"));
        }
        let mut seen = HashSet::new();
        for target in &request.targets {
            if !seen.insert(target) {
                return Err(EngineError::validation(format!("duplicate target '{}'", target)));
            }
        }

        self.providers.get(&request.judge.provider_id)?;
        for target in &request.targets {
            self.providers.get(&target.provider_id)?;
        }

        let tasks = self.tasks.list_tasks_in_collection(&request.task_collection_id)?;
        if tasks.is_empty() {
            return Err(EngineError::validation(format!(
                "task collection '{}' is empty",
                request.task_collection_id
            )));
        }

        let now = Utc::now();
        let run = BenchmarkRun {
            id: Uuid::new_v4().to_string(),
            status: RunStatus::Pending,
            task_collection_id: request.task_collection_id.clone(),
            judge: request.judge.clone(),
            created_at: now,
            canceled_at: None,
            finished_at: None,
        };
        let specs: Vec<ItemSpec> = tasks
            .iter()
            .flat_map(|task| {
                request.targets.iter().map(move |target| ItemSpec {
                    task_id: task.id.clone(),
                    target: target.clone(),
                })
            })
            .collect();
        self.leases.create_run_with_items(&run, &specs, now)?;

        info!(
            run_id = %run.id,
            collection = %run.task_collection_id,
            judge = %run.judge,
            tasks = tasks.len(),
            targets = request.targets.len(),
            items = specs.len(),
            "run started"
        );
        Ok(run.id)
    }

    pub fn get_run(&self, run_id: &str) -> Result<RunDetail, EngineError> {
        self.leases.store().get_run_detail(run_id)
    }

    pub fn list_runs(&self) -> Result<Vec<BenchmarkRun>, EngineError> {
        self.leases.store().list_runs()
    }

    /// Stops new leases, fails idle items and lets in-flight work drain.
    pub fn cancel_run(&self, run_id: &str) -> Result<CancelOutcome, EngineError> {
        let now = Utc::now();
        let store = self.leases.store();
        let run = store.get_run(run_id)?;
        if run.status == RunStatus::Finished {
            return Ok(CancelOutcome {
                newly_canceled: false,
                failed_items: 0,
                finished: true,
            });
        }

        let newly_canceled = store.mark_run_canceled(run_id, now)?;
        let failed_items = self.leases.fail_unleased_items(run_id, CANCELED_MESSAGE, now)?;
        let finished = self.aggregator.finalize(run_id, now)?
            || store.get_run(run_id)?.status == RunStatus::Finished;

        info!(run_id, failed_items, finished, "run canceled");
        Ok(CancelOutcome {
            newly_canceled,
            failed_items,
            finished,
        })
    }

    /// Removes a finished run and its items.
    pub fn delete_run(&self, run_id: &str) -> Result<(), EngineError> {
        let store = self.leases.store();
        let run = store.get_run(run_id)?;
        if run.status != RunStatus::Finished {
            return Err(EngineError::validation(format!(
                "run {} is still executing; cancel it and wait for it to finish first",
                run_id
            )));
        }
        store.delete_run(run_id)?;
        info!(run_id, "run deleted");
        Ok(())
    }
}
