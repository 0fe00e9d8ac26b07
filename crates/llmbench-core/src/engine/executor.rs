//! TaskExecutor: PENDING items -> target provider -> WAITING_FOR_JUDGE.

use super::worker::{call_provider, settle, StepOutcome, Worker, WorkerContext};
use crate::errors::{EngineError, ItemFailure};
use crate::judge::build_task_prompt;
use crate::lease::{Lease, TaskOutput};
use crate::model::RunItem;
use crate::providers::InferenceRequest;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

pub struct TaskExecutor {
    id: String,
    ctx: Arc<WorkerContext>,
}

impl TaskExecutor {
    pub fn new(id: impl Into<String>, ctx: Arc<WorkerContext>) -> Self {
        Self { id: id.into(), ctx }
    }

    async fn execute(&self, item: &RunItem, lease: &Lease) -> Result<TaskOutput, ItemFailure> {
        let task = self
            .ctx
            .tasks
            .get_task(&item.task_id)
            .map_err(|e| ItemFailure::other(e.to_string()))?;
        let provider = self
            .ctx
            .providers
            .get(&item.target.provider_id)
            .map_err(|e| ItemFailure::invalid_config(e.to_string()).with_provider(&item.target.provider_id))?;

        let request = InferenceRequest {
            model: item.target.model.clone(),
            prompt: build_task_prompt(&task),
            request_id: Some(lease.request_id.clone()),
            timeout: self.ctx.config.provider_timeout(),
        };
        let resp = call_provider(self.ctx.client.as_ref(), &provider, &request)
            .await
            .map_err(|e| e.into_failure(&provider.id))?;

        Ok(TaskOutput {
            text: resp.text,
            elapsed_ms: resp.elapsed_ms,
            tokens_generated: resp.tokens_generated,
        })
    }
}

#[async_trait]
impl Worker for TaskExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run_once(&self) -> Result<StepOutcome, EngineError> {
        let leased = self.ctx.leases.lease_next_task_item(
            &self.id,
            self.ctx.config.lease.lease_duration(),
            Utc::now(),
        )?;
        let Some(leased) = leased else {
            return Ok(StepOutcome::Idle);
        };
        let lease = leased.lease;
        debug!(
            worker_id = %self.id,
            item_id = lease.item_id,
            request_id = %lease.request_id,
            target = %leased.item.target,
            "executing task"
        );

        let outcome = self.execute(&leased.item, &lease).await;
        let now = Utc::now();
        let completion = match outcome {
            Ok(output) => self.ctx.leases.complete_task_success(&lease, &output, now),
            Err(failure) => self.ctx.leases.complete_task_failure(&lease, &failure, now),
        };
        settle(&self.ctx, &self.id, lease.item_id, completion, now)
    }
}
