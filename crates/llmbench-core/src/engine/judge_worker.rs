//! JudgeEvaluator: WAITING_FOR_JUDGE items -> judge provider -> COMPLETED.

use super::worker::{call_provider, settle, StepOutcome, Worker, WorkerContext};
use crate::errors::{EngineError, ItemFailure};
use crate::judge::{build_judge_prompt, parse_verdict, JudgeVerdict};
use crate::lease::Lease;
use crate::model::RunItem;
use crate::providers::InferenceRequest;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

pub struct JudgeEvaluator {
    id: String,
    ctx: Arc<WorkerContext>,
}

impl JudgeEvaluator {
    pub fn new(id: impl Into<String>, ctx: Arc<WorkerContext>) -> Self {
        Self { id: id.into(), ctx }
    }

    async fn evaluate(&self, item: &RunItem, lease: &Lease) -> Result<JudgeVerdict, ItemFailure> {
        let run = self
            .ctx
            .leases
            .store()
            .get_run(&item.run_id)
            .map_err(|e| ItemFailure::other(e.to_string()))?;
        let candidate = item
            .task_response
            .as_deref()
            .ok_or_else(|| ItemFailure::other("item has no task response to judge"))?;
        let task = self
            .ctx
            .tasks
            .get_task(&item.task_id)
            .map_err(|e| ItemFailure::other(e.to_string()))?;
        let provider = self
            .ctx
            .providers
            .get(&run.judge.provider_id)
            .map_err(|e| ItemFailure::invalid_config(e.to_string()).with_provider(&run.judge.provider_id))?;

        let request = InferenceRequest {
            model: run.judge.model.clone(),
            prompt: build_judge_prompt(&task, candidate),
            request_id: Some(lease.request_id.clone()),
            timeout: self.ctx.config.provider_timeout(),
        };
        let resp = call_provider(self.ctx.client.as_ref(), &provider, &request)
            .await
            .map_err(|e| e.into_failure(&provider.id))?;

        parse_verdict(&resp.text).map_err(|e| {
            ItemFailure::judge_parse(e.to_string()).with_provider(provider.id.as_str())
        })
    }
}

#[async_trait]
impl Worker for JudgeEvaluator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run_once(&self) -> Result<StepOutcome, EngineError> {
        let leased = self.ctx.leases.lease_next_judge_item(
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
            "judging item"
        );

        let outcome = self.evaluate(&leased.item, &lease).await;
        let now = Utc::now();
        let completion = match outcome {
            Ok(verdict) => self.ctx.leases.complete_judge_success(&lease, &verdict, now),
            Err(failure) => self.ctx.leases.complete_judge_failure(&lease, &failure, now),
        };
        settle(&self.ctx, &self.id, lease.item_id, completion, now)
    }
}
