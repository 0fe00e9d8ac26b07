//! WorkerPool: runs the task/judge workers plus the reaper and sweep loops
//! as tokio tasks, each with its own stop signal.

use super::executor::TaskExecutor;
use super::judge_worker::JudgeEvaluator;
use super::worker::{run_loop, IdleBackoff, Worker, WorkerContext};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Task,
    Judge,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Task => "task",
            Role::Judge => "judge",
        }
    }
}

struct Handle {
    id: String,
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Handle {
    async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.join.await {
            warn!(worker_id = %self.id, error = %e, "worker task ended abnormally");
        }
    }
}

pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    task_workers: Vec<Handle>,
    judge_workers: Vec<Handle>,
    maintenance: Vec<Handle>,
    next_index: usize,
}

impl WorkerPool {
    /// Spawns the configured number of workers per role plus the reaper and
    /// aggregator sweep. Must be called inside a tokio runtime.
    pub fn start(ctx: Arc<WorkerContext>) -> Self {
        let workers = ctx.config.workers.clone();
        let mut pool = Self {
            ctx,
            task_workers: Vec::new(),
            judge_workers: Vec::new(),
            maintenance: Vec::new(),
            next_index: 0,
        };
        for _ in 0..workers.task_workers {
            pool.spawn_worker(Role::Task);
        }
        for _ in 0..workers.judge_workers {
            pool.spawn_worker(Role::Judge);
        }
        pool.spawn_reaper();
        pool.spawn_sweeper();
        info!(
            task_workers = workers.task_workers,
            judge_workers = workers.judge_workers,
            "worker pool started"
        );
        pool
    }

    pub fn size(&self, role: Role) -> usize {
        match role {
            Role::Task => self.task_workers.len(),
            Role::Judge => self.judge_workers.len(),
        }
    }

    /// Grows or shrinks one role. Removed workers finish their current item
    /// before this returns.
    pub async fn resize(&mut self, role: Role, target: usize) {
        while self.size(role) < target {
            self.spawn_worker(role);
        }
        let mut removed = Vec::new();
        {
            let handles = match role {
                Role::Task => &mut self.task_workers,
                Role::Judge => &mut self.judge_workers,
            };
            while handles.len() > target {
                if let Some(h) = handles.pop() {
                    removed.push(h);
                }
            }
        }
        for h in removed {
            h.stop().await;
        }
        info!(role = role.as_str(), size = target, "worker pool resized");
    }

    /// Signals every loop and waits for all of them.
    pub async fn shutdown(self) {
        let handles: Vec<Handle> = self
            .task_workers
            .into_iter()
            .chain(self.judge_workers)
            .chain(self.maintenance)
            .collect();
        for h in &handles {
            let _ = h.stop.send(true);
        }
        for h in handles {
            h.stop().await;
        }
        info!("worker pool stopped");
    }

    fn spawn_worker(&mut self, role: Role) {
        let index = self.next_index;
        self.next_index += 1;
        let id = worker_id(role, index);
        let worker: Arc<dyn Worker> = match role {
            Role::Task => Arc::new(TaskExecutor::new(id.clone(), self.ctx.clone())),
            Role::Judge => Arc::new(JudgeEvaluator::new(id.clone(), self.ctx.clone())),
        };
        let backoff = IdleBackoff::new(
            self.ctx.config.workers.idle_poll_min(),
            self.ctx.config.workers.idle_poll_max(),
        );
        let (stop, rx) = watch::channel(false);
        let join = tokio::spawn(async move { run_loop(worker.as_ref(), backoff, rx).await });
        let handle = Handle { id, stop, join };
        match role {
            Role::Task => self.task_workers.push(handle),
            Role::Judge => self.judge_workers.push(handle),
        }
    }

    fn spawn_reaper(&mut self) {
        let ctx = self.ctx.clone();
        let period = ctx.config.lease.reap_interval();
        let handle = spawn_periodic("reaper", period, move || {
            let report = match ctx.leases.reap_expired_leases(Utc::now()) {
                Ok(report) => report,
                Err(e) => {
                    warn!(error = %e, "lease reaping failed");
                    return;
                }
            };
            if !report.is_empty() {
                debug!(
                    requeued = report.requeued.len(),
                    failed = report.failed.len(),
                    "reaped expired leases"
                );
            }
            for transition in &report.failed {
                if let Err(e) = ctx.aggregator.on_item_terminal(transition, Utc::now()) {
                    warn!(run_id = %transition.run_id, error = %e, "run finalization deferred");
                }
            }
        });
        self.maintenance.push(handle);
    }

    fn spawn_sweeper(&mut self) {
        let ctx = self.ctx.clone();
        let period = ctx.config.workers.sweep_interval();
        let handle = spawn_periodic("sweeper", period, move || {
            if let Err(e) = ctx.aggregator.sweep(Utc::now()) {
                warn!(error = %e, "aggregator sweep failed");
            }
        });
        self.maintenance.push(handle);
    }
}

fn worker_id(role: Role, index: usize) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", role.as_str(), index, &suffix[..8])
}

fn spawn_periodic<F>(name: &'static str, period: Duration, mut tick: F) -> Handle
where
    F: FnMut() + Send + 'static,
{
    let (stop, mut rx) = watch::channel(false);
    let join = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => tick(),
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
    Handle {
        id: name.to_string(),
        stop,
        join,
    }
}
