//! ItemLeaseManager: the only writer of item status and lease columns.
//!
//! Every mutation runs inside one `BEGIN IMMEDIATE` transaction and ends in an
//! `UPDATE ... WHERE` guarded on (status, worker_id, in_progress_at_ms), so two
//! workers can never both complete the same lease generation, even through
//! separate connections to the same database file.

use crate::errors::{EngineError, ItemFailure};
use crate::judge::JudgeVerdict;
use crate::model::{BenchmarkRun, ItemSpec, ItemStatus, Phase, RunItem, RunStatus};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::storage::runs::{get_item_impl, get_run_impl, insert_run_impl};
use crate::storage::{dt_to_ms, ms_to_dt, Store};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub const CANCELED_MESSAGE: &str = "run canceled";
pub const LEASE_EXHAUSTED_MESSAGE: &str = "lease expired on final attempt";

/// Proof of temporary ownership of one item for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub item_id: i64,
    pub run_id: String,
    pub worker_id: String,
    pub phase: Phase,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Attempt number within `phase`, 1-based.
    pub attempt: u32,
    /// Echoed to providers for dedup and log correlation.
    pub request_id: String,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeasedItem {
    pub lease: Lease,
    pub item: RunItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub text: String,
    pub elapsed_ms: i64,
    pub tokens_generated: i64,
}

/// Result of one successful state mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub item_id: i64,
    pub run_id: String,
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub retry_at: Option<DateTime<Utc>>,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Items handed back to their queue.
    pub requeued: Vec<i64>,
    /// Items failed because their last permitted attempt was abandoned.
    pub failed: Vec<Transition>,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.failed.is_empty()
    }
}

struct ExpiredRow {
    item_id: i64,
    run_id: String,
    status: String,
    task_attempts: i64,
    judge_attempts: i64,
    worker_id: String,
    leased_ms: i64,
    run_canceled: bool,
}

/// Lease columns of an item as seen inside a transaction.
struct HeldRow {
    status: ItemStatus,
    worker_id: Option<String>,
    in_progress_at_ms: Option<i64>,
    lease_expires_at_ms: Option<i64>,
    task_attempts: u32,
    judge_attempts: u32,
    run_canceled: bool,
}

impl HeldRow {
    fn phase_attempts(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Task => self.task_attempts,
            Phase::Judge => self.judge_attempts,
        }
    }
}

#[derive(Clone)]
pub struct ItemLeaseManager {
    store: Store,
    policy: RetryPolicy,
}

impl ItemLeaseManager {
    pub fn new(store: Store, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Bulk-inserts PENDING items with no lease and zero attempts.
    pub fn create_items(
        &self,
        run_id: &str,
        specs: &[ItemSpec],
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, EngineError> {
        check_matrix(specs)?;
        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let run = get_run_impl(&tx, run_id)?;
        if run.status == RunStatus::Finished {
            return Err(EngineError::validation(format!(
                "run {} is already finished",
                run_id
            )));
        }
        let ids = insert_items(&tx, run_id, specs, now)?;
        tx.commit()?;

        debug!(run_id, items = ids.len(), "created run items");
        Ok(ids)
    }

    /// Writes the run row and its item matrix in one transaction, so no reader
    /// or aggregator sweep ever sees the run without its items.
    pub fn create_run_with_items(
        &self,
        run: &BenchmarkRun,
        specs: &[ItemSpec],
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, EngineError> {
        check_matrix(specs)?;
        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        insert_run_impl(&tx, run)?;
        let ids = insert_items(&tx, &run.id, specs, now)?;
        tx.commit()?;

        debug!(run_id = %run.id, items = ids.len(), "created run with items");
        Ok(ids)
    }

    pub fn lease_next_task_item(
        &self,
        worker_id: &str,
        lease_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<LeasedItem>, EngineError> {
        self.lease_next(Phase::Task, worker_id, lease_duration, now)
    }

    pub fn lease_next_judge_item(
        &self,
        worker_id: &str,
        lease_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<LeasedItem>, EngineError> {
        self.lease_next(Phase::Judge, worker_id, lease_duration, now)
    }

    /// Oldest eligible unleased item in `phase`'s queue, or `None` on an empty
    /// poll. Items of canceled runs and items still backing off are skipped.
    pub fn lease_next(
        &self,
        phase: Phase,
        worker_id: &str,
        lease_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<LeasedItem>, EngineError> {
        let now_ms = dt_to_ms(now);
        let expires_ms = now_ms.saturating_add(lease_duration.as_millis() as i64);
        let queue_status = phase.queue_status();
        let attempts_col = phase.attempts_column();

        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidate: Option<(i64, String, i64)> = tx
            .query_row(
                &format!(
                    "SELECT i.id, i.run_id, i.{col}
                     FROM benchmark_run_items i
                     JOIN benchmark_runs r ON r.id = i.run_id
                     WHERE i.status = ?1
                       AND i.worker_id IS NULL
                       AND (i.next_retry_at_ms IS NULL OR i.next_retry_at_ms <= ?2)
                       AND r.canceled_at_ms IS NULL
                     ORDER BY i.created_at_ms ASC, i.id ASC
                     LIMIT 1",
                    col = attempts_col
                ),
                params![queue_status.as_str(), now_ms],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((item_id, run_id, prior_attempts)) = candidate else {
            return Ok(None);
        };

        let attempt = prior_attempts as u32 + 1;
        let request_id = format!("{}:{}:{}:{}", run_id, item_id, phase.as_str(), attempt);
        let request_meta = json!({
            "request_id": request_id,
            "worker_id": worker_id,
            "phase": phase.as_str(),
            "attempt": attempt,
        });

        let changed = tx.execute(
            &format!(
                "UPDATE benchmark_run_items
                 SET worker_id = ?2,
                     in_progress_at_ms = ?3,
                     lease_expires_at_ms = ?4,
                     attempts = attempts + 1,
                     {col} = {col} + 1,
                     last_attempt_at_ms = ?3,
                     next_retry_at_ms = NULL,
                     request_meta = ?5,
                     updated_at_ms = ?3
                 WHERE id = ?1 AND status = ?6 AND worker_id IS NULL",
                col = attempts_col
            ),
            params![
                item_id,
                worker_id,
                now_ms,
                expires_ms,
                request_meta.to_string(),
                queue_status.as_str()
            ],
        )?;
        if changed != 1 {
            // IMMEDIATE holds the write lock, so the row cannot move under us.
            return Err(EngineError::Database(format!(
                "lease update touched {} rows for item {}",
                changed, item_id
            )));
        }

        let item = get_item_impl(&tx, item_id)?
            .ok_or_else(|| EngineError::not_found("run item", item_id.to_string()))?;
        tx.commit()?;

        debug!(
            item_id,
            run_id = %run_id,
            worker_id,
            phase = phase.as_str(),
            attempt,
            "lease acquired"
        );

        Ok(Some(LeasedItem {
            lease: Lease {
                item_id,
                run_id,
                worker_id: worker_id.to_string(),
                phase,
                acquired_at: ms_to_dt(now_ms),
                expires_at: ms_to_dt(expires_ms),
                attempt,
                request_id,
            },
            item,
        }))
    }

    /// PENDING -> WAITING_FOR_JUDGE with the provider's answer recorded. On a
    /// canceled run the answer is kept but the item goes to FAILED instead.
    pub fn complete_task_success(
        &self,
        lease: &Lease,
        output: &TaskOutput,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        expect_phase(lease, Phase::Task)?;
        self.with_held_lease(lease, now, |tx, row| {
            let (to, error_msg) = if row.run_canceled {
                (ItemStatus::Failed, Some(CANCELED_MESSAGE))
            } else {
                (ItemStatus::WaitingForJudge, None)
            };
            row.status.check_transition(lease.item_id, to)?;
            let changed = tx.execute(
                "UPDATE benchmark_run_items
                 SET status = ?5,
                     task_response = ?6,
                     elapsed_ms = ?7,
                     tokens_generated = ?8,
                     error_msg = ?9,
                     has_errors = ?10,
                     recoverable = 0,
                     next_retry_at_ms = NULL,
                     worker_id = NULL,
                     in_progress_at_ms = NULL,
                     lease_expires_at_ms = NULL,
                     updated_at_ms = ?4
                 WHERE id = ?1 AND worker_id = ?2 AND in_progress_at_ms = ?3 AND status = 'PENDING'",
                params![
                    lease.item_id,
                    lease.worker_id,
                    dt_to_ms(lease.acquired_at),
                    dt_to_ms(now),
                    to.as_str(),
                    output.text,
                    output.elapsed_ms,
                    output.tokens_generated,
                    error_msg,
                    error_msg.is_some() as i64,
                ],
            )?;
            guard_changed(changed, lease)?;
            Ok(transition(lease, row.status, to, None))
        })
    }

    /// Recoverable failures re-queue the item as PENDING with a backoff;
    /// terminal ones (or the retry ceiling) fail it.
    pub fn complete_task_failure(
        &self,
        lease: &Lease,
        failure: &ItemFailure,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        expect_phase(lease, Phase::Task)?;
        self.fail_attempt(lease, failure, now)
    }

    /// WAITING_FOR_JUDGE -> COMPLETED.
    pub fn complete_judge_success(
        &self,
        lease: &Lease,
        verdict: &JudgeVerdict,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        expect_phase(lease, Phase::Judge)?;
        self.with_held_lease(lease, now, |tx, row| {
            let to = ItemStatus::Completed;
            row.status.check_transition(lease.item_id, to)?;
            let changed = tx.execute(
                "UPDATE benchmark_run_items
                 SET status = 'COMPLETED',
                     judge_response = ?5,
                     score = ?6,
                     reason = ?7,
                     error_msg = NULL,
                     has_errors = 0,
                     recoverable = 0,
                     next_retry_at_ms = NULL,
                     worker_id = NULL,
                     in_progress_at_ms = NULL,
                     lease_expires_at_ms = NULL,
                     updated_at_ms = ?4
                 WHERE id = ?1 AND worker_id = ?2 AND in_progress_at_ms = ?3 AND status = 'WAITING_FOR_JUDGE'",
                params![
                    lease.item_id,
                    lease.worker_id,
                    dt_to_ms(lease.acquired_at),
                    dt_to_ms(now),
                    verdict.raw,
                    verdict.score,
                    verdict.reason,
                ],
            )?;
            guard_changed(changed, lease)?;
            Ok(transition(lease, row.status, to, None))
        })
    }

    /// Like task failure, but a retry stays in WAITING_FOR_JUDGE: the task
    /// answer is still good.
    pub fn complete_judge_failure(
        &self,
        lease: &Lease,
        failure: &ItemFailure,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        expect_phase(lease, Phase::Judge)?;
        self.fail_attempt(lease, failure, now)
    }

    fn fail_attempt(
        &self,
        lease: &Lease,
        failure: &ItemFailure,
        now: DateTime<Utc>,
    ) -> Result<Transition, EngineError> {
        self.with_held_lease(lease, now, |tx, row| {
            let attempts = row.phase_attempts(lease.phase);
            let decision = if row.run_canceled {
                RetryDecision::Fail { exhausted: false }
            } else {
                self.policy.decide(failure.kind, attempts)
            };

            let (to, retry_at, recoverable, message) = match decision {
                RetryDecision::Retry { delay } => {
                    let retry_at = now
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::zero());
                    (row.status, Some(retry_at), true, failure.render())
                }
                RetryDecision::Fail { exhausted: true } => (
                    ItemStatus::Failed,
                    None,
                    false,
                    format!(
                        "{} (gave up after {} attempts)",
                        failure.render(),
                        attempts
                    ),
                ),
                RetryDecision::Fail { exhausted: false } if row.run_canceled => (
                    ItemStatus::Failed,
                    None,
                    false,
                    format!("{}: {}", CANCELED_MESSAGE, failure.render()),
                ),
                RetryDecision::Fail { exhausted: false } => {
                    (ItemStatus::Failed, None, false, failure.render())
                }
            };
            row.status.check_transition(lease.item_id, to)?;

            let changed = tx.execute(
                "UPDATE benchmark_run_items
                 SET status = ?5,
                     error_msg = ?6,
                     has_errors = 1,
                     recoverable = ?7,
                     next_retry_at_ms = ?8,
                     worker_id = NULL,
                     in_progress_at_ms = NULL,
                     lease_expires_at_ms = NULL,
                     updated_at_ms = ?4
                 WHERE id = ?1 AND worker_id = ?2 AND in_progress_at_ms = ?3 AND status = ?9",
                params![
                    lease.item_id,
                    lease.worker_id,
                    dt_to_ms(lease.acquired_at),
                    dt_to_ms(now),
                    to.as_str(),
                    message,
                    recoverable as i64,
                    retry_at.map(dt_to_ms),
                    row.status.as_str(),
                ],
            )?;
            guard_changed(changed, lease)?;

            if let Some(at) = retry_at {
                warn!(
                    item_id = lease.item_id,
                    run_id = %lease.run_id,
                    phase = lease.phase.as_str(),
                    attempt = attempts,
                    retry_at = %at,
                    error = %failure,
                    "recoverable failure, item re-queued"
                );
            } else {
                warn!(
                    item_id = lease.item_id,
                    run_id = %lease.run_id,
                    phase = lease.phase.as_str(),
                    attempt = attempts,
                    error = %message,
                    "item failed"
                );
            }
            Ok(transition(lease, row.status, to, retry_at))
        })
    }

    /// Hands abandoned leases back to their queue. The attempt counted at lease
    /// time stands; an abandoned final attempt fails the item.
    pub fn reap_expired_leases(&self, now: DateTime<Utc>) -> Result<ReapReport, EngineError> {
        let now_ms = dt_to_ms(now);
        let max_attempts = self.policy.max_attempts();
        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let expired: Vec<ExpiredRow> = {
            let mut stmt = tx.prepare(
                "SELECT i.id, i.run_id, i.status, i.task_attempts, i.judge_attempts,
                        i.worker_id, i.in_progress_at_ms, r.canceled_at_ms
                 FROM benchmark_run_items i
                 JOIN benchmark_runs r ON r.id = i.run_id
                 WHERE i.worker_id IS NOT NULL
                   AND i.lease_expires_at_ms < ?1
                 ORDER BY i.id ASC",
            )?;
            let rows = stmt.query_map(params![now_ms], |row| {
                Ok(ExpiredRow {
                    item_id: row.get(0)?,
                    run_id: row.get(1)?,
                    status: row.get(2)?,
                    task_attempts: row.get(3)?,
                    judge_attempts: row.get(4)?,
                    worker_id: row.get(5)?,
                    leased_ms: row.get(6)?,
                    run_canceled: row.get::<_, Option<i64>>(7)?.is_some(),
                })
            })?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            out
        };

        let mut report = ReapReport::default();
        for ExpiredRow {
            item_id,
            run_id,
            status,
            task_attempts,
            judge_attempts,
            worker_id,
            leased_ms,
            run_canceled,
        } in expired
        {
            let status = ItemStatus::parse(&status)?;
            let attempts = match status {
                ItemStatus::WaitingForJudge => judge_attempts,
                _ => task_attempts,
            } as u32;

            let fail_reason = if run_canceled {
                Some(CANCELED_MESSAGE)
            } else if attempts >= max_attempts {
                Some(LEASE_EXHAUSTED_MESSAGE)
            } else {
                None
            };

            match fail_reason {
                Some(reason) => {
                    status.check_transition(item_id, ItemStatus::Failed)?;
                    tx.execute(
                        "UPDATE benchmark_run_items
                         SET status = 'FAILED',
                             error_msg = ?4,
                             has_errors = 1,
                             recoverable = 0,
                             next_retry_at_ms = NULL,
                             worker_id = NULL,
                             in_progress_at_ms = NULL,
                             lease_expires_at_ms = NULL,
                             updated_at_ms = ?5
                         WHERE id = ?1 AND worker_id = ?2 AND in_progress_at_ms = ?3",
                        params![item_id, worker_id, leased_ms, reason, now_ms],
                    )?;
                    warn!(item_id, run_id = %run_id, worker_id = %worker_id, attempts, reason, "expired lease failed item");
                    report.failed.push(Transition {
                        item_id,
                        run_id,
                        from: status,
                        to: ItemStatus::Failed,
                        retry_at: None,
                    });
                }
                None => {
                    tx.execute(
                        "UPDATE benchmark_run_items
                         SET worker_id = NULL,
                             in_progress_at_ms = NULL,
                             lease_expires_at_ms = NULL,
                             updated_at_ms = ?4
                         WHERE id = ?1 AND worker_id = ?2 AND in_progress_at_ms = ?3",
                        params![item_id, worker_id, leased_ms, now_ms],
                    )?;
                    warn!(item_id, run_id = %run_id, worker_id = %worker_id, attempts, "expired lease re-queued");
                    report.requeued.push(item_id);
                }
            }
        }
        tx.commit()?;
        Ok(report)
    }

    /// Fails every non-terminal item of `run_id` that nobody holds. Leased
    /// items are left to drain through their own completion.
    pub fn fail_unleased_items(
        &self,
        run_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        get_run_impl(&tx, run_id)?;
        let changed = tx.execute(
            "UPDATE benchmark_run_items
             SET status = 'FAILED',
                 error_msg = ?2,
                 has_errors = 1,
                 recoverable = 0,
                 next_retry_at_ms = NULL,
                 updated_at_ms = ?3
             WHERE run_id = ?1
               AND status IN ('PENDING', 'WAITING_FOR_JUDGE')
               AND worker_id IS NULL",
            params![run_id, reason, dt_to_ms(now)],
        )?;
        tx.commit()?;
        debug!(run_id, failed = changed, "failed unleased items");
        Ok(changed)
    }

    /// Loads the item, verifies `lease` still owns it, then runs `apply`
    /// inside the same transaction.
    fn with_held_lease<F>(
        &self,
        lease: &Lease,
        now: DateTime<Utc>,
        apply: F,
    ) -> Result<Transition, EngineError>
    where
        F: FnOnce(&Connection, &HeldRow) -> Result<Transition, EngineError>,
    {
        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row = load_held_row(&tx, lease.item_id)?;
        let owned = row.worker_id.as_deref() == Some(lease.worker_id.as_str())
            && row.in_progress_at_ms == Some(dt_to_ms(lease.acquired_at))
            && row.status == lease.phase.queue_status();
        let expired = row
            .lease_expires_at_ms
            .map(|exp| exp < dt_to_ms(now))
            .unwrap_or(true);
        if !owned || expired {
            debug!(
                item_id = lease.item_id,
                worker_id = %lease.worker_id,
                owned,
                expired,
                "stale lease rejected"
            );
            return Err(EngineError::StaleLease {
                item_id: lease.item_id,
                worker_id: lease.worker_id.clone(),
            });
        }

        let transition = apply(&tx, &row)?;
        tx.commit()?;
        debug!(
            item_id = transition.item_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            "item transition"
        );
        Ok(transition)
    }
}

fn load_held_row(conn: &Connection, item_id: i64) -> Result<HeldRow, EngineError> {
    let row = conn
        .query_row(
            "SELECT i.status, i.worker_id, i.in_progress_at_ms, i.lease_expires_at_ms,
                    i.task_attempts, i.judge_attempts, r.canceled_at_ms
             FROM benchmark_run_items i
             JOIN benchmark_runs r ON r.id = i.run_id
             WHERE i.id = ?1",
            params![item_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| EngineError::not_found("run item", item_id.to_string()))?;

    Ok(HeldRow {
        status: ItemStatus::parse(&row.0)?,
        worker_id: row.1,
        in_progress_at_ms: row.2,
        lease_expires_at_ms: row.3,
        task_attempts: row.4 as u32,
        judge_attempts: row.5 as u32,
        run_canceled: row.6.is_some(),
    })
}

fn check_matrix(specs: &[ItemSpec]) -> Result<(), EngineError> {
    if specs.is_empty() {
        return Err(EngineError::validation(
            "fan-out matrix is empty: need at least one task and one target",
        ));
    }
    Ok(())
}

fn insert_items(
    conn: &Connection,
    run_id: &str,
    specs: &[ItemSpec],
    now: DateTime<Utc>,
) -> Result<Vec<i64>, EngineError> {
    let now_ms = dt_to_ms(now);
    let mut stmt = conn.prepare(
        "INSERT INTO benchmark_run_items
         (run_id, task_id, target_provider_id, target_model, status, created_at_ms, updated_at_ms)
         VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5, ?5)",
    )?;
    let mut ids = Vec::with_capacity(specs.len());
    for spec in specs {
        stmt.execute(params![
            run_id,
            spec.task_id,
            spec.target.provider_id,
            spec.target.model,
            now_ms
        ])?;
        ids.push(conn.last_insert_rowid());
    }
    Ok(ids)
}

fn expect_phase(lease: &Lease, phase: Phase) -> Result<(), EngineError> {
    if lease.phase != phase {
        return Err(EngineError::validation(format!(
            "lease on item {} is a {} lease, expected {}",
            lease.item_id,
            lease.phase.as_str(),
            phase.as_str()
        )));
    }
    Ok(())
}

fn guard_changed(changed: usize, lease: &Lease) -> Result<(), EngineError> {
    if changed == 1 {
        Ok(())
    } else {
        Err(EngineError::StaleLease {
            item_id: lease.item_id,
            worker_id: lease.worker_id.clone(),
        })
    }
}

fn transition(
    lease: &Lease,
    from: ItemStatus,
    to: ItemStatus,
    retry_at: Option<DateTime<Utc>>,
) -> Transition {
    Transition {
        item_id: lease.item_id,
        run_id: lease.run_id.clone(),
        from,
        to,
        retry_at,
    }
}
