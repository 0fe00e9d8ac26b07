//! Row mapping between SQLite and the engine model.

use super::{ms_to_dt, opt_ms_to_dt};
use crate::model::{BenchmarkRun, ItemStatus, RunItem, RunStatus, Target};

pub(crate) const ITEM_COLUMNS: &str = "id, run_id, task_id, target_provider_id, target_model, status, \
     task_response, judge_response, score, reason, error_msg, elapsed_ms, tokens_generated, \
     has_errors, recoverable, attempts, task_attempts, judge_attempts, last_attempt_at_ms, \
     next_retry_at_ms, worker_id, in_progress_at_ms, lease_expires_at_ms, request_meta, \
     created_at_ms, updated_at_ms";

pub(crate) const RUN_COLUMNS: &str = "id, status, task_collection_id, judge_provider_id, judge_model, \
     created_at_ms, canceled_at_ms, finished_at_ms";

fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg)),
    )
}

pub(crate) fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunItem> {
    let status: String = row.get(5)?;
    let status = ItemStatus::parse(&status).map_err(|e| bad_column(5, e.to_string()))?;
    let request_meta: Option<String> = row.get(23)?;
    let request_meta = request_meta
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(RunItem {
        id: row.get(0)?,
        run_id: row.get(1)?,
        task_id: row.get(2)?,
        target: Target {
            provider_id: row.get(3)?,
            model: row.get(4)?,
        },
        status,
        task_response: row.get(6)?,
        judge_response: row.get(7)?,
        score: row.get(8)?,
        reason: row.get(9)?,
        error_msg: row.get(10)?,
        elapsed_ms: row.get(11)?,
        tokens_generated: row.get(12)?,
        has_errors: row.get::<_, i64>(13)? != 0,
        recoverable: row.get::<_, i64>(14)? != 0,
        attempts: row.get::<_, i64>(15)? as u32,
        task_attempts: row.get::<_, i64>(16)? as u32,
        judge_attempts: row.get::<_, i64>(17)? as u32,
        last_attempt_at: opt_ms_to_dt(row.get(18)?),
        next_retry_at: opt_ms_to_dt(row.get(19)?),
        worker_id: row.get(20)?,
        in_progress_at: opt_ms_to_dt(row.get(21)?),
        lease_expires_at: opt_ms_to_dt(row.get(22)?),
        request_meta,
        created_at: ms_to_dt(row.get(24)?),
        updated_at: ms_to_dt(row.get(25)?),
    })
}

pub(crate) fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<BenchmarkRun> {
    let status: String = row.get(1)?;
    let status = RunStatus::parse(&status).map_err(|e| bad_column(1, e.to_string()))?;
    Ok(BenchmarkRun {
        id: row.get(0)?,
        status,
        task_collection_id: row.get(2)?,
        judge: Target {
            provider_id: row.get(3)?,
            model: row.get(4)?,
        },
        created_at: ms_to_dt(row.get(5)?),
        canceled_at: opt_ms_to_dt(row.get(6)?),
        finished_at: opt_ms_to_dt(row.get(7)?),
    })
}
