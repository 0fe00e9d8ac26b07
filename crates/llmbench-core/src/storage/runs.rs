//! Run rows and read-only item queries.
//!
//! Item status/lease columns are written only by `lease::ItemLeaseManager`;
//! run status only by `engine::aggregator`.

use super::rows::{row_to_item, row_to_run, ITEM_COLUMNS, RUN_COLUMNS};
use super::{dt_to_ms, Store};
use crate::errors::EngineError;
use crate::model::{BenchmarkRun, ItemStatus, RunDetail, RunItem, StatusCounts};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

impl Store {
    pub fn insert_run(&self, run: &BenchmarkRun) -> Result<(), EngineError> {
        let conn = self.lock()?;
        insert_run_impl(&conn, run)
    }

    pub fn get_run(&self, run_id: &str) -> Result<BenchmarkRun, EngineError> {
        let conn = self.lock()?;
        get_run_impl(&conn, run_id)
    }

    /// Run plus its items, items ordered by creation.
    pub fn get_run_detail(&self, run_id: &str) -> Result<RunDetail, EngineError> {
        let conn = self.lock()?;
        let run = get_run_impl(&conn, run_id)?;
        let items = list_items_impl(&conn, run_id)?;
        Ok(RunDetail { run, items })
    }

    /// Newest first.
    pub fn list_runs(&self) -> Result<Vec<BenchmarkRun>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM benchmark_runs ORDER BY created_at_ms DESC, id ASC",
            RUN_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_run)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn list_items(&self, run_id: &str) -> Result<Vec<RunItem>, EngineError> {
        let conn = self.lock()?;
        list_items_impl(&conn, run_id)
    }

    pub fn get_item(&self, item_id: i64) -> Result<RunItem, EngineError> {
        let conn = self.lock()?;
        get_item_impl(&conn, item_id)?
            .ok_or_else(|| EngineError::not_found("run item", item_id.to_string()))
    }

    pub fn status_counts(&self, run_id: &str) -> Result<StatusCounts, EngineError> {
        let conn = self.lock()?;
        status_counts_impl(&conn, run_id)
    }

    /// Ids of runs still in PENDING, oldest first.
    pub fn unfinished_run_ids(&self) -> Result<Vec<String>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM benchmark_runs WHERE status = 'PENDING' ORDER BY created_at_ms ASC, id ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Stamps `canceled_at` once. Returns false when the run was already canceled.
    pub fn mark_run_canceled(&self, run_id: &str, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE benchmark_runs SET canceled_at_ms = ?2 WHERE id = ?1 AND canceled_at_ms IS NULL",
            params![run_id, dt_to_ms(now)],
        )?;
        if changed == 0 {
            // distinguish "already canceled" from "no such run"
            get_run_impl(&conn, run_id)?;
        }
        Ok(changed > 0)
    }

    /// Deletes a run; its items go with it via `ON DELETE CASCADE`.
    pub fn delete_run(&self, run_id: &str) -> Result<(), EngineError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM benchmark_runs WHERE id = ?1", params![run_id])?;
        if changed == 0 {
            return Err(EngineError::not_found("run", run_id));
        }
        Ok(())
    }

    /// Single conditional update: flips PENDING -> FINISHED only if no item of
    /// the run is outside {COMPLETED, FAILED}. Returns true if this call flipped it.
    pub(crate) fn finish_run_if_drained(
        &self,
        run_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE benchmark_runs
             SET status = 'FINISHED', finished_at_ms = ?2
             WHERE id = ?1
               AND status = 'PENDING'
               AND NOT EXISTS (
                   SELECT 1 FROM benchmark_run_items
                   WHERE run_id = ?1 AND status NOT IN ('COMPLETED', 'FAILED')
               )",
            params![run_id, dt_to_ms(now)],
        )?;
        if changed == 0 {
            get_run_impl(&conn, run_id)?;
        }
        Ok(changed > 0)
    }
}

pub(crate) fn insert_run_impl(conn: &Connection, run: &BenchmarkRun) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO benchmark_runs (id, status, task_collection_id, judge_provider_id, judge_model, created_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            run.id,
            run.status.as_str(),
            run.task_collection_id,
            run.judge.provider_id,
            run.judge.model,
            dt_to_ms(run.created_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_run_impl(conn: &Connection, run_id: &str) -> Result<BenchmarkRun, EngineError> {
    conn.query_row(
        &format!("SELECT {} FROM benchmark_runs WHERE id = ?1", RUN_COLUMNS),
        params![run_id],
        row_to_run,
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("run", run_id))
}

pub(crate) fn get_item_impl(conn: &Connection, item_id: i64) -> Result<Option<RunItem>, EngineError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM benchmark_run_items WHERE id = ?1", ITEM_COLUMNS),
            params![item_id],
            row_to_item,
        )
        .optional()?)
}

fn list_items_impl(conn: &Connection, run_id: &str) -> Result<Vec<RunItem>, EngineError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM benchmark_run_items WHERE run_id = ?1 ORDER BY created_at_ms ASC, id ASC",
        ITEM_COLUMNS
    ))?;
    let rows = stmt.query_map(params![run_id], row_to_item)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn status_counts_impl(conn: &Connection, run_id: &str) -> Result<StatusCounts, EngineError> {
    get_run_impl(conn, run_id)?;
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM benchmark_run_items WHERE run_id = ?1 GROUP BY status",
    )?;
    let rows = stmt.query_map(params![run_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut counts = StatusCounts::default();
    for r in rows {
        let (status, n) = r?;
        let n = n as usize;
        match ItemStatus::parse(&status)? {
            ItemStatus::Pending => counts.pending = n,
            ItemStatus::WaitingForJudge => counts.waiting_for_judge = n,
            ItemStatus::Completed => counts.completed = n,
            ItemStatus::Failed => counts.failed = n,
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunStatus, Target};

    fn run(id: &str, created_ms: i64) -> BenchmarkRun {
        BenchmarkRun {
            id: id.to_string(),
            status: RunStatus::Pending,
            task_collection_id: "core".to_string(),
            judge: Target::new("judge", "judge-model"),
            created_at: super::super::ms_to_dt(created_ms),
            canceled_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn list_runs_is_newest_first() {
        let store = Store::memory().unwrap();
        store.insert_run(&run("a", 1_000)).unwrap();
        store.insert_run(&run("b", 2_000)).unwrap();
        let ids: Vec<String> = store.list_runs().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn missing_run_is_not_found() {
        let store = Store::memory().unwrap();
        assert!(matches!(
            store.get_run("nope"),
            Err(EngineError::NotFound { kind: "run", .. })
        ));
        assert!(matches!(
            store.delete_run("nope"),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn cancel_is_stamped_once() {
        let store = Store::memory().unwrap();
        store.insert_run(&run("a", 1_000)).unwrap();
        assert!(store.mark_run_canceled("a", Utc::now()).unwrap());
        assert!(!store.mark_run_canceled("a", Utc::now()).unwrap());
        assert!(store.get_run("a").unwrap().is_canceled());
        assert!(store.mark_run_canceled("missing", Utc::now()).is_err());
    }

    #[test]
    fn empty_run_drains_immediately() {
        let store = Store::memory().unwrap();
        store.insert_run(&run("a", 1_000)).unwrap();
        assert!(store.finish_run_if_drained("a", Utc::now()).unwrap());
        assert!(!store.finish_run_if_drained("a", Utc::now()).unwrap());
        assert_eq!(store.get_run("a").unwrap().status, RunStatus::Finished);
    }
}
