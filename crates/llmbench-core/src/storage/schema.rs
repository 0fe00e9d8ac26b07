//! SQLite schema for benchmark runs.
//!
//! Tables:
//! - `benchmark_runs`: one row per run; status only moves PENDING -> FINISHED
//! - `benchmark_run_items`: one row per (task, provider, model); owned by a run
//!   and removed only through run deletion

/// DDL for run and item tables.
///
/// Schema version: 1
pub const RUN_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS benchmark_runs (
    id                  TEXT PRIMARY KEY,
    status              TEXT NOT NULL DEFAULT 'PENDING',
    task_collection_id  TEXT NOT NULL,
    judge_provider_id   TEXT NOT NULL,
    judge_model         TEXT NOT NULL,
    created_at_ms       INTEGER NOT NULL,
    canceled_at_ms      INTEGER,
    finished_at_ms      INTEGER
);

CREATE TABLE IF NOT EXISTS benchmark_run_items (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id              TEXT NOT NULL REFERENCES benchmark_runs(id) ON DELETE CASCADE,
    task_id             TEXT NOT NULL,
    target_provider_id  TEXT NOT NULL,
    target_model        TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'PENDING',

    task_response       TEXT,
    judge_response      TEXT,
    score               INTEGER,
    reason              TEXT,
    error_msg           TEXT,
    elapsed_ms          INTEGER,
    tokens_generated    INTEGER,
    has_errors          INTEGER NOT NULL DEFAULT 0,
    recoverable         INTEGER NOT NULL DEFAULT 0,

    attempts            INTEGER NOT NULL DEFAULT 0,
    task_attempts       INTEGER NOT NULL DEFAULT 0,
    judge_attempts      INTEGER NOT NULL DEFAULT 0,
    last_attempt_at_ms  INTEGER,
    next_retry_at_ms    INTEGER,
    worker_id           TEXT,
    in_progress_at_ms   INTEGER,
    lease_expires_at_ms INTEGER,
    request_meta        TEXT,

    created_at_ms       INTEGER NOT NULL,
    updated_at_ms       INTEGER NOT NULL
);

-- Lease selection scans one status queue in creation order
CREATE INDEX IF NOT EXISTS idx_run_items_queue
    ON benchmark_run_items(status, created_at_ms, id);
CREATE INDEX IF NOT EXISTS idx_run_items_run
    ON benchmark_run_items(run_id, status);
CREATE INDEX IF NOT EXISTS idx_run_items_lease_expiry
    ON benchmark_run_items(lease_expires_at_ms);

-- (run, task, provider, model) is fixed once inserted
CREATE TRIGGER IF NOT EXISTS trg_run_items_identity_immutable
BEFORE UPDATE OF run_id, task_id, target_provider_id, target_model ON benchmark_run_items
WHEN OLD.run_id IS NOT NEW.run_id
  OR OLD.task_id IS NOT NEW.task_id
  OR OLD.target_provider_id IS NOT NEW.target_provider_id
  OR OLD.target_model IS NOT NEW.target_model
BEGIN
    SELECT RAISE(ABORT, 'run item identity is immutable');
END;

CREATE TRIGGER IF NOT EXISTS trg_run_items_terminal_is_final
BEFORE UPDATE OF status ON benchmark_run_items
WHEN OLD.status IN ('COMPLETED', 'FAILED') AND NEW.status IS NOT OLD.status
BEGIN
    SELECT RAISE(ABORT, 'run item already terminal');
END;

CREATE TRIGGER IF NOT EXISTS trg_runs_finished_is_final
BEFORE UPDATE OF status ON benchmark_runs
WHEN OLD.status = 'FINISHED' AND NEW.status IS NOT 'FINISHED'
BEGIN
    SELECT RAISE(ABORT, 'run already finished');
END;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(RUN_SCHEMA).unwrap();
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(RUN_SCHEMA).unwrap();
        conn.execute_batch(RUN_SCHEMA).unwrap();
    }

    #[test]
    fn test_identity_columns_cannot_change() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(RUN_SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO benchmark_runs (id, task_collection_id, judge_provider_id, judge_model, created_at_ms)
             VALUES ('r1', 'c1', 'judge', 'm', 0);
             INSERT INTO benchmark_run_items (run_id, task_id, target_provider_id, target_model, created_at_ms, updated_at_ms)
             VALUES ('r1', 't1', 'p1', 'm1', 0, 0);",
        )
        .unwrap();

        let err = conn
            .execute(
                "UPDATE benchmark_run_items SET target_model = 'other' WHERE run_id = 'r1'",
                [],
            )
            .unwrap_err();
        assert!(err.to_string().contains("immutable"));
    }

    #[test]
    fn test_terminal_status_cannot_be_left() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(RUN_SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO benchmark_runs (id, task_collection_id, judge_provider_id, judge_model, created_at_ms)
             VALUES ('r1', 'c1', 'judge', 'm', 0);
             INSERT INTO benchmark_run_items (run_id, task_id, target_provider_id, target_model, status, created_at_ms, updated_at_ms)
             VALUES ('r1', 't1', 'p1', 'm1', 'FAILED', 0, 0);",
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE benchmark_run_items SET status = 'PENDING'", [])
            .is_err());
    }
}
