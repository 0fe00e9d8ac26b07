pub mod rows;
pub mod runs;
pub mod schema;

use crate::errors::EngineError;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use schema::RUN_SCHEMA;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed run/item store shared by the lease manager, the aggregator
/// and the coordinator.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), EngineError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute_batch(RUN_SCHEMA)?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, EngineError> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Database("store connection lock poisoned".to_string()))
    }
}

pub(crate) fn dt_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn ms_to_dt(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}

pub(crate) fn opt_ms_to_dt(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.map(ms_to_dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_bootstraps_schema() {
        let store = Store::memory().unwrap();
        let conn = store.lock().unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"benchmark_runs".to_string()));
        assert!(tables.contains(&"benchmark_run_items".to_string()));
    }

    #[test]
    fn test_store_sets_foreign_keys() {
        let store = Store::memory().unwrap();
        let conn = store.lock().unwrap();

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn millis_roundtrip_is_exact() {
        let now = ms_to_dt(dt_to_ms(Utc::now()));
        assert_eq!(ms_to_dt(dt_to_ms(now)), now);
    }
}
