//! Lifecycle commands that only need the database.

use super::{query_coordinator, report_engine_error};
use crate::cli::output::{print_json, print_run, print_runs};
use crate::exit_codes;
use std::path::Path;

pub(crate) fn status(db: &Path, run_id: &str, json: bool) -> anyhow::Result<i32> {
    let coordinator = query_coordinator(db)?;
    match coordinator.get_run(run_id) {
        Ok(detail) => {
            print_run(&detail, json)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => report_engine_error(e),
    }
}

pub(crate) fn list(db: &Path, json: bool) -> anyhow::Result<i32> {
    let coordinator = query_coordinator(db)?;
    let runs = coordinator
        .list_runs()?
        .into_iter()
        .map(|run| -> anyhow::Result<_> {
            let counts = coordinator.get_run(&run.id)?.summary().counts;
            Ok((run, counts))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    print_runs(&runs, json)?;
    Ok(exit_codes::SUCCESS)
}

pub(crate) fn cancel(db: &Path, run_id: &str, json: bool) -> anyhow::Result<i32> {
    let coordinator = query_coordinator(db)?;
    let outcome = match coordinator.cancel_run(run_id) {
        Ok(o) => o,
        Err(e) => return report_engine_error(e),
    };
    if json {
        print_json(&serde_json::json!({
            "run_id": run_id,
            "newly_canceled": outcome.newly_canceled,
            "failed_items": outcome.failed_items,
            "finished": outcome.finished,
        }))?;
    } else if outcome.finished {
        println!("run {} is finished ({} idle items failed)", run_id, outcome.failed_items);
    } else {
        println!(
            "run {} canceled; {} idle items failed, in-flight items are draining",
            run_id, outcome.failed_items
        );
    }
    Ok(exit_codes::SUCCESS)
}

pub(crate) fn delete(db: &Path, run_id: &str, json: bool) -> anyhow::Result<i32> {
    let coordinator = query_coordinator(db)?;
    if let Err(e) = coordinator.delete_run(run_id) {
        return report_engine_error(e);
    }
    if json {
        print_json(&serde_json::json!({ "run_id": run_id, "deleted": true }))?;
    } else {
        println!("deleted run {}", run_id);
    }
    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmbench_core::model::{BenchmarkRun, RunStatus, Target};
    use llmbench_core::Store;

    fn seed(db: &Path) -> String {
        let store = Store::open(db).unwrap();
        let run = BenchmarkRun {
            id: "run-1".to_string(),
            status: RunStatus::Pending,
            task_collection_id: "core".to_string(),
            judge: Target::new("judge", "jm"),
            created_at: chrono::Utc::now(),
            canceled_at: None,
            finished_at: None,
        };
        store.insert_run(&run).unwrap();
        run.id
    }

    #[test]
    fn unknown_run_maps_to_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("runs.db");
        assert_eq!(status(&db, "nope", true).unwrap(), exit_codes::NOT_FOUND);
        assert_eq!(cancel(&db, "nope", true).unwrap(), exit_codes::NOT_FOUND);
        assert_eq!(delete(&db, "nope", true).unwrap(), exit_codes::NOT_FOUND);
    }

    #[test]
    fn cancel_then_delete_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("runs.db");
        std::fs::create_dir_all(db.parent().unwrap()).unwrap();
        let run_id = seed(&db);

        // an unfinished run cannot be deleted
        assert_eq!(delete(&db, &run_id, true).unwrap(), exit_codes::CONFIG_ERROR);

        // no items: canceling finishes it immediately
        assert_eq!(cancel(&db, &run_id, true).unwrap(), exit_codes::SUCCESS);
        let run = Store::open(&db).unwrap().get_run(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Finished);

        assert_eq!(delete(&db, &run_id, true).unwrap(), exit_codes::SUCCESS);
        assert_eq!(status(&db, &run_id, true).unwrap(), exit_codes::NOT_FOUND);
    }
}
