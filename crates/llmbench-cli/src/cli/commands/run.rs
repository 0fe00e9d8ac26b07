use super::super::args::RunArgs;
use super::{apply_worker_overrides, build_engine, http_client, open_store, report_engine_error};
use crate::cli::output::{print_json, print_run};
use crate::exit_codes;
use crate::workspace::Workspace;
use anyhow::Context;
use llmbench_core::providers::fake::ScriptedClient;
use llmbench_core::providers::ProviderClient;
use llmbench_core::{BenchmarkEngine, RunDetail, StartRunRequest, Target};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
pub(crate) const DRY_RUN_ANSWER: &str = "dry run answer";
pub(crate) const DRY_RUN_VERDICT: &str = r#"{"score": 100, "reason": "dry run"}"#;

pub(crate) async fn run(config: &Path, db: &Path, args: RunArgs, json: bool) -> anyhow::Result<i32> {
    let ws = Workspace::load(config)?;
    let mut engine_config = ws.engine.clone();
    apply_worker_overrides(&mut engine_config, args.task_workers, args.judge_workers);

    let judge = Target::parse(&args.judge).context("invalid --judge")?;
    let targets = args
        .targets
        .iter()
        .map(|t| Target::parse(t))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid --target")?;

    let client: Arc<dyn ProviderClient> = if args.dry_run {
        Arc::new(dry_run_client(&targets, &judge))
    } else {
        http_client()?
    };
    let engine = build_engine(&ws, engine_config, open_store(db)?, client)?;

    let request = StartRunRequest {
        task_collection_id: args.collection.clone(),
        judge,
        targets,
    };
    let run_id = match engine.coordinator().start_run(&request) {
        Ok(id) => id,
        Err(e) => return report_engine_error(e),
    };

    if args.detach {
        if json {
            print_json(&serde_json::json!({ "run_id": run_id }))?;
        } else {
            println!("{}", run_id);
        }
        return Ok(exit_codes::SUCCESS);
    }

    let deadline = args.timeout.map(Duration::from_secs);
    let pool = engine.start_workers();
    let waited = tokio::select! {
        r = wait_until(&engine, &run_id, deadline) => r,
        _ = tokio::signal::ctrl_c() => interrupt(&engine, &run_id).await,
    };
    // errors surface only after in-flight workers have settled their leases
    pool.shutdown().await;

    match waited? {
        Some(detail) => {
            print_run(&detail, json)?;
            Ok(run_exit_code(&detail))
        }
        None => {
            eprintln!(
                "run {} did not finish in time; resume it with `llmbench serve` or check `llmbench status {}`",
                run_id, run_id
            );
            Ok(exit_codes::TIMED_OUT)
        }
    }
}

/// Cancels the run and waits one lease period for in-flight items to drain.
async fn interrupt(engine: &BenchmarkEngine, run_id: &str) -> anyhow::Result<Option<RunDetail>> {
    warn!(run_id, "interrupted; canceling run and draining in-flight items");
    if let Err(e) = engine.coordinator().cancel_run(run_id) {
        error!(run_id, error = %e, "failed to cancel run");
        return Err(e).context("failed to cancel interrupted run");
    }
    // no new leases are handed out; give in-flight calls one lease period
    let grace = engine.config().lease.lease_duration();
    wait_until(engine, run_id, Some(grace)).await
}

/// `Ok(None)` when the deadline elapsed first.
async fn wait_until(
    engine: &BenchmarkEngine,
    run_id: &str,
    deadline: Option<Duration>,
) -> anyhow::Result<Option<RunDetail>> {
    let wait = engine.wait_for_run(run_id, POLL_INTERVAL);
    let detail = match deadline {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(r) => r?,
            Err(_) => return Ok(None),
        },
        None => wait.await?,
    };
    let summary = detail.summary();
    info!(
        run_id,
        completed = summary.counts.completed,
        failed = summary.counts.failed,
        mean_score = ?summary.mean_score,
        "run complete"
    );
    Ok(Some(detail))
}

fn run_exit_code(detail: &RunDetail) -> i32 {
    if detail.summary().counts.failed > 0 {
        exit_codes::ITEMS_FAILED
    } else {
        exit_codes::SUCCESS
    }
}

/// Every target answers the same canned text; the judge always awards 100.
/// A judge that is also a target answers with the verdict for both roles.
pub(crate) fn dry_run_client(targets: &[Target], judge: &Target) -> ScriptedClient {
    let client = ScriptedClient::new();
    for target in targets {
        client.always(&target.provider_id, &target.model, Ok(DRY_RUN_ANSWER.to_string()));
    }
    client.always(&judge.provider_id, &judge.model, Ok(DRY_RUN_VERDICT.to_string()));
    client
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::RunArgs;

    const WORKSPACE: &str = r#"
engine:
  retry:
    base_delay_ms: 0
    max_delay_ms: 0
  workers:
    task_workers: 2
    judge_workers: 1
    idle_poll_min_ms: 5
    idle_poll_max_ms: 20
    sweep_interval_ms: 50
providers:
  - { id: local, type: OLLAMA, base_url: "http://127.0.0.1:9" }
  - { id: judge, type: OPENAI, base_url: "http://127.0.0.1:9" }
tasks:
  - id: capital-fr
    question: What is the capital of France?
    expected: { excellent: Paris, good: paris, pass: It is Paris }
  - id: boiling
    question: At what temperature does water boil?
    expected: { excellent: 100C, good: "100", pass: hot }
collections:
  core: [capital-fr, boiling]
"#;

    fn args(collection: &str) -> RunArgs {
        RunArgs {
            collection: collection.to_string(),
            targets: vec!["local:llama3".to_string(), "local:mistral".to_string()],
            judge: "judge:gpt-4o".to_string(),
            detach: false,
            timeout: Some(10),
            dry_run: true,
            task_workers: None,
            judge_workers: None,
        }
    }

    fn setup() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("llmbench.yaml");
        std::fs::write(&config, WORKSPACE).unwrap();
        let db = dir.path().join(".llmbench").join("runs.db");
        (dir, config, db)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dry_run_completes_every_item() {
        let (_dir, config, db) = setup();
        let code = run(&config, &db, args("core"), true).await.unwrap();
        assert_eq!(code, exit_codes::SUCCESS);

        let store = llmbench_core::Store::open(&db).unwrap();
        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        let detail = store.get_run_detail(&runs[0].id).unwrap();
        let summary = detail.summary();
        assert_eq!(summary.counts.completed, 4);
        assert_eq!(summary.mean_score, Some(100.0));
        assert!(detail
            .items
            .iter()
            .all(|i| i.task_response.as_deref() == Some(DRY_RUN_ANSWER)));
    }

    #[tokio::test]
    async fn detach_only_creates_the_run() {
        let (_dir, config, db) = setup();
        let mut a = args("core");
        a.detach = true;
        assert_eq!(run(&config, &db, a, true).await.unwrap(), exit_codes::SUCCESS);

        let store = llmbench_core::Store::open(&db).unwrap();
        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(store.status_counts(&runs[0].id).unwrap().pending, 4);
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let (_dir, config, db) = setup();
        let code = run(&config, &db, args("missing"), true).await.unwrap();
        assert_eq!(code, exit_codes::NOT_FOUND);
    }

    fn idle_engine(config: &Path, db: &Path) -> BenchmarkEngine {
        let ws = Workspace::load(config).unwrap();
        let targets = vec![Target::new("local", "llama3")];
        let judge = Target::new("judge", "gpt-4o");
        let client = Arc::new(dry_run_client(&targets, &judge));
        build_engine(&ws, ws.engine.clone(), open_store(db).unwrap(), client).unwrap()
    }

    #[tokio::test]
    async fn interrupt_cancels_idle_items_and_reports_the_run() {
        let (_dir, config, db) = setup();
        let engine = idle_engine(&config, &db);
        let run_id = engine
            .coordinator()
            .start_run(&StartRunRequest {
                task_collection_id: "core".to_string(),
                judge: Target::new("judge", "gpt-4o"),
                targets: vec![Target::new("local", "llama3")],
            })
            .unwrap();

        // no workers running: every item is idle and fails at once
        let detail = interrupt(&engine, &run_id).await.unwrap().unwrap();
        assert_eq!(detail.summary().counts.failed, 2);
        assert_eq!(run_exit_code(&detail), exit_codes::ITEMS_FAILED);
    }

    #[tokio::test]
    async fn interrupt_reports_cancel_failure_as_error() {
        let (_dir, config, db) = setup();
        let engine = idle_engine(&config, &db);
        let err = interrupt(&engine, "ghost").await.unwrap_err();
        assert!(format!("{:#}", err).contains("failed to cancel"), "{:#}", err);
    }

    #[tokio::test]
    async fn malformed_target_is_an_error() {
        let (_dir, config, db) = setup();
        let mut a = args("core");
        a.targets = vec!["no-model".to_string()];
        assert!(run(&config, &db, a, true).await.is_err());
    }
}
