use super::args::*;
use crate::exit_codes;
use crate::workspace::Workspace;
use anyhow::Context;
use llmbench_core::engine::RunStatusAggregator;
use llmbench_core::lease::ItemLeaseManager;
use llmbench_core::providers::http::OpenAiCompatibleClient;
use llmbench_core::providers::{InMemoryProviderStore, ProviderClient};
use llmbench_core::retry::RetryPolicy;
use llmbench_core::tasks::InMemoryTaskStore;
use llmbench_core::{BenchmarkEngine, EngineConfig, EngineError, RunCoordinator, Store};
use std::path::Path;
use std::sync::Arc;

pub(crate) mod manage;
pub(crate) mod run;
pub(crate) mod serve;
pub(crate) mod validate;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let json = cli.json;
    match cli.cmd {
        Command::Run(args) => run::run(&cli.config, &cli.db, args, json).await,
        Command::Serve(args) => serve::run(&cli.config, &cli.db, args).await,
        Command::Status(args) => manage::status(&cli.db, &args.run_id, json),
        Command::List => manage::list(&cli.db, json),
        Command::Cancel(args) => manage::cancel(&cli.db, &args.run_id, json),
        Command::Delete(args) => manage::delete(&cli.db, &args.run_id, json),
        Command::Validate => validate::run(&cli.config, json),
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub(crate) fn open_store(db: &Path) -> anyhow::Result<Store> {
    ensure_parent_dir(db).with_context(|| format!("failed to create directory for {}", db.display()))?;
    Store::open(db).with_context(|| format!("failed to open database {}", db.display()))
}

/// Engine over the workspace's providers and tasks.
pub(crate) fn build_engine(
    ws: &Workspace,
    config: EngineConfig,
    store: Store,
    client: Arc<dyn ProviderClient>,
) -> anyhow::Result<BenchmarkEngine> {
    let providers = Arc::new(ws.provider_store());
    let tasks = Arc::new(ws.task_store()?);
    BenchmarkEngine::new(store, config, providers, tasks, client).context("failed to build engine")
}

pub(crate) fn http_client() -> anyhow::Result<Arc<dyn ProviderClient>> {
    let client = OpenAiCompatibleClient::new().context("failed to create provider client")?;
    Ok(Arc::new(client))
}

pub(crate) fn apply_worker_overrides(
    config: &mut EngineConfig,
    task_workers: Option<usize>,
    judge_workers: Option<usize>,
) {
    if let Some(n) = task_workers {
        config.workers.task_workers = n;
    }
    if let Some(n) = judge_workers {
        config.workers.judge_workers = n;
    }
}

/// Coordinator for lifecycle queries against the database alone. Starting a
/// run needs the workspace; status, list, cancel and delete do not.
pub(crate) fn query_coordinator(db: &Path) -> anyhow::Result<RunCoordinator> {
    let store = open_store(db)?;
    let leases = ItemLeaseManager::new(store.clone(), RetryPolicy::new(EngineConfig::default().retry));
    Ok(RunCoordinator::new(
        leases,
        RunStatusAggregator::new(store),
        Arc::new(InMemoryProviderStore::default()),
        Arc::new(InMemoryTaskStore::default()),
    ))
}

/// Exit code for errors the user can act on; anything else propagates.
pub(crate) fn report_engine_error(err: EngineError) -> anyhow::Result<i32> {
    match err {
        EngineError::NotFound { .. } => {
            eprintln!("error: {}", err);
            Ok(exit_codes::NOT_FOUND)
        }
        EngineError::Validation(_) => {
            eprintln!("error: {}", err);
            Ok(exit_codes::CONFIG_ERROR)
        }
        other => Err(other.into()),
    }
}
