//! Long-running worker process. Picks up every unfinished run in the
//! database, including runs created with `run --detach` or left behind by an
//! interrupted process; expired leases are reclaimed by the reaper.

use super::super::args::ServeArgs;
use super::{apply_worker_overrides, build_engine, http_client, open_store};
use crate::exit_codes;
use crate::workspace::Workspace;
use std::path::Path;
use tokio::time::MissedTickBehavior;
use llmbench_core::Store;
use tracing::{info, warn};

pub(crate) async fn run(config: &Path, db: &Path, args: ServeArgs) -> anyhow::Result<i32> {
    let ws = Workspace::load(config)?;
    let mut engine_config = ws.engine.clone();
    apply_worker_overrides(&mut engine_config, args.task_workers, args.judge_workers);
    let store = open_store(db)?;
    let engine = build_engine(&ws, engine_config, store.clone(), http_client()?)?;

    let pool = engine.start_workers();
    let mut ticker = tokio::time::interval(engine.config().workers.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if args.exit_when_idle && drained(&store) {
                    info!("no unfinished runs left");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping workers");
                break;
            }
        }
    }

    pool.shutdown().await;
    Ok(exit_codes::SUCCESS)
}

/// True once no run is left unfinished. A failed query counts as not drained;
/// the next tick asks again.
fn drained(store: &Store) -> bool {
    match store.unfinished_run_ids() {
        Ok(unfinished) => unfinished.is_empty(),
        Err(e) => {
            warn!(error = %e, "failed to list unfinished runs");
            false
        }
    }
}
