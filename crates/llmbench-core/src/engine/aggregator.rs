//! RunStatusAggregator: flips a run to FINISHED once nothing is left to do.

use crate::errors::EngineError;
use crate::lease::Transition;
use crate::storage::Store;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[derive(Clone)]
pub struct RunStatusAggregator {
    store: Store,
}

impl RunStatusAggregator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns true if this call finished the run. Finishing an already
    /// finished run, or a run with outstanding items, is a no-op.
    pub fn finalize(&self, run_id: &str, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let flipped = self.store.finish_run_if_drained(run_id, now)?;
        if flipped {
            let counts = self.store.status_counts(run_id)?;
            info!(
                run_id,
                completed = counts.completed,
                failed = counts.failed,
                "run finished"
            );
        }
        Ok(flipped)
    }

    /// Event path: called after a worker's transition.
    pub fn on_item_terminal(&self, transition: &Transition, now: DateTime<Utc>) -> Result<bool, EngineError> {
        if !transition.is_terminal() {
            return Ok(false);
        }
        self.finalize(&transition.run_id, now)
    }

    /// Poll path: finalizes every unfinished run that has drained. One failing
    /// run does not stop the sweep.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<String>, EngineError> {
        let mut finished = Vec::new();
        for run_id in self.store.unfinished_run_ids()? {
            match self.finalize(&run_id, now) {
                Ok(true) => finished.push(run_id),
                Ok(false) => {}
                Err(e) => warn!(run_id = %run_id, error = %e, "sweep could not finalize run"),
            }
        }
        Ok(finished)
    }
}
