//! Benchmark run execution engine.
//!
//! A run fans out into one item per (task, provider, model). Task workers
//! lease PENDING items and query the target model; judge workers lease
//! WAITING_FOR_JUDGE items and score the answer. Every state change goes
//! through [`lease::ItemLeaseManager`]; [`engine::RunStatusAggregator`]
//! finishes a run once all of its items are terminal.

pub mod config;
pub mod engine;
pub mod errors;
pub mod judge;
pub mod lease;
pub mod model;
pub mod providers;
pub mod retry;
pub mod storage;
pub mod tasks;

pub use config::EngineConfig;
pub use engine::{BenchmarkEngine, RunCoordinator, StartRunRequest, WorkerPool};
pub use errors::{EngineError, FailureKind, ItemFailure};
pub use model::{BenchmarkRun, ItemStatus, RunDetail, RunItem, RunStatus, RunSummary, Target};
pub use storage::Store;
