//! Run and serve command arguments.

use clap::Parser;

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    /// Task collection to run
    #[arg(long)]
    pub collection: String,

    /// Model under test as provider:model (repeatable)
    #[arg(long = "target", required = true)]
    pub targets: Vec<String>,

    /// Judge model as provider:model
    #[arg(long, env = "LLMBENCH_JUDGE")]
    pub judge: String,

    /// Only create the run; leave execution to `llmbench serve`
    #[arg(long)]
    pub detach: bool,

    /// Give up waiting after this many seconds (the run keeps its state)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Answer every prompt with canned replies instead of calling providers
    #[arg(long)]
    pub dry_run: bool,

    /// Override workers.task_workers from the workspace file
    #[arg(long)]
    pub task_workers: Option<usize>,

    /// Override workers.judge_workers from the workspace file
    #[arg(long)]
    pub judge_workers: Option<usize>,
}

#[derive(Parser, Clone, Debug)]
pub struct ServeArgs {
    /// Stop once no unfinished run is left
    #[arg(long)]
    pub exit_when_idle: bool,

    #[arg(long)]
    pub task_workers: Option<usize>,

    #[arg(long)]
    pub judge_workers: Option<usize>,
}
