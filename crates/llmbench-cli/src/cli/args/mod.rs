use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod run;
pub use run::*;


#[derive(Parser)]
#[command(
    name = "llmbench",
    version,
    about = "Run benchmark task collections against LLM providers and score the answers with a judge model"
)]
pub struct Cli {
    /// Workspace file with engine settings, providers, tasks and collections
    #[arg(long, global = true, default_value = "llmbench.yaml", env = "LLMBENCH_CONFIG")]
    pub config: PathBuf,

    /// SQLite database holding runs and items
    #[arg(long, global = true, default_value = ".llmbench/runs.db", env = "LLMBENCH_DB")]
    pub db: PathBuf,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start a run and (by default) execute it to completion
    Run(RunArgs),
    /// Execute every unfinished run in the database until interrupted
    Serve(ServeArgs),
    /// Show a run with its items
    Status(RunIdArgs),
    /// List runs, newest first
    List,
    /// Cancel a run; in-flight items drain
    Cancel(RunIdArgs),
    /// Delete a finished run and its items
    Delete(RunIdArgs),
    /// Check the workspace file and print what it defines
    Validate,
}

#[derive(clap::Args, Clone, Debug)]
pub struct RunIdArgs {
    pub run_id: String,
}
