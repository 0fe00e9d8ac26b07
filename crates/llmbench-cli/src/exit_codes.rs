//! Process exit codes. Scripts depend on these values.

pub const SUCCESS: i32 = 0;
/// The run finished but at least one item FAILED.
pub const ITEMS_FAILED: i32 = 1;
/// Workspace, database or argument problem; nothing was executed.
pub const CONFIG_ERROR: i32 = 2;
/// The requested run does not exist.
pub const NOT_FOUND: i32 = 3;
/// `--timeout` elapsed before the run finished.
pub const TIMED_OUT: i32 = 4;
