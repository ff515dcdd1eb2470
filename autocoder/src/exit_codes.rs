//! Stable exit codes for the CLI.

/// The task was solved (or the command succeeded).
pub const OK: i32 = 0;
/// Invalid configuration/arguments or an internal error.
pub const INVALID: i32 = 1;
/// The attempt budget was exhausted without solving the task.
pub const EXHAUSTED: i32 = 2;
/// The session was cancelled by the host.
pub const CANCELLED: i32 = 3;
