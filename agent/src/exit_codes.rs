//! Stable exit codes for the agent CLI.

/// The model produced a final answer.
pub const OK: i32 = 0;
/// Invalid invocation, configuration, sandbox root or credentials.
pub const INVALID: i32 = 1;
/// The model backend failed; no answer was produced.
pub const MODEL_UNAVAILABLE: i32 = 2;
/// The iteration cap was reached before the model answered.
pub const EXHAUSTED: i32 = 3;
