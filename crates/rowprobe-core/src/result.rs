// crates/rowprobe-core/src/result.rs
// ============================================================================
// Module: Rowprobe Execution Result
// Description: Captured outcome of one process execution.
// Purpose: Carry exit status and output back to the adjudicating caller.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`ExecutionResult`] is produced once per command execution. It records what
//! happened and leaves pass/fail to the caller: a timeout only forces
//! termination and is surfaced through `timed_out`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;

// ============================================================================
// SECTION: Execution Result
// ============================================================================

/// Exit status and captured output of one command execution.
///
/// # Invariants
/// - `exit_code` is always defined; signal termination maps to `128 + signal`
///   and an otherwise unknown status maps to `-1`.
/// - `stdout`/`stderr` keep original line endings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// True when termination was forced after the timeout elapsed.
    pub timed_out: bool,
    /// Wall-clock time from spawn to observed exit.
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// Returns true when the process exited with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Serializes a duration as whole milliseconds.
fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
