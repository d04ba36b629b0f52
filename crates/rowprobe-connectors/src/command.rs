// crates/rowprobe-connectors/src/command.rs
// ============================================================================
// Module: Command Connector
// Description: Connector adjudicating shell command executions.
// Purpose: Map the `exec` operation onto the command runner and its verdict.
// Dependencies: rowprobe-core, crate::process
// ============================================================================

//! ## Overview
//! [`CommandConnector`] runs the row's `command` through a [`CommandRunner`]
//! and decides the verdict from the exit code and optional output patterns.
//! Invariants:
//! - Patterns are compiled before the command runs, so a malformed pattern
//!   never triggers side effects.
//! - A shell "cannot execute" or "not found" code is an infrastructure error
//!   unless the row expects that exact code.
//! - A non-zero exit with no expected code is an infrastructure error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rowprobe_core::AssertionFailure;
use rowprobe_core::CheckResult;
use rowprobe_core::Connector;
use rowprobe_core::ConnectorConfig;
use rowprobe_core::ExecutionResult;
use rowprobe_core::InfrastructureError;
use rowprobe_core::LinePattern;
use rowprobe_core::NoopSink;
use rowprobe_core::Row;
use rowprobe_core::SharedEventSink;
use rowprobe_core::interfaces::unknown_operation;

use crate::process::CommandRunner;
use crate::process::CommandRunnerConfig;
use crate::process::DEFAULT_TIMEOUT;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connector kind label.
pub const COMMAND_KIND: &str = "command";
/// Operation running one command.
pub const EXEC_OPERATION: &str = "exec";

/// Exit codes meaning the shell could not run the command at all.
#[cfg(windows)]
const LAUNCH_FAILURE_CODES: &[i32] = &[9009];
/// Exit codes meaning the shell could not run the command at all.
#[cfg(not(windows))]
const LAUNCH_FAILURE_CODES: &[i32] = &[126, 127];

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Parsed command connector configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSettings {
    /// Timeout used when a row does not override it.
    pub timeout: Duration,
    /// Runner settings.
    pub runner: CommandRunnerConfig,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            runner: CommandRunnerConfig::default(),
        }
    }
}

impl CommandSettings {
    /// Parses settings from connector configuration.
    ///
    /// Recognized keys: `timeout_ms`, `poll_interval_ms`, `echo_stdin`,
    /// `working_dir`, and `env.<NAME>`.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when a value does not parse or the poll
    /// interval is zero.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, InfrastructureError> {
        let defaults = Self::default();
        let timeout = config
            .parse::<u64>("timeout_ms")?
            .map_or(defaults.timeout, Duration::from_millis);
        let poll_interval = config
            .parse::<u64>("poll_interval_ms")?
            .map_or(defaults.runner.poll_interval, Duration::from_millis);
        if poll_interval.is_zero() {
            return Err(InfrastructureError::new("config key 'poll_interval_ms' must be non-zero"));
        }
        let env: BTreeMap<String, String> = config
            .with_prefix("env.")
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Ok(Self {
            timeout,
            runner: CommandRunnerConfig {
                poll_interval,
                echo_stdin: config.parse_or("echo_stdin", defaults.runner.echo_stdin)?,
                working_dir: config.get("working_dir").map(PathBuf::from),
                env,
                drain_window: defaults.runner.drain_window,
            },
        })
    }
}

// ============================================================================
// SECTION: Command Connector
// ============================================================================

/// Connector running shell commands.
pub struct CommandConnector {
    /// Destination for lifecycle events.
    sink: SharedEventSink,
    /// Runner and default timeout, present after setup.
    runner: Option<(CommandRunner, Duration)>,
    /// Result of the most recent execution.
    last_result: Option<ExecutionResult>,
}

impl CommandConnector {
    /// Creates a connector that discards events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(NoopSink::shared())
    }

    /// Creates a connector reporting events to `sink`.
    #[must_use]
    pub fn with_sink(sink: SharedEventSink) -> Self {
        Self {
            sink,
            runner: None,
            last_result: None,
        }
    }

    /// Returns the result of the most recent execution.
    #[must_use]
    pub const fn last_result(&self) -> Option<&ExecutionResult> {
        self.last_result.as_ref()
    }

    /// Runs the row's command and adjudicates the result.
    fn exec(&mut self, row: &Row) -> CheckResult {
        let (runner, default_timeout) = self
            .runner
            .as_ref()
            .ok_or_else(|| InfrastructureError::new("command connector is not set up"))?;
        let command = row.single("command")?;
        let timeout = row_number::<u64>(row, "timeout_ms")?
            .map_or(*default_timeout, Duration::from_millis);
        let expectation = Expectation {
            exit_code: row_number::<i32>(row, "exit_code")?,
            stdout: compile_optional(row, "expected_output")?,
            stderr: compile_optional(row, "expected_error")?,
        };
        let result = runner.exec(command, timeout)?;
        let verdict = expectation.check(&result);
        self.last_result = Some(result);
        verdict
    }
}

impl Default for CommandConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for CommandConnector {
    fn kind(&self) -> &'static str {
        COMMAND_KIND
    }

    fn setup(&mut self, config: &ConnectorConfig) -> Result<(), InfrastructureError> {
        let settings = CommandSettings::from_config(config)?;
        let runner = CommandRunner::with_sink(settings.runner, self.sink.clone());
        self.runner = Some((runner, settings.timeout));
        Ok(())
    }

    fn execute(&mut self, operation: &str, row: &Row) -> CheckResult {
        match operation {
            EXEC_OPERATION => self.exec(row),
            other => Err(unknown_operation(COMMAND_KIND, other).into()),
        }
    }

    fn tear_down(&mut self) -> Result<(), InfrastructureError> {
        self.last_result = None;
        Ok(())
    }
}

// ============================================================================
// SECTION: Adjudication
// ============================================================================

/// What a row expects from one execution.
struct Expectation {
    /// Expected exit code, when given.
    exit_code: Option<i32>,
    /// Pattern some stdout line must match.
    stdout: Option<LinePattern>,
    /// Pattern some stderr line must match.
    stderr: Option<LinePattern>,
}

impl Expectation {
    /// Classifies an execution result.
    fn check(&self, result: &ExecutionResult) -> CheckResult {
        let code = result.exit_code;
        if self.exit_code != Some(code) && LAUNCH_FAILURE_CODES.contains(&code) {
            return Err(InfrastructureError::new(format!(
                "command could not be run (exit code {code}): {}",
                result.stderr.trim()
            ))
            .into());
        }
        match self.exit_code {
            Some(expected) if expected != code => {
                return Err(AssertionFailure::mismatch(
                    "exit code",
                    &expected.to_string(),
                    &code.to_string(),
                )
                .into());
            }
            None if code != 0 => {
                let reason = if result.timed_out { " after timeout" } else { "" };
                return Err(InfrastructureError::new(format!(
                    "command exited with code {code}{reason}: {}",
                    result.stderr.trim()
                ))
                .into());
            }
            _ => {}
        }
        check_stream(self.stdout.as_ref(), &result.stdout, "stdout")?;
        check_stream(self.stderr.as_ref(), &result.stderr, "stderr")
    }
}

/// Checks one captured stream against an optional pattern.
fn check_stream(pattern: Option<&LinePattern>, text: &str, subject: &str) -> CheckResult {
    match pattern {
        Some(pattern) if !pattern.matches(text) => {
            Err(AssertionFailure::mismatch(subject, pattern.as_str(), text).into())
        }
        _ => Ok(()),
    }
}

/// Parses an optional numeric row field.
fn row_number<T>(row: &Row, field: &str) -> Result<Option<T>, InfrastructureError>
where
    T: FromStr,
    T::Err: Display,
{
    row.optional_single(field)?
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|err| {
                InfrastructureError::new(format!("row field '{field}' is invalid: {err}"))
            })
        })
        .transpose()
}

/// Compiles an optional pattern row field.
fn compile_optional(row: &Row, field: &str) -> Result<Option<LinePattern>, InfrastructureError> {
    row.optional_single(field)?.map(LinePattern::compile).transpose()
}
