// crates/rowprobe-cli/src/main.rs
// ============================================================================
// Module: Rowprobe CLI Entry Point
// Description: Command dispatcher for one-off connector checks.
// Purpose: Run command and stub checks from the shell and report outcomes.
// Dependencies: clap, rowprobe-config, rowprobe-connectors, rowprobe-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The `rowprobe` binary drives the built-in connectors outside a harness.
//! Every check prints one JSON [`Outcome`] line on stdout, and the process
//! exit code mirrors the most severe outcome: `0` success, `1` assertion
//! failure, `2` infrastructure error. With `--events`, connector lifecycle
//! events stream to stderr as JSON lines.
//!
//! Security posture: arguments and config files are untrusted input; invalid
//! input fails closed with exit code `2`.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use rowprobe_config::RowprobeConfig;
use rowprobe_connectors::CommandConnector;
use rowprobe_connectors::StubConnector;
use rowprobe_connectors::acceptor::START_OPERATION;
use rowprobe_connectors::acceptor::VALIDATE_OPERATION;
use rowprobe_connectors::command::EXEC_OPERATION;
use rowprobe_core::Connector;
use rowprobe_core::ConnectorConfig;
use rowprobe_core::JsonLineSink;
use rowprobe_core::NoopSink;
use rowprobe_core::Outcome;
use rowprobe_core::Row;
use rowprobe_core::SharedEventSink;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit code for an assertion failure.
const EXIT_ASSERTION_FAILURE: u8 = 1;
/// Exit code for an infrastructure error or invalid invocation.
const EXIT_INFRASTRUCTURE_ERROR: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "rowprobe", version, disable_help_subcommand = true)]
struct Cli {
    /// Stream connector events to stderr as JSON lines.
    #[arg(long, global = true)]
    events: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one shell command and check its exit code and output.
    Exec(ExecCommand),
    /// Accept one framed message on a port and check its payload.
    Stub(StubCommand),
    /// Run operations against connectors declared in a config file.
    Check(CheckCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `exec`.
#[derive(Args, Debug)]
struct ExecCommand {
    /// Shell command line to run.
    #[arg(long, value_name = "COMMAND")]
    command: String,
    /// Timeout in milliseconds before the command is killed.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Exit code the command must return.
    #[arg(long, value_name = "CODE", allow_negative_numbers = true)]
    exit_code: Option<i32>,
    /// Pattern some stdout line must fully match.
    #[arg(long, value_name = "PATTERN")]
    expect_output: Option<String>,
    /// Pattern some stderr line must fully match.
    #[arg(long, value_name = "PATTERN")]
    expect_error: Option<String>,
    /// Working directory for the command.
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,
    /// Do not write the command line to the child's stdin.
    #[arg(long)]
    no_stdin_echo: bool,
}

/// Arguments for `stub`.
#[derive(Args, Debug)]
struct StubCommand {
    /// Port to listen on; `0` picks a free port.
    #[arg(long, value_name = "PORT")]
    port: u16,
    /// Interface to bind.
    #[arg(long, value_name = "HOST")]
    host: Option<String>,
    /// Pattern the whitespace-normalized payload must match.
    #[arg(long, value_name = "PATTERN")]
    expect: String,
    /// Body sent back when the payload matches.
    #[arg(long, value_name = "BODY")]
    response: Option<String>,
    /// Milliseconds to wait for the connection.
    #[arg(long, value_name = "MS")]
    wait_ms: Option<u64>,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
struct CheckCommand {
    /// Config file path (defaults to `ROWPROBE_CONFIG`, then `rowprobe.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Name of the configured connector to drive.
    #[arg(long, value_name = "NAME")]
    connector: String,
    /// Operation to run; repeat to run several in order.
    #[arg(long = "operation", value_name = "OPERATION", required = true)]
    operations: Vec<String>,
    /// Row field as `name=value`; repeat a name to give it several values.
    #[arg(long = "field", value_name = "NAME=VALUE")]
    fields: Vec<String>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file without running anything.
    Validate {
        /// Config file path (defaults to `ROWPROBE_CONFIG`, then `rowprobe.toml`).
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let sink = event_sink(cli.events);
    match cli.command {
        Commands::Exec(command) => command_exec(command, sink),
        Commands::Stub(command) => command_stub(command, sink),
        Commands::Check(command) => command_check(command, &sink),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

/// Selects the event sink for this invocation.
fn event_sink(events: bool) -> SharedEventSink {
    if events { Arc::new(JsonLineSink::new(std::io::stderr())) } else { NoopSink::shared() }
}

// ============================================================================
// SECTION: Exec Command
// ============================================================================

/// Executes the `exec` command.
fn command_exec(command: ExecCommand, sink: SharedEventSink) -> CliResult<ExitCode> {
    let mut config = ConnectorConfig::new().with("echo_stdin", (!command.no_stdin_echo).to_string());
    if let Some(dir) = &command.working_dir {
        config = config.with("working_dir", dir.to_string_lossy());
    }
    let row = exec_row(&command);
    let mut connector = CommandConnector::with_sink(sink);
    let outcome = run_single(&mut connector, &config, &[(EXEC_OPERATION, &row)], |_: &CommandConnector| {
        Ok(())
    })?;
    report(&outcome)
}

/// Builds the `exec` row from command arguments.
fn exec_row(command: &ExecCommand) -> Row {
    let mut pairs = vec![("command", command.command.clone())];
    if let Some(timeout_ms) = command.timeout_ms {
        pairs.push(("timeout_ms", timeout_ms.to_string()));
    }
    if let Some(exit_code) = command.exit_code {
        pairs.push(("exit_code", exit_code.to_string()));
    }
    if let Some(pattern) = &command.expect_output {
        pairs.push(("expected_output", pattern.clone()));
    }
    if let Some(pattern) = &command.expect_error {
        pairs.push(("expected_error", pattern.clone()));
    }
    Row::from_pairs(pairs)
}

// ============================================================================
// SECTION: Stub Command
// ============================================================================

/// Executes the `stub` command.
fn command_stub(command: StubCommand, sink: SharedEventSink) -> CliResult<ExitCode> {
    let mut config = ConnectorConfig::new().with("port", command.port.to_string());
    if let Some(host) = &command.host {
        config = config.with("host", host.as_str());
    }
    if let Some(wait_ms) = command.wait_ms {
        config = config.with("accept_wait_ms", wait_ms.to_string());
    }
    let mut validate_pairs = vec![("expected", command.expect.clone())];
    if let Some(response) = &command.response {
        validate_pairs.push(("response", response.clone()));
    }
    let start_row = Row::default();
    let validate_row = Row::from_pairs(validate_pairs);
    let mut connector = StubConnector::with_sink(sink);
    let steps = [(START_OPERATION, &start_row), (VALIDATE_OPERATION, &validate_row)];
    let outcome = run_single(&mut connector, &config, &steps, |connector: &StubConnector| {
        match connector.local_addr() {
            Some(addr) => write_stderr_line(&format!("rowprobe stub listening on {addr}"))
                .map_err(|err| CliError::new(output_error("stderr", &err))),
            None => Ok(()),
        }
    })?;
    report(&outcome)
}

// ============================================================================
// SECTION: Check Command
// ============================================================================

/// Executes the `check` command.
fn command_check(command: CheckCommand, sink: &SharedEventSink) -> CliResult<ExitCode> {
    let row = parse_fields(&command.fields)?;
    let config = RowprobeConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(err.to_string()))?;
    if config.connector(&command.connector).is_none() {
        return Err(CliError::new(format!("connector not found in config: {}", command.connector)));
    }
    let mut registry =
        config.build_registry(sink).map_err(|err| CliError::new(err.to_string()))?;
    let mut worst = 0;
    for operation in &command.operations {
        let outcome = registry.execute(&command.connector, operation, &row);
        write_outcome(&outcome)?;
        worst = worst.max(outcome_rank(&outcome));
        if outcome.is_error() {
            break;
        }
    }
    registry.tear_down_all().map_err(|err| CliError::new(err.to_string()))?;
    Ok(ExitCode::from(worst))
}

/// Parses repeated `name=value` arguments into a row.
fn parse_fields(fields: &[String]) -> CliResult<Row> {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for field in fields {
        let (name, value) = field
            .split_once('=')
            .ok_or_else(|| CliError::new(format!("field must be NAME=VALUE: {field}")))?;
        if name.trim().is_empty() {
            return Err(CliError::new(format!("field name must be non-empty: {field}")));
        }
        grouped.entry(name).or_default().push(value);
    }
    Ok(Row::new(grouped))
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes the `config` command.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate {
            config,
        } => {
            let config = RowprobeConfig::load(config.as_deref())
                .map_err(|err| CliError::new(err.to_string()))?;
            write_stdout_line(&format!("Config valid ({} connectors)", config.connectors.len()))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Execution Helpers
// ============================================================================

/// Sets up a connector, runs `steps` in order, and tears it down.
///
/// Stops at the first non-success step and returns its outcome. `after_first`
/// runs once the first step succeeds.
fn run_single<C, F>(
    connector: &mut C,
    config: &ConnectorConfig,
    steps: &[(&str, &Row)],
    mut after_first: F,
) -> CliResult<Outcome>
where
    C: Connector,
    F: FnMut(&C) -> CliResult<()>,
{
    if let Err(err) = connector.setup(config) {
        return Ok(Outcome::from_result(Err(err.into())));
    }
    let mut outcome = Outcome::Success;
    for (index, (operation, row)) in steps.iter().enumerate() {
        outcome = Outcome::from_result(connector.execute(operation, row));
        if !outcome.is_success() {
            break;
        }
        if index == 0 {
            after_first(connector)?;
        }
    }
    if let Err(err) = connector.tear_down()
        && outcome.is_success()
    {
        outcome = Outcome::from_result(Err(err.into()));
    }
    Ok(outcome)
}

/// Returns the exit code rank of an outcome.
const fn outcome_rank(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Success => 0,
        Outcome::AssertionFailure { .. } => EXIT_ASSERTION_FAILURE,
        Outcome::InfrastructureError { .. } => EXIT_INFRASTRUCTURE_ERROR,
    }
}

/// Prints an outcome and maps it to the process exit code.
fn report(outcome: &Outcome) -> CliResult<ExitCode> {
    write_outcome(outcome)?;
    Ok(ExitCode::from(outcome_rank(outcome)))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one outcome as a JSON line on stdout.
fn write_outcome(outcome: &Outcome) -> CliResult<()> {
    let line = serde_json::to_string(outcome)
        .map_err(|err| CliError::new(format!("failed to serialize outcome: {err}")))?;
    write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns the infrastructure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::from(EXIT_INFRASTRUCTURE_ERROR)
}
