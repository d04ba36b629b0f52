// crates/rowprobe-connectors/tests/command_runner.rs
// ============================================================================
// Module: Command Runner Tests
// Description: Process execution, draining, and timeout behavior.
// Purpose: Ensure exec always returns a defined result without losing output.
// Dependencies: rowprobe-connectors, rowprobe-core, tempfile
// ============================================================================

//! ## Overview
//! Runs real shell commands through [`CommandRunner`]. Unix only: the
//! commands assume a POSIX shell.

#![cfg(unix)]
#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use rowprobe_connectors::CommandRunner;
use rowprobe_connectors::CommandRunnerConfig;
use rowprobe_core::EventKind;
use rowprobe_core::MemorySink;
use rowprobe_core::expect_match;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Short timeout for commands expected to finish immediately.
const QUICK: Duration = Duration::from_secs(10);

/// Runner polling fast enough to keep tests short.
fn fast_runner() -> CommandRunner {
    CommandRunner::new(CommandRunnerConfig {
        poll_interval: Duration::from_millis(20),
        ..CommandRunnerConfig::default()
    })
}

// ============================================================================
// SECTION: Output Capture
// ============================================================================

/// A directory listing can be matched line by line.
#[test]
fn directory_listing_matches_known_line() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("marker.txt"), "x").unwrap();
    let runner = CommandRunner::new(CommandRunnerConfig {
        poll_interval: Duration::from_millis(20),
        working_dir: Some(dir.path().to_path_buf()),
        ..CommandRunnerConfig::default()
    });

    let result = runner.exec("ls -1", QUICK).unwrap();
    assert_eq!(result.exit_code, 0);
    assert!(!result.timed_out);
    expect_match(&result.stdout, "marker\\.txt", "stdout").unwrap();

    let failure = expect_match(&result.stdout, "no-such-entry", "stdout").unwrap_err();
    assert!(failure.is_assertion());
    let message = failure.to_string();
    assert!(message.contains("no-such-entry"));
    assert!(message.contains("marker.txt"));
}

/// Exit code and stderr are reported as produced.
#[test]
fn exit_code_and_stderr_are_captured() {
    let result = fast_runner().exec("echo oops 1>&2; exit 3", QUICK).unwrap();
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stderr, "oops\n");
    assert!(result.stdout.is_empty());
    assert!(!result.success());
}

/// Output larger than a pipe buffer does not deadlock the child.
#[test]
fn large_output_is_fully_drained() {
    let result = fast_runner().exec("head -c 200000 /dev/zero | tr '\\0' a", QUICK).unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout.len(), 200_000);
}

/// Line endings are preserved verbatim.
#[test]
fn line_endings_are_preserved() {
    let result = fast_runner().exec("printf 'a\\r\\nb\\n'", QUICK).unwrap();
    assert_eq!(result.stdout, "a\r\nb\n");
}

// ============================================================================
// SECTION: Stdin Echo
// ============================================================================

/// By default the command text is also written to stdin.
#[test]
fn command_text_is_echoed_to_stdin() {
    let result = fast_runner().exec("cat", QUICK).unwrap();
    assert_eq!(result.stdout, "cat\n");
}

/// Disabling the echo leaves stdin empty and closed.
#[test]
fn stdin_echo_can_be_disabled() {
    let runner = CommandRunner::new(CommandRunnerConfig {
        poll_interval: Duration::from_millis(20),
        echo_stdin: false,
        ..CommandRunnerConfig::default()
    });
    let result = runner.exec("cat", QUICK).unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "");
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Extra environment variables reach the child.
#[test]
fn extra_environment_is_applied() {
    let mut config = CommandRunnerConfig {
        poll_interval: Duration::from_millis(20),
        ..CommandRunnerConfig::default()
    };
    config.env.insert("ROWPROBE_PROBE".to_string(), "hello".to_string());
    let result = CommandRunner::new(config).exec("printf %s \"$ROWPROBE_PROBE\"", QUICK).unwrap();
    assert_eq!(result.stdout, "hello");
}

/// A launch failure is an infrastructure error.
#[test]
fn spawn_failure_is_infrastructure_error() {
    let runner = CommandRunner::new(CommandRunnerConfig {
        working_dir: Some("/nonexistent/rowprobe/dir".into()),
        ..CommandRunnerConfig::default()
    });
    let error = runner.exec("true", QUICK).unwrap_err();
    assert!(error.message().contains("failed to start command"));
    assert!(error.cause_text().is_some());
}

/// A missing program is reported by the shell as exit code 127.
#[test]
fn missing_program_reports_not_found_code() {
    let result = fast_runner().exec("rowprobe-no-such-program-xyz", QUICK).unwrap();
    assert_eq!(result.exit_code, 127);
}

// ============================================================================
// SECTION: Timeout
// ============================================================================

/// A command outliving its timeout is killed and reported with a signal code.
#[test]
fn timeout_forces_termination() {
    let started = Instant::now();
    let result = fast_runner().exec("sleep 30", Duration::from_millis(200)).unwrap();
    assert!(result.timed_out);
    assert_eq!(result.exit_code, 128 + 9);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(result.elapsed >= Duration::from_millis(200));
}

/// Returns true while `pid` is a live, non-zombie process.
#[cfg(target_os = "linux")]
fn process_alive(pid: &str) -> bool {
    fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
        stat.rsplit_once(')').and_then(|(_, rest)| rest.split_whitespace().next()) != Some("Z")
    })
}

/// A timeout kills commands the shell started, not only the shell.
#[cfg(target_os = "linux")]
#[test]
fn timeout_kills_descendants() {
    let started = Instant::now();
    let result = fast_runner()
        .exec("sleep 30 & echo $!; wait", Duration::from_millis(300))
        .unwrap();
    assert!(result.timed_out);
    assert!(started.elapsed() < Duration::from_secs(5));
    let pid = result.stdout.trim().to_string();
    assert!(!pid.is_empty(), "background pid not captured");

    let deadline = Instant::now() + Duration::from_secs(2);
    while process_alive(&pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!process_alive(&pid), "descendant {pid} survived the timeout");
}

/// Lifecycle events are emitted in order.
#[test]
fn lifecycle_events_are_recorded() {
    let sink = Arc::new(MemorySink::new());
    let runner = CommandRunner::with_sink(
        CommandRunnerConfig {
            poll_interval: Duration::from_millis(20),
            ..CommandRunnerConfig::default()
        },
        sink.clone(),
    );
    runner.exec("sleep 30", Duration::from_millis(100)).unwrap();
    assert_eq!(
        sink.kinds(),
        vec![EventKind::CommandStarted, EventKind::CommandTimeout, EventKind::CommandFinished]
    );
    let finished = sink.events().pop().unwrap();
    assert_eq!(finished.field("timed_out").and_then(|value| value.as_bool()), Some(true));
}
