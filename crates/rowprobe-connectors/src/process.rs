// crates/rowprobe-connectors/src/process.rs
// ============================================================================
// Module: Command Runner
// Description: Shell command execution with incremental draining and timeout.
// Purpose: Run one OS command and capture exit status plus output.
// Dependencies: nix (unix), rowprobe-core, std::process
// ============================================================================

//! ## Overview
//! [`CommandRunner::exec`] launches a command through the platform shell,
//! drains stdout and stderr on dedicated reader threads, and polls the child
//! with `try_wait` on a fixed interval. Once the elapsed time exceeds the
//! timeout the child's whole process group is killed and polling continues
//! until its status is observable. On Unix the shell leads its own process
//! group, so commands it started die with it and release the output pipes.
//! Invariants:
//! - `exec` returns after at most `timeout + poll_interval + drain_window`
//!   unless reaping a killed child stalls in the kernel.
//! - Output already read into a stream buffer before the final drain is
//!   never discarded.
//! - Read errors on the output pipes end that stream's capture silently.
//! - The child and its process group are killed and the child reaped on
//!   every early return.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::process::Child;
use std::process::ChildStdin;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use rowprobe_core::ConnectorEvent;
use rowprobe_core::EventKind;
use rowprobe_core::ExecutionResult;
use rowprobe_core::InfrastructureError;
use rowprobe_core::NoopSink;
use rowprobe_core::SharedEventSink;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default interval between exit-status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Default bound on joining the stream readers after exit.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_secs(1);
/// Read chunk size for output pipes.
const READ_CHUNK_BYTES: usize = 8 * 1024;
/// Sleep between reader-completion checks during the final drain.
const DRAIN_POLL: Duration = Duration::from_millis(5);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Settings applied to every command a runner executes.
///
/// # Invariants
/// - `poll_interval` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRunnerConfig {
    /// Sleep between exit-status polls.
    pub poll_interval: Duration,
    /// Write the command text to the child's stdin before closing it.
    pub echo_stdin: bool,
    /// Working directory for the child, when set.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env: BTreeMap<String, String>,
    /// Bound on joining the stream readers once exit is observed.
    pub drain_window: Duration,
}

impl Default for CommandRunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            echo_stdin: true,
            working_dir: None,
            env: BTreeMap::new(),
            drain_window: DEFAULT_DRAIN_WINDOW,
        }
    }
}

// ============================================================================
// SECTION: Command Runner
// ============================================================================

/// Executes shell commands under a timeout.
#[derive(Clone)]
pub struct CommandRunner {
    /// Runner settings.
    config: CommandRunnerConfig,
    /// Destination for lifecycle events.
    sink: SharedEventSink,
}

impl CommandRunner {
    /// Creates a runner that discards events.
    #[must_use]
    pub fn new(config: CommandRunnerConfig) -> Self {
        Self::with_sink(config, NoopSink::shared())
    }

    /// Creates a runner reporting lifecycle events to `sink`.
    #[must_use]
    pub fn with_sink(config: CommandRunnerConfig, sink: SharedEventSink) -> Self {
        Self {
            config,
            sink,
        }
    }

    /// Returns the runner settings.
    #[must_use]
    pub const fn config(&self) -> &CommandRunnerConfig {
        &self.config
    }

    /// Runs `command` through the platform shell.
    ///
    /// A timeout does not make the call fail: it forces termination and is
    /// reported through [`ExecutionResult::timed_out`].
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the process or its reader threads
    /// cannot be started.
    pub fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, InfrastructureError> {
        let mut shell = self.shell_command(command);
        let child = shell.spawn().map_err(|err| {
            InfrastructureError::with_cause(format!("failed to start command `{command}`"), err)
        })?;
        let started = Instant::now();
        let mut guard = ChildGuard {
            child,
        };
        self.sink.record(
            &ConnectorEvent::new(EventKind::CommandStarted)
                .with("command", command)
                .with("pid", guard.child.id()),
        );

        let stdout = StreamDrain::spawn("stdout", guard.child.stdout.take())?;
        let stderr = StreamDrain::spawn("stderr", guard.child.stderr.take())?;
        let stdin = guard.child.stdin.take();
        let echo = if self.config.echo_stdin {
            spawn_stdin_echo(stdin, command)
        } else {
            drop(stdin);
            None
        };

        let mut timed_out = false;
        let status = loop {
            match guard.child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(_) => break None,
            }
            thread::sleep(self.config.poll_interval);
            if !timed_out && started.elapsed() > timeout {
                timed_out = true;
                if let Err(err) = kill_process_tree(&mut guard.child)
                    && err.kind() != ErrorKind::InvalidInput
                {
                    return Err(InfrastructureError::with_cause(
                        format!("failed to terminate command `{command}`"),
                        err,
                    ));
                }
                self.sink.record(
                    &ConnectorEvent::new(EventKind::CommandTimeout)
                        .with("command", command)
                        .with("timeout_ms", millis(timeout)),
                );
            }
        };
        let elapsed = started.elapsed();

        let deadline = Instant::now() + self.config.drain_window;
        let stdout = stdout.finish(deadline);
        let stderr = stderr.finish(deadline);
        if let Some(handle) = echo {
            join_until(handle, deadline);
        }

        let result = ExecutionResult {
            exit_code: status.map_or(-1, exit_code),
            stdout,
            stderr,
            timed_out,
            elapsed,
        };
        self.sink.record(
            &ConnectorEvent::new(EventKind::CommandFinished)
                .with("exit_code", result.exit_code)
                .with("timed_out", result.timed_out)
                .with("elapsed_ms", millis(result.elapsed))
                .with("stdout_bytes", result.stdout.len())
                .with("stderr_bytes", result.stderr.len()),
        );
        Ok(result)
    }

    /// Builds the shell invocation with piped stdio and runner settings.
    fn shell_command(&self, command: &str) -> Command {
        let mut shell = platform_shell(command);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            shell.process_group(0);
        }
        shell.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            shell.current_dir(dir);
        }
        shell.envs(&self.config.env);
        shell
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(CommandRunnerConfig::default())
    }
}

// ============================================================================
// SECTION: Platform Shell
// ============================================================================

/// Returns the shell invocation for the current platform.
#[cfg(windows)]
fn platform_shell(command: &str) -> Command {
    let mut shell = Command::new("cmd");
    shell.arg("/C").arg(command);
    shell
}

/// Returns the shell invocation for the current platform.
#[cfg(not(windows))]
fn platform_shell(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

/// Maps an exit status to a defined exit code.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().or_else(|| signal_exit_code(status)).unwrap_or(-1)
}

/// Returns `128 + signal` for a signal-terminated process.
#[cfg(unix)]
fn signal_exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|signal| 128 + signal)
}

/// Signal termination does not exist on this platform.
#[cfg(not(unix))]
const fn signal_exit_code(_status: ExitStatus) -> Option<i32> {
    None
}

/// Kills the process group led by `child`.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::Signal;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let group = i32::try_from(child.id()).map_err(io::Error::other)?;
    match killpg(Pid::from_raw(group), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Kills `child`; Windows has no process group to signal.
#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

// ============================================================================
// SECTION: Child Guard
// ============================================================================

/// Owns the child so every return path kills and reaps it.
struct ChildGuard {
    /// Spawned shell process.
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            if kill_process_tree(&mut self.child).is_err() {
                return;
            }
            drop(self.child.wait());
        }
    }
}

// ============================================================================
// SECTION: Stream Draining
// ============================================================================

/// Reader thread moving one output pipe into a shared buffer.
struct StreamDrain {
    /// Bytes read so far.
    buffer: Arc<Mutex<Vec<u8>>>,
    /// Reader thread, absent when the pipe was not captured.
    handle: Option<JoinHandle<()>>,
}

impl StreamDrain {
    /// Starts draining `source` on a named thread.
    fn spawn<R>(label: &str, source: Option<R>) -> Result<Self, InfrastructureError>
    where
        R: Read + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let Some(mut source) = source else {
            return Ok(Self {
                buffer,
                handle: None,
            });
        };
        let shared = Arc::clone(&buffer);
        let handle = thread::Builder::new()
            .name(format!("rowprobe-{label}"))
            .spawn(move || {
                let mut chunk = [0_u8; READ_CHUNK_BYTES];
                loop {
                    match source.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(read) => shared
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[.. read]),
                        Err(err) if err.kind() == ErrorKind::Interrupted => {}
                        Err(_) => break,
                    }
                }
            })
            .map_err(|err| {
                InfrastructureError::with_cause(format!("failed to start {label} reader"), err)
            })?;
        Ok(Self {
            buffer,
            handle: Some(handle),
        })
    }

    /// Waits for the reader until `deadline`, then returns what was captured.
    fn finish(self, deadline: Instant) -> String {
        if let Some(handle) = self.handle {
            join_until(handle, deadline);
        }
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Writes the command text plus a newline to the child's stdin, then closes it.
fn spawn_stdin_echo(stdin: Option<ChildStdin>, command: &str) -> Option<JoinHandle<()>> {
    let mut stdin = stdin?;
    let payload = format!("{command}\n");
    thread::Builder::new()
        .name("rowprobe-stdin".to_string())
        .spawn(move || {
            // A child that exits without reading closes the pipe first.
            if stdin.write_all(payload.as_bytes()).is_ok() {
                drop(stdin.flush());
            }
        })
        .ok()
}

/// Joins `handle` if it finishes before `deadline`; abandons it otherwise.
fn join_until(handle: JoinHandle<()>, deadline: Instant) {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return;
        }
        thread::sleep(DRAIN_POLL);
    }
    drop(handle.join());
}

/// Converts a duration to whole milliseconds, saturating.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
