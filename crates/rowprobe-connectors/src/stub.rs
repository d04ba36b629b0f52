// crates/rowprobe-connectors/src/stub.rs
// ============================================================================
// Module: Acceptor Stub
// Description: Single-connection endpoint emulator with payload validation.
// Purpose: Accept one inbound message, compare it, reply, and close.
// Dependencies: rowprobe-core, std::net
// ============================================================================

//! ## Overview
//! An [`AcceptorStub`] stands in for a remote endpoint. [`AcceptorStub::start`]
//! binds synchronously and hands the accept step to a background thread;
//! [`AcceptorStub::validate`] waits a bounded time for that thread's single
//! hand-off, reads one `Content-Length` framed message, compares it with the
//! expected pattern after removing whitespace from both, writes a reply, and
//! closes the connection.
//! Invariants:
//! - Exactly one connection is handled per `start`/`validate` pair.
//! - The accepted connection is closed before `validate` returns, on every path.
//! - The background thread only accepts and hands off; it never validates.
//! - All state is owned by the instance; `close` is idempotent and `Drop`
//!   performs the same release.
//!
//! Security posture: inbound bytes are untrusted; headers and body are capped
//! at [`StubSettings::max_message_bytes`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::net::Shutdown;
use std::net::SocketAddr;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::sync::mpsc::sync_channel;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use rowprobe_core::AssertionFailure;
use rowprobe_core::CheckResult;
use rowprobe_core::ConnectorEvent;
use rowprobe_core::EventKind;
use rowprobe_core::InfrastructureError;
use rowprobe_core::LinePattern;
use rowprobe_core::NoopSink;
use rowprobe_core::SharedEventSink;
use rowprobe_core::normalize_whitespace;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default wait for an inbound connection during `validate`.
pub const DEFAULT_ACCEPT_WAIT: Duration = Duration::from_millis(500);
/// Default read timeout on the accepted connection.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Default cap on header plus body bytes.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;
/// Default reply content type.
pub const DEFAULT_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
/// Default reply body sent after a mismatch or malformed message.
pub const DEFAULT_FAILURE_BODY: &str = "<response><status>rejected</status></response>";
/// Interval at which the listener thread checks for a connection or cancellation.
const ACCEPT_POLL: Duration = Duration::from_millis(10);
/// Header carrying the body length.
const CONTENT_LENGTH_HEADER: &str = "Content-Length:";

// ============================================================================
// SECTION: Settings And State
// ============================================================================

/// Stub settings fixed for the lifetime of one instance.
///
/// # Invariants
/// - `max_message_bytes` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubSettings {
    /// Host or address to bind.
    pub host: String,
    /// Bounded wait for the inbound connection.
    pub accept_wait: Duration,
    /// Read timeout applied to the accepted connection.
    pub read_timeout: Duration,
    /// Cap on header plus body bytes.
    pub max_message_bytes: usize,
    /// Reply `Content-Type` value.
    pub content_type: String,
    /// Reply body sent with a client-error reply.
    pub failure_body: String,
}

impl Default for StubSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            accept_wait: DEFAULT_ACCEPT_WAIT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            failure_body: DEFAULT_FAILURE_BODY.to_string(),
        }
    }
}

/// Lifecycle state of an [`AcceptorStub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubState {
    /// Created, not yet bound.
    Idle,
    /// Bound; the background thread is accepting.
    Listening,
    /// A connection was handed off and is being served.
    Connected,
    /// `validate` finished and the connection is closed.
    Consumed,
    /// Released through `close`.
    Closed,
    /// Bind or accept failed.
    Failed,
}

impl StubState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Connected => "connected",
            Self::Consumed => "consumed",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Returns true for states no operation can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for StubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Reply status line selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// `200 OK`.
    Ok,
    /// `400 Bad Request`.
    BadRequest,
}

impl ReplyStatus {
    /// Returns the numeric status code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
        }
    }

    /// Returns the status line without its terminator.
    #[must_use]
    pub const fn status_line(self) -> &'static str {
        match self {
            Self::Ok => "HTTP/1.1 200 OK",
            Self::BadRequest => "HTTP/1.1 400 Bad Request",
        }
    }
}

/// Renders a complete reply: status line, three headers, blank line, body.
#[must_use]
pub fn render_reply(status: ReplyStatus, content_type: &str, body: &str) -> String {
    format!(
        "{}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        status.status_line(),
        body.len()
    )
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// The accepted socket, owned by one stub for one `validate` call.
///
/// # Invariants
/// - After [`StubConnection::close`] the socket is shut down and dropped.
#[derive(Debug)]
pub struct StubConnection {
    /// Accepted stream, `None` once closed.
    stream: Option<TcpStream>,
    /// Remote address, when the platform reports it.
    peer: Option<SocketAddr>,
}

impl StubConnection {
    /// Wraps an accepted stream.
    fn new(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            stream: Some(stream),
            peer,
        }
    }

    /// Returns the remote address.
    #[must_use]
    pub const fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns true until the connection is closed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Shuts down and drops the socket. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream.shutdown(Shutdown::Both));
        }
    }

    /// Returns the open stream.
    fn stream(&self) -> Result<&TcpStream, InfrastructureError> {
        self.stream.as_ref().ok_or_else(|| InfrastructureError::new("stub connection is closed"))
    }
}

impl Drop for StubConnection {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// SECTION: Listener Task
// ============================================================================

/// Result handed from the listener thread to `validate`.
type Handoff = io::Result<TcpStream>;

/// Background accept thread plus its cancellation flag and hand-off slot.
struct ListenerTask {
    /// Accept thread, `None` once joined.
    handle: Option<JoinHandle<()>>,
    /// Set to stop the accept loop.
    cancel: Arc<AtomicBool>,
    /// Single-slot hand-off from the accept thread.
    receiver: Receiver<Handoff>,
}

impl ListenerTask {
    /// Starts accepting on `listener` in the background.
    fn spawn(listener: TcpListener) -> io::Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = sync_channel(1);
        let flag = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("rowprobe-stub-accept".to_string())
            .spawn(move || accept_one(&listener, &flag, &sender))?;
        Ok(Self {
            handle: Some(handle),
            cancel,
            receiver,
        })
    }

    /// Cancels the accept loop and joins the thread, releasing the listener.
    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            drop(handle.join());
        }
    }
}

impl Drop for ListenerTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Accepts one connection unless cancelled; the listener drops on return.
fn accept_one(listener: &TcpListener, cancel: &AtomicBool, sender: &SyncSender<Handoff>) {
    while !cancel.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                drop(sender.send(Ok(stream)));
                return;
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                drop(sender.send(Err(err)));
                return;
            }
        }
    }
}

// ============================================================================
// SECTION: Acceptor Stub
// ============================================================================

/// One-shot endpoint emulator.
///
/// # Invariants
/// - `start` is accepted only from [`StubState::Idle`].
/// - `validate` is accepted only from [`StubState::Listening`].
pub struct AcceptorStub {
    /// Instance settings.
    settings: StubSettings,
    /// Destination for lifecycle events.
    sink: SharedEventSink,
    /// Current lifecycle state.
    state: StubState,
    /// Bound address once listening.
    local_addr: Option<SocketAddr>,
    /// Background accept thread while listening.
    task: Option<ListenerTask>,
}

impl AcceptorStub {
    /// Creates an idle stub that discards events.
    #[must_use]
    pub fn new(settings: StubSettings) -> Self {
        Self::with_sink(settings, NoopSink::shared())
    }

    /// Creates an idle stub reporting lifecycle events to `sink`.
    #[must_use]
    pub fn with_sink(settings: StubSettings, sink: SharedEventSink) -> Self {
        Self {
            settings,
            sink,
            state: StubState::Idle,
            local_addr: None,
            task: None,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> StubState {
        self.state
    }

    /// Returns the bound address once listening.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the instance settings.
    #[must_use]
    pub const fn settings(&self) -> &StubSettings {
        &self.settings
    }

    /// Binds `port` on the configured host and starts accepting in the background.
    ///
    /// Port `0` binds an ephemeral port; see [`AcceptorStub::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the stub is not idle or the bind
    /// fails; a failed bind moves the stub to [`StubState::Failed`].
    pub fn start(&mut self, port: u16) -> Result<SocketAddr, InfrastructureError> {
        if self.state != StubState::Idle {
            return Err(InfrastructureError::new(format!(
                "stub cannot start from state '{}'",
                self.state
            )));
        }
        match self.bind(port) {
            Ok((addr, task)) => {
                self.local_addr = Some(addr);
                self.task = Some(task);
                self.state = StubState::Listening;
                self.sink.record(
                    &ConnectorEvent::new(EventKind::StubListening)
                        .with("addr", addr.to_string()),
                );
                Ok(addr)
            }
            Err(err) => {
                self.state = StubState::Failed;
                Err(err)
            }
        }
    }

    /// Binds and spawns the accept thread.
    fn bind(&self, port: u16) -> Result<(SocketAddr, ListenerTask), InfrastructureError> {
        let host = self.settings.host.as_str();
        let bind_error = |err: io::Error| {
            InfrastructureError::with_cause(format!("failed to bind stub on {host}:{port}"), err)
        };
        let listener = TcpListener::bind((host, port)).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;
        let task = ListenerTask::spawn(listener).map_err(|err| {
            InfrastructureError::with_cause("failed to start stub accept thread", err)
        })?;
        Ok((addr, task))
    }

    /// Waits for the inbound message, compares it with `expected`, and replies.
    ///
    /// Whitespace is removed from both the pattern and the payload before the
    /// full-match comparison. A match is answered with `success_body`; a
    /// mismatch with the configured failure body. The pattern is compiled
    /// before any connection is taken, so an invalid pattern fails without
    /// waiting. Because literal spaces are stripped from the pattern text too,
    /// write `\s` or `\x20` rather than a space inside a character class or
    /// after a backslash: `[^ ]` would become `[^]` and `a\ b` would become
    /// the word boundary `a\b`.
    ///
    /// # Errors
    ///
    /// Returns an assertion failure when no connection arrives within the
    /// accept wait or the payload does not match, and an infrastructure error
    /// when the stub is not listening, the accept fails, the message is
    /// malformed, or the expected pattern is invalid.
    pub fn validate(&mut self, expected: &str, success_body: &str) -> CheckResult {
        if self.state != StubState::Listening {
            return Err(InfrastructureError::new(format!(
                "stub cannot validate from state '{}'",
                self.state
            ))
            .into());
        }
        let Some(mut task) = self.task.take() else {
            self.state = StubState::Failed;
            return Err(InfrastructureError::new("stub listener is missing").into());
        };
        let pattern = match LinePattern::compile(&normalize_whitespace(expected)) {
            Ok(pattern) => pattern,
            Err(err) => {
                task.shutdown();
                self.state = StubState::Consumed;
                return Err(err.into());
            }
        };
        let received = task.receiver.recv_timeout(self.settings.accept_wait);
        task.shutdown();
        let stream = match received {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                self.state = StubState::Failed;
                return Err(
                    InfrastructureError::with_cause("failed to accept stub connection", err).into()
                );
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                self.state = StubState::Consumed;
                return Err(AssertionFailure::new("no message received").into());
            }
        };

        self.state = StubState::Connected;
        let mut connection = StubConnection::new(stream);
        self.sink.record(
            &ConnectorEvent::new(EventKind::StubAccepted).with(
                "peer",
                connection.peer_addr().map(|peer| peer.to_string()).unwrap_or_default(),
            ),
        );
        let verdict = self.serve(&connection, &pattern, expected, success_body);
        connection.close();
        self.state = StubState::Consumed;
        verdict
    }

    /// Reads, compares, and replies on an accepted connection.
    fn serve(
        &self,
        connection: &StubConnection,
        pattern: &LinePattern,
        expected: &str,
        success_body: &str,
    ) -> CheckResult {
        let stream = connection.stream()?;
        let prepared = prepare_stream(stream, self.settings.read_timeout)
            .and_then(|()| read_envelope(stream, self.settings.max_message_bytes));
        let payload = match prepared {
            Ok(payload) => payload,
            Err(err) => {
                drop(self.reply(stream, ReplyStatus::BadRequest, &self.settings.failure_body));
                return Err(err.into());
            }
        };
        if pattern.matches(&normalize_whitespace(&payload)) {
            self.reply(stream, ReplyStatus::Ok, success_body)?;
            return Ok(());
        }
        // The assertion outcome stands even if the peer is already gone.
        drop(self.reply(stream, ReplyStatus::BadRequest, &self.settings.failure_body));
        Err(AssertionFailure::mismatch("payload", expected, &payload).into())
    }

    /// Writes one reply and records it.
    fn reply(
        &self,
        mut stream: &TcpStream,
        status: ReplyStatus,
        body: &str,
    ) -> Result<(), InfrastructureError> {
        let reply = render_reply(status, &self.settings.content_type, body);
        stream
            .write_all(reply.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|err| InfrastructureError::with_cause("failed to send stub reply", err))?;
        self.sink.record(
            &ConnectorEvent::new(EventKind::StubReplied)
                .with("status", status.code())
                .with("body_bytes", body.len()),
        );
        Ok(())
    }

    /// Releases the listener and any pending connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.shutdown();
        }
        match self.state {
            StubState::Closed | StubState::Failed => {}
            StubState::Idle => self.state = StubState::Closed,
            StubState::Listening | StubState::Connected | StubState::Consumed => {
                self.state = StubState::Closed;
                self.sink.record(&ConnectorEvent::new(EventKind::StubClosed));
            }
        }
    }
}

impl Drop for AcceptorStub {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// SECTION: Envelope Parsing
// ============================================================================

/// Restores blocking mode and applies the read timeout.
fn prepare_stream(stream: &TcpStream, read_timeout: Duration) -> Result<(), InfrastructureError> {
    let configure = |err: io::Error| {
        InfrastructureError::with_cause("failed to configure stub connection", err)
    };
    // Accepted sockets inherit non-blocking mode from the listener on some platforms.
    stream.set_nonblocking(false).map_err(configure)?;
    stream.set_read_timeout(Some(read_timeout).filter(|timeout| !timeout.is_zero())).map_err(configure)
}

/// Reads header lines up to the blank line, then exactly `Content-Length` body bytes.
///
/// # Errors
///
/// Returns [`InfrastructureError`] for a missing or non-numeric length, a
/// message over `limit` bytes, a truncated message, or a read timeout.
pub fn read_envelope<R: Read>(source: R, limit: usize) -> Result<String, InfrastructureError> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX);
    let mut reader = BufReader::new(source.take(cap));
    let mut content_length: Option<usize> = None;
    let mut line = Vec::new();
    loop {
        line.clear();
        reader.read_until(b'\n', &mut line).map_err(read_error)?;
        if !line.ends_with(b"\n") {
            return Err(InfrastructureError::new(
                "malformed message: headers truncated or over the size limit",
            ));
        }
        let text = String::from_utf8_lossy(&line);
        let header = text.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some(value) = header.strip_prefix(CONTENT_LENGTH_HEADER) {
            let parsed = value.trim().parse::<usize>().map_err(|err| {
                InfrastructureError::with_cause(
                    format!("malformed message: invalid Content-Length `{}`", value.trim()),
                    err,
                )
            })?;
            content_length = Some(parsed);
        }
    }
    let length = content_length
        .ok_or_else(|| InfrastructureError::new("malformed message: missing Content-Length"))?;
    if length > limit {
        return Err(InfrastructureError::new(format!(
            "malformed message: Content-Length {length} exceeds limit {limit}"
        )));
    }
    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body).map_err(read_error)?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Classifies a read error on the inbound message.
fn read_error(err: io::Error) -> InfrastructureError {
    let message = match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => "malformed message: read timed out",
        ErrorKind::UnexpectedEof => "malformed message: body truncated or over the size limit",
        _ => "failed to read stub message",
    };
    InfrastructureError::with_cause(message, err)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
