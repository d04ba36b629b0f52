// crates/rowprobe-connectors/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for rowprobe-connectors tests.
// Purpose: Socket peers and reply parsing for stub tests.
// Dependencies: std::net
// ============================================================================

//! ## Overview
//! Provides a threaded socket peer that sends one framed message and collects
//! the stub's reply, plus a small reply parser.

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

use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use rowprobe_connectors::StubSettings;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Stub settings on an ephemeral loopback port with a generous accept wait.
pub fn patient_settings() -> StubSettings {
    StubSettings {
        accept_wait: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
        ..StubSettings::default()
    }
}

// ============================================================================
// SECTION: Peers
// ============================================================================

/// Frames `body` with a request line and `Content-Length` header.
pub fn framed(body: &str) -> Vec<u8> {
    format!("POST /endpoint HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}", body.len())
        .into_bytes()
}

/// Connects to `addr`, sends `raw`, and returns everything read back.
pub fn spawn_peer(addr: SocketAddr, raw: Vec<u8>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).expect("connect to stub");
        stream.set_read_timeout(Some(Duration::from_secs(10))).expect("read timeout");
        stream.write_all(&raw).expect("send message");
        let mut reply = Vec::new();
        let mut chunk = [0_u8; 1024];
        // A reset after the reply ends the read.
        while let Ok(read) = stream.read(&mut chunk) {
            if read == 0 {
                break;
            }
            reply.extend_from_slice(&chunk[.. read]);
        }
        String::from_utf8_lossy(&reply).into_owned()
    })
}

// ============================================================================
// SECTION: Reply Parsing
// ============================================================================

/// A parsed stub reply.
pub struct Reply {
    /// Status line.
    pub status_line: String,
    /// Header lines in order.
    pub headers: Vec<String>,
    /// Body text.
    pub body: String,
}

/// Splits a raw reply into status line, headers, and body.
pub fn parse_reply(raw: &str) -> Reply {
    let (head, body) = raw.split_once("\r\n\r\n").expect("blank line before body");
    let mut lines = head.split("\r\n");
    let status_line = lines.next().expect("status line").to_string();
    Reply {
        status_line,
        headers: lines.map(str::to_string).collect(),
        body: body.to_string(),
    }
}
