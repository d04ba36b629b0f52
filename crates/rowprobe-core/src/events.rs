// crates/rowprobe-core/src/events.rs
// ============================================================================
// Module: Rowprobe Connector Events
// Description: Observability events emitted by connectors.
// Purpose: Structured, dependency-light event records with pluggable sinks.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Connectors describe what they do (process spawned, connection accepted,
//! reply sent) as [`ConnectorEvent`] values and hand them to an
//! [`EventSink`]. [`JsonLineSink`] writes one JSON record per line to any
//! writer; [`MemorySink`] keeps records for inspection; [`NoopSink`] drops
//! them.
//! Invariants:
//! - Recording an event never changes a check outcome; sink write failures are
//!   counted, not propagated.
//! - Events carry sizes and codes, not captured output bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Event classification.
///
/// # Invariants
/// - Labels are stable for log consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    /// A command process was spawned.
    CommandStarted,
    /// A command exceeded its timeout and termination was requested.
    CommandTimeout,
    /// A command exit status was observed.
    CommandFinished,
    /// A stub began listening.
    StubListening,
    /// A stub accepted its connection.
    StubAccepted,
    /// A stub wrote its reply.
    StubReplied,
    /// A stub released its socket resources.
    StubClosed,
    /// A connector operation began.
    OperationStarted,
    /// A connector operation produced an outcome.
    OperationFinished,
}

impl EventKind {
    /// Returns a stable label for the event kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CommandStarted => "command.started",
            Self::CommandTimeout => "command.timeout",
            Self::CommandFinished => "command.finished",
            Self::StubListening => "stub.listening",
            Self::StubAccepted => "stub.accepted",
            Self::StubReplied => "stub.replied",
            Self::StubClosed => "stub.closed",
            Self::OperationStarted => "operation.started",
            Self::OperationFinished => "operation.finished",
        }
    }
}

/// One observability record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorEvent {
    /// Event classification.
    pub kind: EventKind,
    /// Event attributes.
    pub fields: BTreeMap<String, Value>,
}

impl ConnectorEvent {
    /// Creates an event with no attributes.
    #[must_use]
    pub const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Receives connector events.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &ConnectorEvent);
}

/// Shared handle to an event sink.
pub type SharedEventSink = Arc<dyn EventSink>;

// ============================================================================
// SECTION: Sink Implementations
// ============================================================================

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NoopSink {
    /// Returns a shared no-op sink.
    #[must_use]
    pub fn shared() -> SharedEventSink {
        Arc::new(Self)
    }
}

impl EventSink for NoopSink {
    fn record(&self, _event: &ConnectorEvent) {}
}

/// Sink that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<ConnectorEvent>>,
}

impl MemorySink {
    /// Creates an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ConnectorEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the kinds of the recorded events in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|event| event.kind).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &ConnectorEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

/// Sink writing one JSON object per line.
///
/// # Invariants
/// - Each record holds `ts` (RFC 3339 UTC), `event`, then the event fields.
/// - Write failures increment [`JsonLineSink::write_failures`].
pub struct JsonLineSink<W: Write + Send> {
    /// Destination writer.
    writer: Mutex<W>,
    /// Count of records that could not be written.
    failures: AtomicU64,
}

impl<W: Write + Send> JsonLineSink<W> {
    /// Creates a sink writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            failures: AtomicU64::new(0),
        }
    }

    /// Returns the number of records that failed to write.
    pub fn write_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Renders and writes one record.
    fn try_record(&self, event: &ConnectorEvent) -> std::io::Result<()> {
        let mut record = Map::new();
        let ts = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        record.insert("ts".to_string(), Value::String(ts));
        record.insert("event".to_string(), Value::String(event.kind.as_str().to_string()));
        for (key, value) in &event.fields {
            record.insert(key.clone(), value.clone());
        }
        let mut line = serde_json::to_vec(&Value::Object(record)).map_err(std::io::Error::other)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.flush()
    }
}

impl<W: Write + Send> EventSink for JsonLineSink<W> {
    fn record(&self, event: &ConnectorEvent) {
        if self.try_record(event).is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::io;

    use super::*;

    /// Writer that always fails.
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("simulated write failure"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Records are single JSON lines carrying the event label and fields.
    #[test]
    fn json_line_sink_writes_one_record_per_line() {
        let sink = JsonLineSink::new(Vec::new());
        sink.record(&ConnectorEvent::new(EventKind::CommandFinished).with("exit_code", 3));
        sink.record(&ConnectorEvent::new(EventKind::StubClosed));

        let bytes = sink.writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "command.finished");
        assert_eq!(first["exit_code"], 3);
        assert!(first["ts"].as_str().is_some_and(|ts| !ts.is_empty()));
    }

    /// Write failures are counted instead of propagated.
    #[test]
    fn json_line_sink_counts_write_failures() {
        let sink = JsonLineSink::new(FailingWriter);
        sink.record(&ConnectorEvent::new(EventKind::StubListening));
        assert_eq!(sink.write_failures(), 1);
    }

    /// Memory sink keeps arrival order.
    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.record(&ConnectorEvent::new(EventKind::OperationStarted));
        sink.record(&ConnectorEvent::new(EventKind::OperationFinished));
        assert_eq!(sink.kinds(), vec![EventKind::OperationStarted, EventKind::OperationFinished]);
    }
}
