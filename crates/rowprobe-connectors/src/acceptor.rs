// crates/rowprobe-connectors/src/acceptor.rs
// ============================================================================
// Module: Stub Connector
// Description: Connector driving an acceptor stub through start/validate rows.
// Purpose: Expose the one-shot endpoint emulator through the connector contract.
// Dependencies: rowprobe-core, crate::stub
// ============================================================================

//! ## Overview
//! [`StubConnector`] maps `start` onto a fresh [`AcceptorStub`] and `validate`
//! onto [`AcceptorStub::validate`]. Each `start` replaces (and closes) the
//! previous stub so one connector can serve many rows in sequence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::time::Duration;

use rowprobe_core::CheckResult;
use rowprobe_core::Connector;
use rowprobe_core::ConnectorConfig;
use rowprobe_core::InfrastructureError;
use rowprobe_core::NoopSink;
use rowprobe_core::Row;
use rowprobe_core::SharedEventSink;
use rowprobe_core::interfaces::unknown_operation;

use crate::stub::AcceptorStub;
use crate::stub::StubSettings;
use crate::stub::StubState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connector kind label.
pub const STUB_KIND: &str = "stub";
/// Operation binding a fresh stub.
pub const START_OPERATION: &str = "start";
/// Operation awaiting and checking the inbound message.
pub const VALIDATE_OPERATION: &str = "validate";
/// Default success reply body.
pub const DEFAULT_SUCCESS_BODY: &str = "<response><status>ok</status></response>";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Parsed stub connector configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubConnectorSettings {
    /// Port used when a `start` row does not name one.
    pub port: Option<u16>,
    /// Settings for each stub instance.
    pub stub: StubSettings,
    /// Reply body used when a `validate` row does not name one.
    pub success_body: String,
}

impl Default for StubConnectorSettings {
    fn default() -> Self {
        Self {
            port: None,
            stub: StubSettings::default(),
            success_body: DEFAULT_SUCCESS_BODY.to_string(),
        }
    }
}

impl StubConnectorSettings {
    /// Parses settings from connector configuration.
    ///
    /// Recognized keys: `port`, `host`, `accept_wait_ms`, `read_timeout_ms`,
    /// `max_message_bytes`, `content_type`, `success_body`, `failure_body`.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when a value does not parse, the host
    /// is blank, or the message limit is zero.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, InfrastructureError> {
        let defaults = StubSettings::default();
        let host = config.get("host").map_or(defaults.host, str::to_string);
        if host.trim().is_empty() {
            return Err(InfrastructureError::new("config key 'host' must not be blank"));
        }
        let max_message_bytes = config.parse_or("max_message_bytes", defaults.max_message_bytes)?;
        if max_message_bytes == 0 {
            return Err(InfrastructureError::new("config key 'max_message_bytes' must be non-zero"));
        }
        let stub = StubSettings {
            host,
            accept_wait: millis_or(config, "accept_wait_ms", defaults.accept_wait)?,
            read_timeout: millis_or(config, "read_timeout_ms", defaults.read_timeout)?,
            max_message_bytes,
            content_type: config.get("content_type").map_or(defaults.content_type, str::to_string),
            failure_body: config.get("failure_body").map_or(defaults.failure_body, str::to_string),
        };
        Ok(Self {
            port: config.parse("port")?,
            stub,
            success_body: config
                .get("success_body")
                .map_or_else(|| DEFAULT_SUCCESS_BODY.to_string(), str::to_string),
        })
    }
}

/// Reads a millisecond duration, falling back to `default`.
fn millis_or(
    config: &ConnectorConfig,
    key: &str,
    default: Duration,
) -> Result<Duration, InfrastructureError> {
    Ok(config.parse::<u64>(key)?.map_or(default, Duration::from_millis))
}

// ============================================================================
// SECTION: Stub Connector
// ============================================================================

/// Connector emulating a remote endpoint for one message per `start`.
pub struct StubConnector {
    /// Destination for lifecycle events.
    sink: SharedEventSink,
    /// Settings, present after setup.
    settings: Option<StubConnectorSettings>,
    /// Stub started by the latest `start` row.
    stub: Option<AcceptorStub>,
}

impl StubConnector {
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
            settings: None,
            stub: None,
        }
    }

    /// Returns the address of the current stub, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stub.as_ref().and_then(AcceptorStub::local_addr)
    }

    /// Returns the state of the current stub.
    #[must_use]
    pub fn stub_state(&self) -> Option<StubState> {
        self.stub.as_ref().map(AcceptorStub::state)
    }

    /// Closes the previous stub and starts a new one.
    fn start(&mut self, row: &Row) -> CheckResult {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| InfrastructureError::new("stub connector is not set up"))?;
        let port = match row.optional_single("port")? {
            Some(raw) => raw.trim().parse::<u16>().map_err(|err| {
                InfrastructureError::new(format!("row field 'port' is invalid: {err}"))
            })?,
            None => settings.port.ok_or_else(|| {
                InfrastructureError::new("stub port is required in config or row field 'port'")
            })?,
        };
        if let Some(mut previous) = self.stub.take() {
            previous.close();
        }
        let mut stub = AcceptorStub::with_sink(settings.stub.clone(), self.sink.clone());
        stub.start(port)?;
        self.stub = Some(stub);
        Ok(())
    }

    /// Validates the inbound message against the row's `expected` pattern.
    fn validate(&mut self, row: &Row) -> CheckResult {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| InfrastructureError::new("stub connector is not set up"))?;
        let stub = self
            .stub
            .as_mut()
            .ok_or_else(|| InfrastructureError::new("validate requires a prior start"))?;
        let expected = row.single("expected")?;
        let body = row.optional_single("response")?.unwrap_or(settings.success_body.as_str());
        stub.validate(expected, body)
    }
}

impl Default for StubConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for StubConnector {
    fn kind(&self) -> &'static str {
        STUB_KIND
    }

    fn setup(&mut self, config: &ConnectorConfig) -> Result<(), InfrastructureError> {
        self.settings = Some(StubConnectorSettings::from_config(config)?);
        Ok(())
    }

    fn execute(&mut self, operation: &str, row: &Row) -> CheckResult {
        match operation {
            START_OPERATION => self.start(row),
            VALIDATE_OPERATION => self.validate(row),
            other => Err(unknown_operation(STUB_KIND, other).into()),
        }
    }

    fn tear_down(&mut self) -> Result<(), InfrastructureError> {
        if let Some(mut stub) = self.stub.take() {
            stub.close();
        }
        Ok(())
    }
}
