// crates/rowprobe-connectors/src/registry.rs
// ============================================================================
// Module: Connector Registry
// Description: Named connector instances driven through the shared contract.
// Purpose: Route harness calls by connector name and report outcomes as data.
// Dependencies: rowprobe-core
// ============================================================================

//! ## Overview
//! The registry owns connector instances keyed by name and drives them
//! through [`Connector`]. [`ConnectorRegistry::execute`] always returns an
//! [`Outcome`], so the harness never has to unwind to learn about a failure.
//! Invariants:
//! - Connector names are unique within the registry.
//! - An unknown connector name is an infrastructure error.
//! - `tear_down_all` visits every connector even when one fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use rowprobe_core::CheckFailure;
use rowprobe_core::Connector;
use rowprobe_core::ConnectorConfig;
use rowprobe_core::ConnectorEvent;
use rowprobe_core::EventKind;
use rowprobe_core::InfrastructureError;
use rowprobe_core::NoopSink;
use rowprobe_core::Outcome;
use rowprobe_core::Row;
use rowprobe_core::SharedEventSink;

use crate::acceptor::STUB_KIND;
use crate::acceptor::StubConnector;
use crate::command::COMMAND_KIND;
use crate::command::CommandConnector;

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Connector kinds this crate can build.
pub const BUILTIN_KINDS: &[&str] = &[COMMAND_KIND, STUB_KIND];

/// Builds a fresh connector of the given kind.
///
/// # Errors
///
/// Returns [`InfrastructureError`] when the kind is not built in.
pub fn connector_for_kind(
    kind: &str,
    sink: SharedEventSink,
) -> Result<Box<dyn Connector>, InfrastructureError> {
    match kind {
        COMMAND_KIND => Ok(Box::new(CommandConnector::with_sink(sink))),
        STUB_KIND => Ok(Box::new(StubConnector::with_sink(sink))),
        other => Err(InfrastructureError::new(format!(
            "unknown connector kind '{other}' (expected one of: {})",
            BUILTIN_KINDS.join(", ")
        ))),
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Connector instances keyed by name.
///
/// # Invariants
/// - Names are unique; registration never replaces an existing connector.
pub struct ConnectorRegistry {
    /// Connectors keyed by name.
    connectors: BTreeMap<String, Box<dyn Connector>>,
    /// Destination for operation events.
    sink: SharedEventSink,
}

impl ConnectorRegistry {
    /// Creates an empty registry reporting to `sink`.
    #[must_use]
    pub fn new(sink: SharedEventSink) -> Self {
        Self {
            connectors: BTreeMap::new(),
            sink,
        }
    }

    /// Creates a registry with one connector of each built-in kind, named by kind.
    #[must_use]
    pub fn with_builtins(sink: SharedEventSink) -> Self {
        let mut connectors: BTreeMap<String, Box<dyn Connector>> = BTreeMap::new();
        connectors.insert(
            COMMAND_KIND.to_string(),
            Box::new(CommandConnector::with_sink(sink.clone())),
        );
        connectors.insert(STUB_KIND.to_string(), Box::new(StubConnector::with_sink(sink.clone())));
        Self {
            connectors,
            sink,
        }
    }

    /// Registers a connector under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the name is already registered.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        connector: Box<dyn Connector>,
    ) -> Result<(), InfrastructureError> {
        let name = name.into();
        if self.connectors.contains_key(&name) {
            return Err(InfrastructureError::new(format!(
                "connector already registered: {name}"
            )));
        }
        self.connectors.insert(name, connector);
        Ok(())
    }

    /// Returns true when a connector is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.connectors.contains_key(name)
    }

    /// Iterates registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }

    /// Returns the kind of the connector registered under `name`.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<&'static str> {
        self.connectors.get(name).map(|connector| connector.kind())
    }

    /// Applies configuration to one connector.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the name is unknown or the
    /// connector rejects the configuration.
    pub fn setup(&mut self, name: &str, config: &ConnectorConfig) -> Result<(), InfrastructureError> {
        self.connector_mut(name)?.setup(config)
    }

    /// Runs one operation and reports its outcome.
    pub fn execute(&mut self, name: &str, operation: &str, row: &Row) -> Outcome {
        self.sink.record(
            &ConnectorEvent::new(EventKind::OperationStarted)
                .with("connector", name)
                .with("operation", operation),
        );
        let result = self
            .connector_mut(name)
            .map_err(CheckFailure::from)
            .and_then(|connector| connector.execute(operation, row));
        let outcome = Outcome::from_result(result);
        self.sink.record(
            &ConnectorEvent::new(EventKind::OperationFinished)
                .with("connector", name)
                .with("operation", operation)
                .with("status", outcome.label()),
        );
        outcome
    }

    /// Tears down every connector, returning the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`InfrastructureError`] raised by any connector.
    pub fn tear_down_all(&mut self) -> Result<(), InfrastructureError> {
        let mut first_error = None;
        for (name, connector) in &mut self.connectors {
            if let Err(err) = connector.tear_down()
                && first_error.is_none()
            {
                first_error = Some(InfrastructureError::with_cause(
                    format!("failed to tear down connector '{name}'"),
                    err,
                ));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Returns the connector registered under `name`.
    fn connector_mut(&mut self, name: &str) -> Result<&mut Box<dyn Connector>, InfrastructureError> {
        self.connectors
            .get_mut(name)
            .ok_or_else(|| InfrastructureError::new(format!("unknown connector '{name}'")))
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::with_builtins(NoopSink::shared())
    }
}
