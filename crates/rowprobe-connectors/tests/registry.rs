// crates/rowprobe-connectors/tests/registry.rs
// ============================================================================
// Module: Connector Registry Tests
// Description: Name routing, outcomes, and tear-down across connectors.
// Purpose: Ensure the harness-facing surface reports outcomes as data.
// Dependencies: rowprobe-connectors, rowprobe-core
// ============================================================================

//! ## Overview
//! Exercises [`ConnectorRegistry`] with built-in and test connectors.

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

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use rowprobe_connectors::ConnectorRegistry;
use rowprobe_connectors::connector_for_kind;
use rowprobe_core::AssertionFailure;
use rowprobe_core::CheckResult;
use rowprobe_core::Connector;
use rowprobe_core::ConnectorConfig;
use rowprobe_core::EventKind;
use rowprobe_core::InfrastructureError;
use rowprobe_core::MemorySink;
use rowprobe_core::NoopSink;
use rowprobe_core::Outcome;
use rowprobe_core::Row;

// ============================================================================
// SECTION: Test Connector
// ============================================================================

/// Connector with scripted outcomes that counts tear-downs.
struct ScriptedConnector {
    /// Shared tear-down counter.
    tear_downs: Arc<AtomicUsize>,
    /// Whether tear-down fails.
    fail_tear_down: bool,
}

impl Connector for ScriptedConnector {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn setup(&mut self, _config: &ConnectorConfig) -> Result<(), InfrastructureError> {
        Ok(())
    }

    fn execute(&mut self, operation: &str, _row: &Row) -> CheckResult {
        match operation {
            "pass" => Ok(()),
            "fail" => Err(AssertionFailure::new("scripted mismatch").into()),
            _ => Err(InfrastructureError::new("scripted breakage").into()),
        }
    }

    fn tear_down(&mut self) -> Result<(), InfrastructureError> {
        self.tear_downs.fetch_add(1, Ordering::SeqCst);
        if self.fail_tear_down {
            return Err(InfrastructureError::new("scripted tear-down failure"));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Routing
// ============================================================================

/// Built-ins are registered under their kind names.
#[test]
fn builtins_are_registered_by_kind() {
    let registry = ConnectorRegistry::with_builtins(NoopSink::shared());
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["command", "stub"]);
    assert_eq!(registry.kind_of("stub"), Some("stub"));
}

/// Outcomes map onto the three tiers.
#[test]
fn outcomes_follow_connector_results() {
    let mut registry = ConnectorRegistry::new(NoopSink::shared());
    registry
        .register(
            "scripted",
            Box::new(ScriptedConnector {
                tear_downs: Arc::new(AtomicUsize::new(0)),
                fail_tear_down: false,
            }),
        )
        .unwrap();
    let row = Row::default();
    assert_eq!(registry.execute("scripted", "pass", &row), Outcome::Success);
    assert!(registry.execute("scripted", "fail", &row).is_failure());
    assert!(registry.execute("scripted", "other", &row).is_error());
}

/// Unknown names are errors for both setup and execute.
#[test]
fn unknown_connector_is_error() {
    let mut registry = ConnectorRegistry::with_builtins(NoopSink::shared());
    let outcome = registry.execute("ldap", "bind", &Row::default());
    assert!(outcome.is_error());
    assert!(outcome.message().unwrap().contains("ldap"));
    assert!(registry.setup("ldap", &ConnectorConfig::new()).is_err());
}

/// Duplicate registration is rejected.
#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = ConnectorRegistry::with_builtins(NoopSink::shared());
    let error = registry
        .register("command", connector_for_kind("command", NoopSink::shared()).unwrap())
        .unwrap_err();
    assert!(error.message().contains("already registered"));
}

/// The kind factory rejects unknown kinds.
#[test]
fn factory_rejects_unknown_kind() {
    let error = connector_for_kind("jdbc", NoopSink::shared()).err().unwrap();
    assert!(error.message().contains("jdbc"));
    assert_eq!(connector_for_kind("stub", NoopSink::shared()).unwrap().kind(), "stub");
}

/// Operations are bracketed by events carrying the outcome label.
#[test]
fn execute_records_operation_events() {
    let sink = Arc::new(MemorySink::new());
    let mut registry = ConnectorRegistry::new(sink.clone());
    registry
        .register(
            "scripted",
            Box::new(ScriptedConnector {
                tear_downs: Arc::new(AtomicUsize::new(0)),
                fail_tear_down: false,
            }),
        )
        .unwrap();
    registry.execute("scripted", "fail", &Row::default());
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::OperationStarted);
    assert_eq!(events[1].kind, EventKind::OperationFinished);
    assert_eq!(events[1].field("status").and_then(|value| value.as_str()), Some("failure"));
}

// ============================================================================
// SECTION: Tear-Down
// ============================================================================

/// Every connector is torn down even when one fails.
#[test]
fn tear_down_all_visits_every_connector() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ConnectorRegistry::new(NoopSink::shared());
    registry
        .register(
            "broken",
            Box::new(ScriptedConnector {
                tear_downs: Arc::clone(&counter),
                fail_tear_down: true,
            }),
        )
        .unwrap();
    registry
        .register(
            "healthy",
            Box::new(ScriptedConnector {
                tear_downs: Arc::clone(&counter),
                fail_tear_down: false,
            }),
        )
        .unwrap();
    let error = registry.tear_down_all().unwrap_err();
    assert!(error.message().contains("broken"));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
