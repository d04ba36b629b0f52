// crates/rowprobe-core/src/interfaces.rs
// ============================================================================
// Module: Rowprobe Connector Contract
// Description: Setup/execute/tear-down interface driven by the harness.
// Purpose: Let the harness drive every connector the same way.
// Dependencies: crate::{config, errors, row}
// ============================================================================

//! ## Overview
//! A [`Connector`] adapts one external collaborator (a shell, a socket peer)
//! into three calls. The harness calls [`Connector::setup`] once, then
//! [`Connector::execute`] per data row, then [`Connector::tear_down`].
//! Invariants:
//! - Failures are returned as values; connectors never panic to signal them.
//! - An operation name the connector does not know is an infrastructure error.
//! - `tear_down` is safe to call repeatedly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::config::ConnectorConfig;
use crate::errors::CheckResult;
use crate::errors::InfrastructureError;
use crate::row::Row;

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Uniform contract between the harness and one connector instance.
pub trait Connector: Send {
    /// Returns the connector kind label (for example `command`).
    fn kind(&self) -> &'static str;

    /// Applies configuration before any operation runs.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the configuration is invalid.
    fn setup(&mut self, config: &ConnectorConfig) -> Result<(), InfrastructureError>;

    /// Runs one named operation against a data row.
    ///
    /// # Errors
    ///
    /// Returns an assertion failure when the check ran and disagreed, and an
    /// infrastructure error when it could not run.
    fn execute(&mut self, operation: &str, row: &Row) -> CheckResult;

    /// Releases every resource the connector holds.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when release fails.
    fn tear_down(&mut self) -> Result<(), InfrastructureError>;
}

/// Builds the error returned for an operation a connector does not support.
#[must_use]
pub fn unknown_operation(kind: &str, operation: &str) -> InfrastructureError {
    InfrastructureError::new(format!("{kind} connector has no operation '{operation}'"))
}
