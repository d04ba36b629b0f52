// crates/rowprobe-connectors/src/lib.rs
// ============================================================================
// Module: Rowprobe Connectors Library
// Description: Built-in connectors with their own bounded I/O and verdicts.
// Purpose: Process execution, endpoint emulation, and connector routing.
// Dependencies: rowprobe-core
// ============================================================================

//! ## Overview
//! This crate provides the two engines that talk to the outside world under
//! strict resource bounds, [`CommandRunner`] and [`AcceptorStub`], the
//! connectors that expose them through [`rowprobe_core::Connector`], and the
//! [`ConnectorRegistry`] that routes harness calls by connector name.
//! Invariants:
//! - Sockets and process handles are released on every return path.
//! - No engine retries; every wait is bounded.
//!
//! Security posture: inbound socket bytes and command output are untrusted and
//! size- or time-bounded.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod acceptor;
pub mod command;
pub mod process;
pub mod registry;
pub mod stub;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use acceptor::STUB_KIND;
pub use acceptor::StubConnector;
pub use acceptor::StubConnectorSettings;
pub use command::COMMAND_KIND;
pub use command::CommandConnector;
pub use command::CommandSettings;
pub use process::CommandRunner;
pub use process::CommandRunnerConfig;
pub use registry::BUILTIN_KINDS;
pub use registry::ConnectorRegistry;
pub use registry::connector_for_kind;
pub use stub::AcceptorStub;
pub use stub::ReplyStatus;
pub use stub::StubConnection;
pub use stub::StubSettings;
pub use stub::StubState;
