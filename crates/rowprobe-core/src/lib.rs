// crates/rowprobe-core/src/lib.rs
// ============================================================================
// Module: Rowprobe Core Library
// Description: Data model, failure taxonomy, and connector contract.
// Purpose: Shared vocabulary between the harness and every connector.
// Dependencies: regex, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! `rowprobe-core` defines what a harness hands to a connector ([`Row`],
//! [`ConnectorConfig`]), what a connector hands back ([`Outcome`]), and the
//! [`Connector`] contract in between. It also ships the line-oriented pattern
//! matcher used by connectors that adjudicate text output, and the
//! [`EventSink`] observability interface.
//! Invariants:
//! - Failures are exactly one of [`AssertionFailure`] (the check ran and
//!   disagreed) or [`InfrastructureError`] (the check could not run).
//! - Rows and configs are read-only once constructed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod matching;
pub mod result;
pub mod row;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConnectorConfig;
pub use errors::AssertionFailure;
pub use errors::CheckFailure;
pub use errors::CheckResult;
pub use errors::InfrastructureError;
pub use errors::Outcome;
pub use events::ConnectorEvent;
pub use events::EventKind;
pub use events::EventSink;
pub use events::JsonLineSink;
pub use events::MemorySink;
pub use events::NoopSink;
pub use events::SharedEventSink;
pub use interfaces::Connector;
pub use matching::LinePattern;
pub use matching::expect_match;
pub use matching::matches;
pub use matching::normalize_whitespace;
pub use result::ExecutionResult;
pub use row::Row;
