// crates/rowprobe-config/src/lib.rs
// ============================================================================
// Module: Rowprobe Config Library
// Description: Configuration file model and validation.
// Purpose: Single source of truth for rowprobe.toml semantics.
// Dependencies: rowprobe-connectors, rowprobe-core, serde, toml
// ============================================================================

//! ## Overview
//! `rowprobe-config` loads `rowprobe.toml`, validates it fail-closed, and turns
//! each connector entry into the flat [`rowprobe_core::ConnectorConfig`] its
//! connector expects.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
