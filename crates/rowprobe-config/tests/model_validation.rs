// crates/rowprobe-config/tests/model_validation.rs
// =============================================================================
// Module: Config Model Validation Tests
// Description: Validate connector entries, names, and settings.
// Purpose: Ensure a config that validates also sets up.
// =============================================================================

//! ## Overview
//! Exercises [`RowprobeConfig::from_toml_str`] and registry construction.

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

use rowprobe_config::ConnectorKind;
use rowprobe_config::RowprobeConfig;
use rowprobe_core::NoopSink;

/// Asserts that parsing fails with a message containing `needle`.
fn assert_rejected(content: &str, needle: &str) {
    let error = RowprobeConfig::from_toml_str(content).unwrap_err().to_string();
    assert!(error.contains(needle), "error `{error}` did not contain `{needle}`");
}

/// An empty file is a valid, empty configuration.
#[test]
fn empty_config_is_valid() {
    let config = RowprobeConfig::from_toml_str("").unwrap();
    assert!(config.connectors.is_empty());
}

/// Unknown connector kinds fail to parse.
#[test]
fn unknown_kind_is_rejected() {
    assert_rejected("[[connectors]]\nname = \"dir\"\nkind = \"ldap\"\n", "config parse error");
}

/// Unknown top-level and entry keys fail to parse.
#[test]
fn unknown_fields_are_rejected() {
    assert_rejected("verbose = true\n", "config parse error");
    assert_rejected(
        "[[connectors]]\nname = \"shell\"\nkind = \"command\"\ntimeout_ms = 5\n",
        "config parse error",
    );
}

/// Names must be unique and well formed.
#[test]
fn names_are_validated() {
    assert_rejected(
        "[[connectors]]\nname = \"a\"\nkind = \"command\"\n[[connectors]]\nname = \"a\"\nkind = \"command\"\n",
        "duplicate connector name",
    );
    assert_rejected("[[connectors]]\nname = \"\"\nkind = \"command\"\n", "non-empty");
    assert_rejected("[[connectors]]\nname = \"bad name\"\nkind = \"command\"\n", "invalid characters");
}

/// Setting values are parsed the way the connector parses them.
#[test]
fn settings_are_validated_per_kind() {
    assert_rejected(
        "[[connectors]]\nname = \"shell\"\nkind = \"command\"\n[connectors.settings]\ntimeout_ms = \"soon\"\n",
        "timeout_ms",
    );
    assert_rejected(
        "[[connectors]]\nname = \"peer\"\nkind = \"stub\"\n[connectors.settings]\nport = 70000\n",
        "port",
    );
    assert_rejected("[[connectors]]\nname = \"peer\"\nkind = \"stub\"\n", "stub requires a port");
}

/// Float settings are not a supported scalar.
#[test]
fn float_setting_is_rejected() {
    assert_rejected(
        "[[connectors]]\nname = \"shell\"\nkind = \"command\"\n[connectors.settings]\ntimeout_ms = 1.5\n",
        "config parse error",
    );
}

/// A valid config builds a registry with every connector set up.
#[test]
fn valid_config_builds_registry() {
    let config = RowprobeConfig::from_toml_str(
        "[[connectors]]\nname = \"shell\"\nkind = \"command\"\n\n[[connectors]]\nname = \"peer\"\nkind = \"stub\"\n[connectors.settings]\nport = 0\n",
    )
    .unwrap();
    let kinds: Vec<_> = config.connector_configs().map(|(name, kind, _)| (name, kind)).collect();
    assert_eq!(kinds, vec![("shell", ConnectorKind::Command), ("peer", ConnectorKind::Stub)]);

    let registry = config.build_registry(&NoopSink::shared()).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["peer", "shell"]);
    assert_eq!(registry.kind_of("peer"), Some("stub"));
}
