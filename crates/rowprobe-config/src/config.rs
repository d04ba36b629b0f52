// crates/rowprobe-config/src/config.rs
// ============================================================================
// Module: Rowprobe Configuration
// Description: Configuration loading and validation for rowprobe.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: rowprobe-connectors, rowprobe-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Each `[[connectors]]` entry names a connector, its kind, and a flat settings
//! table. Validation runs every entry's settings through the same parser the
//! connector uses at setup, so a file that validates also sets up.
//! Invariants:
//! - Connector names are unique, non-empty, and limited to `[A-Za-z0-9_-]`.
//! - Stub entries carry a `port`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use rowprobe_connectors::CommandSettings;
use rowprobe_connectors::ConnectorRegistry;
use rowprobe_connectors::StubConnectorSettings;
use rowprobe_connectors::connector_for_kind;
use rowprobe_core::ConnectorConfig;
use rowprobe_core::InfrastructureError;
use rowprobe_core::SharedEventSink;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "rowprobe.toml";
/// Environment variable overriding the config path.
pub const CONFIG_ENV_VAR: &str = "ROWPROBE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of connector entries.
pub(crate) const MAX_CONNECTORS: usize = 64;
/// Maximum connector name length.
pub(crate) const MAX_NAME_LENGTH: usize = 64;
/// Maximum number of settings per connector.
pub(crate) const MAX_SETTINGS: usize = 128;

// ============================================================================
// SECTION: Model
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowprobeConfig {
    /// Connector entries in file order.
    #[serde(default)]
    pub connectors: Vec<ConnectorEntry>,
}

/// One configured connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorEntry {
    /// Unique connector name used to address it.
    pub name: String,
    /// Connector kind.
    pub kind: ConnectorKind,
    /// Flat connector settings.
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,
}

impl ConnectorEntry {
    /// Converts the settings table into a connector configuration.
    #[must_use]
    pub fn connector_config(&self) -> ConnectorConfig {
        self.settings.iter().map(|(key, value)| (key.as_str(), value.to_setting_string())).collect()
    }

    /// Validates the entry.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name(&self.name)?;
        if self.settings.len() > MAX_SETTINGS {
            return Err(ConfigError::Invalid(format!(
                "connectors.{}.settings exceeds {MAX_SETTINGS} entries",
                self.name
            )));
        }
        if self.settings.keys().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "connectors.{}.settings keys must be non-empty",
                self.name
            )));
        }
        let config = self.connector_config();
        let invalid = |err: InfrastructureError| {
            ConfigError::Invalid(format!("connectors.{}: {err}", self.name))
        };
        match self.kind {
            ConnectorKind::Command => {
                CommandSettings::from_config(&config).map_err(invalid)?;
            }
            ConnectorKind::Stub => {
                let settings = StubConnectorSettings::from_config(&config).map_err(invalid)?;
                if settings.port.is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "connectors.{}: stub requires a port",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Built-in connector kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// Shell command connector.
    Command,
    /// Acceptor stub connector.
    Stub,
}

impl ConnectorKind {
    /// Returns the kind label understood by the connector factory.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => rowprobe_connectors::COMMAND_KIND,
            Self::Stub => rowprobe_connectors::STUB_KIND,
        }
    }
}

/// A scalar setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// String value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
}

impl SettingValue {
    /// Renders the value in the string form connectors parse.
    #[must_use]
    pub fn to_setting_string(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl RowprobeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is `path` when given, else `ROWPROBE_CONFIG`, else
    /// `rowprobe.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connectors.len() > MAX_CONNECTORS {
            return Err(ConfigError::Invalid(format!(
                "connectors exceeds {MAX_CONNECTORS} entries"
            )));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.connectors {
            entry.validate()?;
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate connector name: {}",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the entry named `name`.
    #[must_use]
    pub fn connector(&self, name: &str) -> Option<&ConnectorEntry> {
        self.connectors.iter().find(|entry| entry.name == name)
    }

    /// Yields each connector's name, kind, and flat configuration.
    pub fn connector_configs(
        &self,
    ) -> impl Iterator<Item = (&str, ConnectorKind, ConnectorConfig)> + '_ {
        self.connectors
            .iter()
            .map(|entry| (entry.name.as_str(), entry.kind, entry.connector_config()))
    }

    /// Builds a registry holding one set-up connector per entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a connector cannot be built or set up.
    pub fn build_registry(&self, sink: &SharedEventSink) -> Result<ConnectorRegistry, ConfigError> {
        let mut registry = ConnectorRegistry::new(sink.clone());
        for (name, kind, config) in self.connector_configs() {
            let setup_error = |err: InfrastructureError| ConfigError::Setup(format!("{name}: {err}"));
            let connector = connector_for_kind(kind.as_str(), sink.clone()).map_err(setup_error)?;
            registry.register(name, connector).map_err(setup_error)?;
            registry.setup(name, &config).map_err(setup_error)?;
        }
        Ok(registry)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// A connector rejected its configuration at setup.
    #[error("connector setup failed: {0}")]
    Setup(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a connector name.
fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Invalid("connector name must be non-empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("connector name exceeds max length: {name}")));
    }
    if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') {
        return Err(ConfigError::Invalid(format!("connector name has invalid characters: {name}")));
    }
    Ok(())
}
