// crates/rowprobe-core/src/config.rs
// ============================================================================
// Module: Rowprobe Connector Config
// Description: String-keyed settings supplied to a connector at setup.
// Purpose: Typed, fail-closed access to flat connector configuration.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`ConnectorConfig`] is the flat key/value map the harness passes to
//! [`crate::Connector::setup`]. Values are strings; connectors parse what they
//! need through [`ConnectorConfig::parse`], which turns bad values into
//! [`InfrastructureError`] naming the offending key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::errors::InfrastructureError;

// ============================================================================
// SECTION: Connector Config
// ============================================================================

/// Flat connector configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Raw settings keyed by name.
    values: BTreeMap<String, String>,
}

impl ConnectorConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the configuration with one more setting.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the raw value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the raw value for a required key.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the key is missing.
    pub fn require(&self, key: &str) -> Result<&str, InfrastructureError> {
        self.get(key)
            .ok_or_else(|| InfrastructureError::new(format!("config key '{key}' is required")))
    }

    /// Parses an optional value.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the value is present but does not parse.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, InfrastructureError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|err| {
                    InfrastructureError::new(format!("config key '{key}' is invalid: {err}"))
                })
            })
            .transpose()
    }

    /// Parses an optional value, falling back to a default when absent.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the value is present but does not parse.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, InfrastructureError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    /// Iterates settings whose key starts with `prefix`, yielding the remainder.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.values.iter().filter_map(move |(key, value)| {
            key.strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest, value.as_str()))
        })
    }

    /// Iterates all settings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns true when no settings are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ConnectorConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect(),
        }
    }
}
