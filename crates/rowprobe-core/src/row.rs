// crates/rowprobe-core/src/row.rs
// ============================================================================
// Module: Rowprobe Rows
// Description: One test-data record handed to a connector operation.
// Purpose: Case-normalized, read-only field access with arity checks.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Row`] maps a field name to an ordered list of string values. Field names
//! are normalized (trimmed, ASCII lowercase) on construction so connectors can
//! look fields up without caring how the harness spelled the column header.
//! Invariants:
//! - Rows are immutable once constructed.
//! - [`Row::single`] succeeds only when the field holds exactly one value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;

use crate::errors::InfrastructureError;

// ============================================================================
// SECTION: Row
// ============================================================================

/// One test-data record: field name to ordered values.
///
/// # Invariants
/// - Keys are trimmed and ASCII-lowercased.
/// - Repeated keys at construction append to the same value list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Row {
    /// Normalized field name to values.
    fields: BTreeMap<String, Vec<String>>,
}

impl Row {
    /// Builds a row from field names and their value lists.
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let mut normalized: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, values) in fields {
            normalized
                .entry(normalize_field(key.as_ref()))
                .or_default()
                .extend(values.into_iter().map(Into::into));
        }
        Self {
            fields: normalized,
        }
    }

    /// Builds a row where every field holds exactly one value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(key, value)| (key, [Into::<String>::into(value)])))
    }

    /// Returns the single value of a field.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the field is missing or does not
    /// hold exactly one value.
    pub fn single(&self, field: &str) -> Result<&str, InfrastructureError> {
        self.optional_single(field)?.ok_or_else(|| {
            InfrastructureError::new(format!("row field '{}' is required", normalize_field(field)))
        })
    }

    /// Returns the single value of a field, or `None` when the field is absent.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the field is present but does not
    /// hold exactly one value.
    pub fn optional_single(&self, field: &str) -> Result<Option<&str>, InfrastructureError> {
        let key = normalize_field(field);
        match self.fields.get(&key).map(Vec::as_slice) {
            None => Ok(None),
            Some([value]) => Ok(Some(value.as_str())),
            Some(values) => Err(InfrastructureError::new(format!(
                "row field '{key}' must hold exactly one value (found {})",
                values.len()
            ))),
        }
    }

    /// Returns all values of a field (empty when absent).
    #[must_use]
    pub fn values(&self, field: &str) -> &[String] {
        self.fields.get(&normalize_field(field)).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns true when the row carries the field.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(&normalize_field(field))
    }

    /// Iterates normalized field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Normalizes a field name for lookup.
fn normalize_field(field: &str) -> String {
    field.trim().to_ascii_lowercase()
}
