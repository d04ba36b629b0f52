// crates/rowprobe-core/src/errors.rs
// ============================================================================
// Module: Rowprobe Failure Taxonomy
// Description: Two-tier failure model shared by every connector.
// Purpose: Separate "could not run the check" from "check ran and disagreed".
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Connectors report failures as data, never by unwinding. A
//! [`CheckFailure`] is either an [`InfrastructureError`] (bad configuration,
//! spawn failure, malformed pattern or envelope) or an [`AssertionFailure`]
//! (observed result differs from the expectation). [`Outcome`] is the
//! serializable view handed back to the harness.
//! Invariants:
//! - There are exactly two failure kinds.
//! - An infrastructure error aborts the current test case; the harness reports
//!   it as "error", distinct from a "failure".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Failure Types
// ============================================================================

/// Boxed underlying cause carried by an [`InfrastructureError`].
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// The check could not be attempted or could not be completed.
///
/// # Invariants
/// - `message` is human-readable and names what could not be done.
/// - `cause`, when present, is exposed through [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InfrastructureError {
    /// Description of what could not be done.
    message: String,
    /// Underlying error, when one exists.
    #[source]
    cause: Option<BoxedCause>,
}

impl InfrastructureError {
    /// Creates an infrastructure error without an underlying cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates an infrastructure error wrapping an underlying cause.
    #[must_use]
    pub fn with_cause(message: impl Into<String>, cause: impl Into<BoxedCause>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Returns the error message without the cause chain.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying cause rendered as text, if any.
    #[must_use]
    pub fn cause_text(&self) -> Option<String> {
        self.cause.as_ref().map(ToString::to_string)
    }
}

/// The check ran to completion and the observed result disagreed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AssertionFailure {
    /// Diagnostic message, including expected and actual values when known.
    message: String,
}

impl AssertionFailure {
    /// Creates an assertion failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates an assertion failure quoting both the expectation and the observation.
    #[must_use]
    pub fn mismatch(subject: &str, expected: &str, actual: &str) -> Self {
        Self::new(format!("{subject} did not match: expected `{expected}`, actual `{actual}`"))
    }

    /// Returns the diagnostic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Either failure kind, propagated with `?` through connector code.
#[derive(Debug, Error)]
pub enum CheckFailure {
    /// The check ran and disagreed with its expectation.
    #[error("assertion failure: {0}")]
    Assertion(#[from] AssertionFailure),
    /// The check could not run.
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] InfrastructureError),
}

impl CheckFailure {
    /// Returns true for the assertion-failure tier.
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion(_))
    }
}

/// Result type returned by connector operations.
pub type CheckResult<T = ()> = Result<T, CheckFailure>;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Data view of a connector operation result, as reported to the harness.
///
/// # Invariants
/// - Variants map one-to-one onto success and the two failure tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The check ran and matched its expectation.
    Success,
    /// The check ran and disagreed with its expectation.
    AssertionFailure {
        /// Diagnostic message.
        message: String,
    },
    /// The check could not run.
    InfrastructureError {
        /// Error message.
        message: String,
        /// Underlying cause rendered as text.
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl Outcome {
    /// Converts a connector result into its data view.
    #[must_use]
    pub fn from_result(result: CheckResult) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(CheckFailure::Assertion(failure)) => Self::AssertionFailure {
                message: failure.message,
            },
            Err(CheckFailure::Infrastructure(error)) => Self::InfrastructureError {
                cause: error.cause_text(),
                message: error.message,
            },
        }
    }

    /// Returns true when the check succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for an assertion failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::AssertionFailure { .. })
    }

    /// Returns true for an infrastructure error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::InfrastructureError { .. })
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::AssertionFailure {
                message,
            }
            | Self::InfrastructureError {
                message, ..
            } => Some(message),
        }
    }

    /// Returns a stable label for the outcome tier.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AssertionFailure { .. } => "failure",
            Self::InfrastructureError { .. } => "error",
        }
    }
}

impl From<CheckResult> for Outcome {
    fn from(result: CheckResult) -> Self {
        Self::from_result(result)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
