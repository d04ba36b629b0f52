// crates/rowprobe-core/src/matching.rs
// ============================================================================
// Module: Rowprobe Line Matching
// Description: Per-line full-match pattern validation.
// Purpose: Decide whether captured text satisfies an expected pattern.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Text is split into lines and each line is tested independently for a
//! full-string match. Matching line by line bounds the work per match, where a
//! single multi-line pattern over a whole output blob can degrade badly.
//! Invariants:
//! - Empty text never matches.
//! - A malformed pattern is an [`InfrastructureError`]: a broken expectation is
//!   a defect in the test definition, not in the system under test.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use regex::RegexBuilder;

use crate::errors::AssertionFailure;
use crate::errors::CheckResult;
use crate::errors::InfrastructureError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Upper bound on compiled pattern size in bytes.
const MAX_COMPILED_PATTERN_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Line Pattern
// ============================================================================

/// A compiled pattern that must match an entire line.
#[derive(Debug, Clone)]
pub struct LinePattern {
    /// Pattern text as supplied by the caller.
    source: String,
    /// Anchored compiled form.
    regex: Regex,
}

impl LinePattern {
    /// Compiles a pattern for full-line matching.
    ///
    /// # Errors
    ///
    /// Returns [`InfrastructureError`] when the pattern is not valid.
    pub fn compile(pattern: &str) -> Result<Self, InfrastructureError> {
        let invalid = |err: regex::Error| {
            InfrastructureError::with_cause(format!("invalid pattern `{pattern}`"), err)
        };
        // The bare pattern must compile on its own: `a)(b` is only valid once
        // wrapped in the anchoring group.
        build_regex(pattern).map_err(invalid)?;
        let regex = build_regex(&format!("^(?:{pattern})$")).map_err(invalid)?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns the pattern text as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true when the line matches in full.
    #[must_use]
    pub fn matches_line(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Returns true when any line of `text` matches in full.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        text.lines().any(|line| self.matches_line(line))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Compiles a regex under the crate size limit.
fn build_regex(text: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(text).size_limit(MAX_COMPILED_PATTERN_BYTES).build()
}

/// Returns true when any line of `text` fully matches `pattern`.
///
/// # Errors
///
/// Returns [`InfrastructureError`] when the pattern is not valid.
pub fn matches(text: &str, pattern: &str) -> Result<bool, InfrastructureError> {
    Ok(LinePattern::compile(pattern)?.matches(text))
}

/// Checks that some line of `text` matches `pattern`.
///
/// `subject` names the text in the failure message (for example `stdout`).
///
/// # Errors
///
/// Returns an infrastructure failure for an invalid pattern and an assertion
/// failure quoting both sides when no line matches.
pub fn expect_match(text: &str, pattern: &str, subject: &str) -> CheckResult {
    if matches(text, pattern)? {
        return Ok(());
    }
    Err(AssertionFailure::mismatch(subject, pattern, text).into())
}

/// Removes every whitespace character.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
