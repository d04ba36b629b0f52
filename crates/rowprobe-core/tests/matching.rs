// crates/rowprobe-core/tests/matching.rs
// ============================================================================
// Module: Line Matching Tests
// Description: Full-line pattern validation behavior.
// Purpose: Pin per-line full-match semantics and pattern error tiering.
// Dependencies: rowprobe-core
// ============================================================================

//! ## Overview
//! Exercises [`rowprobe_core::matches`] and [`rowprobe_core::expect_match`]
//! against multi-line text, empty input and malformed patterns.

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

use rowprobe_core::CheckFailure;
use rowprobe_core::LinePattern;
use rowprobe_core::expect_match;
use rowprobe_core::matches;
use rowprobe_core::normalize_whitespace;

// ============================================================================
// SECTION: Matching
// ============================================================================

/// A line in the middle of the text can satisfy the pattern.
#[test]
fn any_line_may_match() {
    let listing = "total 8\ndrwxr-xr-x 2 root root 4096 Jan  1 00:00 bin\n-rw-r--r-- 1 root root 12 Jan  1 00:00 notes.txt\n";
    assert!(matches(listing, ".*notes\\.txt").unwrap());
    assert!(!matches(listing, "notes\\.txt").unwrap());
}

/// Empty text never matches, even with a pattern accepting the empty string.
#[test]
fn empty_text_never_matches() {
    assert!(!matches("", ".*").unwrap());
    assert!(!matches("", "").unwrap());
}

/// An unbalanced group is an infrastructure error.
#[test]
fn invalid_pattern_is_infrastructure_error() {
    let error = matches("anything", ")").unwrap_err();
    assert!(error.message().contains("invalid pattern"));
    assert!(error.cause_text().is_some());
}

/// A pattern that only balances once wrapped is still rejected.
#[test]
fn pattern_that_balances_only_when_wrapped_is_rejected() {
    assert!(LinePattern::compile("a)(b").is_err());
}

/// A compiled pattern reports its original text.
#[test]
fn compiled_pattern_keeps_source() {
    let pattern = LinePattern::compile("[0-9]+").unwrap();
    assert_eq!(pattern.as_str(), "[0-9]+");
    assert!(pattern.matches_line("2024"));
    assert!(!pattern.matches_line("v2024"));
}

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// A failed expectation is an assertion failure naming the subject.
#[test]
fn expect_match_reports_assertion_failure() {
    let failure = expect_match("hello\nworld", "nothing", "stdout").unwrap_err();
    assert!(failure.is_assertion());
    let message = failure.to_string();
    assert!(message.contains("stdout"));
    assert!(message.contains("nothing"));
    assert!(message.contains("world"));
}

/// A malformed expectation is an infrastructure failure.
#[test]
fn expect_match_reports_invalid_pattern_as_infrastructure() {
    let failure = expect_match("hello", "(", "stdout").unwrap_err();
    assert!(matches!(failure, CheckFailure::Infrastructure(_)));
}

/// Whitespace normalization strips spaces, tabs and newlines.
#[test]
fn normalize_whitespace_strips_all_whitespace() {
    assert_eq!(normalize_whitespace(" <a>\n\t<b> x </b>\r\n</a> "), "<a><b>x</b></a>");
    assert_eq!(normalize_whitespace(""), "");
}
