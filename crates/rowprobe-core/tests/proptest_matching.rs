// crates/rowprobe-core/tests/proptest_matching.rs
// ============================================================================
// Module: Matching Property Tests
// Description: Property-based checks for matching and normalization.
// Purpose: Detect edge cases across arbitrary text inputs.
// Dependencies: rowprobe-core, proptest
// ============================================================================

//! ## Overview
//! Property tests for whitespace normalization and literal line matching.

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

use proptest::prelude::*;
use rowprobe_core::matches;
use rowprobe_core::normalize_whitespace;

proptest! {
    /// Normalization leaves no whitespace and is idempotent.
    #[test]
    fn normalization_is_idempotent(text in "\\PC*") {
        let once = normalize_whitespace(&text);
        prop_assert!(!once.chars().any(char::is_whitespace));
        prop_assert_eq!(normalize_whitespace(&once), once);
    }

    /// An escaped literal line always matches text that contains it as a line.
    #[test]
    fn escaped_literal_line_matches(
        before in "[a-z ]{0,12}",
        line in "[ -~]{1,24}",
        after in "[a-z ]{0,12}",
    ) {
        let text = format!("{before}\n{line}\n{after}");
        let pattern = regex::escape(&line);
        prop_assert!(matches(&text, &pattern).unwrap());
    }

    /// A literal never matches a line that merely contains it with a prefix.
    #[test]
    fn prefixed_literal_does_not_match(word in "[a-z]{1,10}") {
        let text = format!("x{word}");
        prop_assert!(!matches(&text, &regex::escape(&word)).unwrap());
    }
}
