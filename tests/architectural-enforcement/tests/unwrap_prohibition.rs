//! Integration Test: Panic Prohibition
//!
//! **Policy**: production code in the biochat crates MUST NOT call
//! `.unwrap()` or `.expect(..)`. Failures propagate as `Result` and are
//! classified before they reach an HTTP caller.

use architectural_enforcement::{production_sources, report, Violation};

#[test]
fn test_no_unwrap_in_production_code() {
    let violations = find_unwrap_violations();

    report(
        "unwrap/expect",
        &[
            "Propagate with `?` and a typed error, or use unwrap_or / unwrap_or_default.",
            "Test modules and test_utils.rs are exempt.",
        ],
        &violations,
    );
}

fn find_unwrap_violations() -> Vec<Violation> {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (idx, code) in source.code_lines() {
            if let Some(rule) = panicking_call(code) {
                violations.push(source.violation(idx, rule));
            }
        }
    }

    violations
}

fn panicking_call(code: &str) -> Option<&'static str> {
    if code.contains(".unwrap()") {
        Some(".unwrap()")
    } else if code.contains(".expect(") {
        Some(".expect(..)")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_unwrap() {
        assert_eq!(panicking_call("let x = y.unwrap();"), Some(".unwrap()"));
    }

    #[test]
    fn test_detects_expect() {
        assert_eq!(panicking_call("let x = y.expect(\"set\");"), Some(".expect(..)"));
    }

    #[test]
    fn test_allows_fallbacks() {
        assert_eq!(panicking_call("let x = y.unwrap_or_default();"), None);
        assert_eq!(panicking_call("let x = y.unwrap_or_else(|_| z);"), None);
    }
}
