//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in the biochat crates MUST NOT call blocking
//! filesystem, network or process APIs. Config and profile loading happen in
//! plain functions before the runtime starts serving.

use architectural_enforcement::{production_sources, report, FnContext, Violation};

/// Blocking calls and the async replacement to use instead
const BLOCKING_PATTERNS: &[(&str, &str)] = &[
    ("std::fs::", "tokio::fs"),
    ("fs::read_to_string(", "tokio::fs::read_to_string"),
    ("fs::write(", "tokio::fs::write"),
    ("std::net::TcpStream", "tokio::net::TcpStream"),
    ("std::net::TcpListener", "tokio::net::TcpListener"),
    ("reqwest::blocking", "the async reqwest::Client"),
    ("std::process::Command", "tokio::process::Command"),
    ("std::io::stdin", "tokio::io::stdin"),
];

#[test]
fn test_no_blocking_io_in_async_functions() {
    let violations = find_blocking_io_violations();

    report(
        "blocking I/O",
        &[
            "Blocking calls stall a runtime worker thread for every request it serves.",
            "Use the tokio equivalent, or move the call into a plain fn run before serving.",
        ],
        &violations,
    );
}

fn find_blocking_io_violations() -> Vec<Violation> {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (idx, code) in source.code_lines() {
            let Some((pattern, _)) = BLOCKING_PATTERNS
                .iter()
                .find(|(pattern, _)| is_blocking_call(code, pattern))
            else {
                continue;
            };
            if source.fn_context(idx) == FnContext::Async {
                violations.push(source.violation(idx, pattern));
            }
        }
    }

    violations
}

/// Match a pattern but not its tokio counterpart
fn is_blocking_call(code: &str, pattern: &str) -> bool {
    code.contains(pattern) && !code.contains(&format!("tokio::{pattern}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_std_fs() {
        assert!(is_blocking_call("let s = std::fs::read_to_string(p)?;", "std::fs::"));
    }

    #[test]
    fn test_ignores_tokio_fs() {
        assert!(!is_blocking_call(
            "let s = tokio::fs::read_to_string(p).await?;",
            "fs::read_to_string("
        ));
    }

    #[test]
    fn test_ignores_tokio_net() {
        assert!(!is_blocking_call(
            "let listener = tokio::net::TcpListener::bind(&addr).await?;",
            "std::net::TcpListener"
        ));
    }
}
