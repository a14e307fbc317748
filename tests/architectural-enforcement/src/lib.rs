//! Architectural Enforcement Integration Tests
//!
//! Source scans that enforce code rules on the biochat crates:
//! - No blocking I/O inside async functions
//! - No sleeping in production code
//! - No `unwrap()`/`expect()` in production code
//!
//! This library holds the shared scanning helpers; the rules themselves live
//! in `tests/`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["biochat/core/src", "biochat/daemon/src"];

/// Files that are compiled only for tests
const TEST_ONLY_FILES: &[&str] = &["test_utils.rs"];

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Kind of function enclosing a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnContext {
    /// `async fn`
    Async,
    /// Plain `fn`
    Sync,
    /// Module level or unknown
    None,
}

/// A rule violation at a specific line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the violation
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What rule was broken
    pub rule: &'static str,
    /// Offending source line, trimmed
    pub code: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} - {}: {}", self.path.display(), self.line, self.rule, self.code)
    }
}

/// A production source file with its test module cut off
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    /// Lines before the inline `#[cfg(test)]` module
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Parse file content, dropping everything from the inline test module on
    #[must_use]
    pub fn from_content(path: PathBuf, content: &str) -> Self {
        let all: Vec<&str> = content.lines().collect();
        let end = all
            .iter()
            .enumerate()
            .position(|(idx, line)| {
                line.trim().starts_with("#[cfg(test)]")
                    && all
                        .get(idx + 1)
                        .is_some_and(|next| next.trim_end().ends_with('{'))
            })
            .unwrap_or(all.len());

        Self {
            path,
            lines: all[..end].iter().map(|l| (*l).to_string()).collect(),
        }
    }

    /// Code lines as `(index, code)` with comments removed
    pub fn code_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines.iter().enumerate().filter_map(|(idx, line)| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("//") {
                return None;
            }
            let code = line.split("//").next().unwrap_or(line);
            Some((idx, code))
        })
    }

    /// Function context of the line at `idx`
    #[must_use]
    pub fn fn_context(&self, idx: usize) -> FnContext {
        let lines: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        fn_context(&lines, idx)
    }

    /// Build a violation for the line at `idx`
    #[must_use]
    pub fn violation(&self, idx: usize, rule: &'static str) -> Violation {
        Violation {
            path: self.path.clone(),
            line: idx + 1,
            rule,
            code: self.lines[idx].trim().to_string(),
        }
    }
}

/// Find the nearest function declaration at or above `idx`
#[must_use]
pub fn fn_context(lines: &[&str], idx: usize) -> FnContext {
    for line in lines[..=idx.min(lines.len().saturating_sub(1))].iter().rev() {
        let line = line.trim();
        if line.starts_with("//") {
            continue;
        }
        let declares_fn = line.starts_with("fn ") || line.contains(" fn ");
        if declares_fn {
            return if line.contains("async fn ") {
                FnContext::Async
            } else {
                FnContext::Sync
            };
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return FnContext::None;
        }
    }
    FnContext::None
}

/// Load every production source file
///
/// # Panics
///
/// Panics if no source files are found, which means the scan paths are wrong.
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut sources = Vec::new();

    for dir in PRODUCTION_DIRS {
        for entry in walkdir::WalkDir::new(root.join(dir))
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
            if TEST_ONLY_FILES.contains(&file_name) {
                continue;
            }
            if let Ok(content) = fs::read_to_string(path) {
                sources.push(SourceFile::from_content(path.to_path_buf(), &content));
            }
        }
    }

    assert!(
        !sources.is_empty(),
        "no production sources found under {}",
        root.display()
    );
    sources
}

/// Print violations and fail the test if there are any
///
/// # Panics
///
/// Panics when `violations` is not empty.
pub fn report(rule_name: &str, guidance: &[&str], violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n{rule_name} violations in production code:\n");
    for violation in violations {
        eprintln!("  {violation}");
    }
    eprintln!();
    for line in guidance {
        eprintln!("  {line}");
    }

    panic!(
        "\nFound {} {rule_name} violation(s) in production code.",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_context_detection() {
        let code = [
            "pub async fn handle(&self) {",
            "    let text = std::fs::read_to_string(\"x\");",
            "}",
        ];
        assert_eq!(fn_context(&code, 1), FnContext::Async);
    }

    #[test]
    fn test_sync_context_detection() {
        let code = [
            "pub fn load<F>(path: Option<PathBuf>, env: F) -> Result<Config>",
            "where",
            "    F: Fn(&str) -> Option<String>,",
            "{",
            "    let text = std::fs::read_to_string(path)?;",
        ];
        assert_eq!(fn_context(&code, 4), FnContext::Sync);
    }

    #[test]
    fn test_module_level_context() {
        let code = ["use std::fs;", "const X: u8 = 1;"];
        assert_eq!(fn_context(&code, 1), FnContext::None);
    }

    #[test]
    fn test_inline_test_module_is_dropped() {
        let content = "fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
        let file = SourceFile::from_content(PathBuf::from("a.rs"), content);
        assert_eq!(file.lines, vec!["fn a() {}"]);
    }

    #[test]
    fn test_cfg_test_module_declaration_is_kept() {
        let content = "#[cfg(test)]\npub(crate) mod test_utils;\n\nfn a() {}\n";
        let file = SourceFile::from_content(PathBuf::from("mod.rs"), content);
        assert_eq!(file.lines.len(), 4);
    }

    #[test]
    fn test_comments_are_skipped() {
        let content = "/// calls .unwrap() in docs\nlet x = y; // then .unwrap()\n";
        let file = SourceFile::from_content(PathBuf::from("a.rs"), content);
        let code: Vec<_> = file.code_lines().collect();
        assert_eq!(code, vec![(1, "let x = y; ")]);
    }
}
