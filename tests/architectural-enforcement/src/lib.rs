//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural
//! principles across the workspace:
//! - No blocking waits (thread sleeps, blocking channel calls) in async code
//! - No sleeping or locking inside the splitter core; it coordinates only
//!   through channels and its write-once outcome cell
//!
//! The scanning helpers live here so every test file applies the same rules
//! the same way.

use std::fs;
use std::path::{Path, PathBuf};

/// A forbidden pattern and why it is forbidden
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Substring that marks a violation in a code line
    pub pattern: &'static str,
    /// Explanation printed next to each violation
    pub reason: &'static str,
}

/// One offending source line
#[derive(Clone, Debug)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// One-based line number
    pub line: usize,
    /// The rule that matched
    pub rule: Rule,
    /// Trimmed source text
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule.reason,
            self.text
        )
    }
}

/// Root of the workspace this package lives in
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Scan every `.rs` file under `dir` (relative to the workspace root)
///
/// Comments are ignored, and scanning of a file stops at its first
/// `#[cfg(test)]` line since test modules sit at the bottom of each file.
pub fn check_directory(dir: &str, rules: &[Rule]) -> Vec<Violation> {
    let path = workspace_root().join(dir);
    let mut violations = Vec::new();
    if !path.exists() {
        return violations;
    }

    for entry in walkdir::WalkDir::new(&path)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            check_file(entry.path(), rules, &mut violations);
        }
    }

    violations
}

fn check_file(path: &Path, rules: &[Rule], violations: &mut Vec<Violation>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    for (idx, line) in content.lines().enumerate() {
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        for rule in rules {
            if code_part.contains(rule.pattern) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    rule: *rule,
                    text: line.trim().to_string(),
                });
            }
        }
    }
}

/// Print violations and fail the calling test if there are any
pub fn report(title: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ CRITICAL: {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_contains_core() {
        assert!(workspace_root().join("tuplesplit/core/src/lib.rs").exists());
    }

    #[test]
    fn test_comments_and_test_modules_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.rs");
        fs::write(
            &file,
            "fn a() {}\n// std::thread::sleep in a comment\nfn b() { std::thread::sleep(d); }\n#[cfg(test)]\nmod tests { fn c() { std::thread::sleep(d); } }\n",
        )
        .unwrap();

        let rule = Rule {
            pattern: "std::thread::sleep",
            reason: "Thread sleep",
        };
        let mut violations = Vec::new();
        check_file(&file, &[rule], &mut violations);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 3);
    }
}
