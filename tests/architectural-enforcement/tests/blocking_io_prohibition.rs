//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code in router-core and router-cli MUST NOT use blocking I/O.
//! **Required**: `tokio::fs`, `tokio::io`, async `reqwest`; not `std::fs`, `std::net`,
//! `std::process` or `reqwest::blocking`.
//!
//! The log store, config loader and CLI all run on the tokio runtime, so a
//! blocking call anywhere on those paths stalls a worker thread.

use std::fs;
use std::path::Path;

use architectural_enforcement::{rust_sources, workspace_root, PRODUCTION_DIRS};

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }

        eprintln!("\nForbidden:");
        eprintln!("  - std::fs::read_to_string(), std::fs::write(), std::fs::File");
        eprintln!("  - std::net::TcpStream");
        eprintln!("  - std::process::Command");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("  - std::io::stdin() / std::io::stdout() inside async fns");
        eprintln!("\nUse instead:");
        eprintln!("  - tokio::fs::read_to_string().await, tokio::fs::OpenOptions");
        eprintln!("  - tokio::io::stdin(), tokio::io::stdout()");
        eprintln!("  - reqwest::Client::post().send().await");
        eprintln!("\nAllowed: non-async functions and test code.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

fn find_blocking_io_violations() -> Vec<String> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for file in rust_sources(&root.join(dir)) {
            check_file(&file, &mut violations);
        }
    }

    violations
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if let Some(kind) = violation_kind(&lines, idx) {
            violations.push(format!(
                "{}:{} - {kind}: {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    }
}

/// Classify line `idx`, or `None` if it is clean or exempt
fn violation_kind(lines: &[&str], idx: usize) -> Option<&'static str> {
    let line = lines[idx];
    let code = line.split("//").next().unwrap_or(line);

    if is_in_test_function(lines, idx) || is_in_non_async_function(lines, idx) {
        return None;
    }

    if code.contains("std::fs::") || code.contains("use std::fs") {
        return Some("Blocking file I/O");
    }
    if code.contains("std::net::") || code.contains("use std::net") {
        return Some("Blocking network I/O");
    }
    if code.contains("std::process::Command") {
        return Some("Blocking process I/O");
    }
    if code.contains("reqwest::blocking") {
        return Some("Blocking HTTP client");
    }
    if (code.contains("std::io::stdin()") || code.contains("std::io::stdout()"))
        && is_in_async_function(lines, idx)
    {
        return Some("Blocking stdin/stdout in async");
    }

    None
}

fn is_boundary(line: &str) -> bool {
    line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{'))
}

/// Whether the enclosing function carries a test attribute
fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    let mut fn_idx = None;
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();
        if line.starts_with("fn ") || line.contains(" fn ") {
            fn_idx = Some(i);
            break;
        }
        if is_boundary(line) {
            return false;
        }
    }

    let Some(fn_idx) = fn_idx else {
        return false;
    };

    for i in (0..fn_idx).rev() {
        let line = lines[i].trim();
        if line.starts_with("#[test]")
            || line.starts_with("#[tokio::test")
            || line.starts_with("#[cfg(test)]")
        {
            return true;
        }
        if line.starts_with("fn ") || line.starts_with("mod ") || line.starts_with("impl ") {
            break;
        }
    }

    false
}

fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();
        if line.contains("async fn ") {
            return true;
        }
        if line.starts_with("fn ") || is_boundary(line) {
            return false;
        }
    }
    false
}

/// Non-async functions run outside the runtime's worker threads
fn is_in_non_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();
        if line.starts_with("fn ") {
            return true;
        }
        if line.contains("async fn ") || is_boundary(line) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_read_in_async_fn_detected() {
        let code = [
            "async fn load_logs() {",
            "    let contents = std::fs::read_to_string(\"queries.txt\")?;",
            "}",
        ];

        assert!(is_in_async_function(&code, 1));
        assert!(!is_in_non_async_function(&code, 1));
        assert_eq!(violation_kind(&code, 1), Some("Blocking file I/O"));
    }

    #[test]
    fn test_non_async_function_exempt() {
        let code = [
            "fn stdin_is_terminal() -> bool {",
            "    std::io::stdin().is_terminal()",
            "}",
        ];

        assert!(is_in_non_async_function(&code, 1));
        assert_eq!(violation_kind(&code, 1), None);
    }

    #[test]
    fn test_test_function_exempt() {
        let code = [
            "#[tokio::test]",
            "async fn test_append() {",
            "    std::fs::write(\"queries.txt\", \"\").unwrap();",
            "}",
        ];

        assert!(is_in_test_function(&code, 2));
        assert_eq!(violation_kind(&code, 2), None);
    }

    #[test]
    fn test_stdin_in_async_fn_detected() {
        let code = [
            "async fn read_query() {",
            "    let stdin = std::io::stdin();",
            "}",
        ];

        assert_eq!(
            violation_kind(&code, 1),
            Some("Blocking stdin/stdout in async")
        );
    }

    #[test]
    fn test_commented_call_ignored() {
        let code = [
            "async fn append() {",
            "    // not std::fs::write",
            "}",
        ];

        assert_eq!(violation_kind(&code, 1), None);
    }
}
