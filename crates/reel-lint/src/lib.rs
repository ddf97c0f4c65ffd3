//! Linter for reel tape files.
//!
//! Checks hand-written or hand-edited tapes before the proxy loads them.
//! Usable as a library or through the `reel-lint` binary.
//!
//! # Example
//!
//! ```no_run
//! use reel_lint::{lint_directory, lint_file, LintOptions};
//! use std::path::Path;
//!
//! let result = lint_file(Path::new("tapes/users.json"), &LintOptions::default());
//! let all = lint_directory(Path::new("tapes"), &LintOptions::default());
//!
//! if all.has_errors() {
//!     eprintln!("Found {} errors", all.errors);
//! }
//! ```

mod types;
mod validator;

use std::path::Path;
use walkdir::WalkDir;

pub use types::{LintIssue, LintOptions, LintResult, Severity};
pub use validator::{validate_headers, validate_request, validate_response, validate_tape};

/// Lint a single tape file.
pub fn lint_file(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            result.add_issue(LintIssue::error(
                "E001",
                format!("Failed to read file: {e}"),
                path,
            ));
            return result;
        }
    };

    if let Some(value) = parse(&content, path, &mut result) {
        validate_tape(path, &value, &mut result, options);
    }
    result
}

/// Lint every `.json` file under `path`, descending into subdirectories the
/// same way the proxy does when it loads a tape directory.
pub fn lint_directory(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();

    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let at = e.path().unwrap_or(path).to_path_buf();
                result.add_issue(LintIssue::error(
                    "E001",
                    format!("Failed to read directory: {e}"),
                    &at,
                ));
                continue;
            }
        };
        let file = entry.path();
        if entry.file_type().is_file() && file.extension().is_some_and(|e| e == "json") {
            result.merge(lint_file(file, options));
        }
    }

    result
}

/// Lint a JSON string, reporting issues against `source_name`.
pub fn lint_json(json: &str, source_name: &str, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;

    let path = Path::new(source_name);
    if let Some(value) = parse(json, path, &mut result) {
        validate_tape(path, &value, &mut result, options);
    }
    result
}

/// Lint an already parsed tape.
pub fn lint_value(
    value: &serde_json::Value,
    source_name: &str,
    options: &LintOptions,
) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;
    validate_tape(Path::new(source_name), value, &mut result, options);
    result
}

fn parse(content: &str, path: &Path, result: &mut LintResult) -> Option<serde_json::Value> {
    match serde_json::from_str(content) {
        Ok(value) => Some(value),
        Err(e) => {
            result.add_issue(
                LintIssue::error("E002", format!("Invalid JSON: {e}"), path)
                    .with_location(format!("line {}, column {}", e.line(), e.column())),
            );
            None
        }
    }
}
