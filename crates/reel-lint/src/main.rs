//! reel tape linter CLI.
//!
//! Usage:
//!   reel-lint <directory_or_file> [OPTIONS]

use clap::{Parser, ValueEnum};
use reel_lint::{lint_directory, lint_file, LintIssue, LintOptions, LintResult, Severity};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Output {
    Text,
    Json,
}

/// Validate reel tape files before loading them
#[derive(Parser, Debug)]
#[command(name = "reel-lint", author, version)]
struct Args {
    /// Tape file, or directory searched recursively for .json tapes
    path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: Output,

    /// Only show errors (hide warnings)
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Treat warnings as errors
    #[arg(short, long)]
    strict: bool,

    /// Do not compare content-length headers against bodies
    #[arg(long)]
    skip_content_length: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let options = LintOptions {
        skip_content_length: args.skip_content_length,
    };

    let mut result = if args.path.is_dir() {
        lint_directory(&args.path, &options)
    } else {
        lint_file(&args.path, &options)
    };
    if args.errors_only {
        result.issues.retain(|i| i.severity == Severity::Error);
    }

    match args.output {
        Output::Json => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize results: {e}");
                return ExitCode::from(2);
            }
        },
        Output::Text => print_results(&args.path, &result),
    }

    if result.failed(args.strict) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_results(root: &Path, result: &LintResult) {
    println!("{BOLD}{CYAN}reel-lint{RESET} {DIM}{}{RESET}", root.display());
    println!();

    let mut by_file: BTreeMap<&PathBuf, Vec<&LintIssue>> = BTreeMap::new();
    for issue in &result.issues {
        by_file.entry(&issue.file).or_default().push(issue);
    }

    for (file, issues) in by_file {
        let failed = issues.iter().any(|i| i.severity == Severity::Error);
        let status = if failed {
            format!("{RED}FAIL{RESET}")
        } else {
            format!("{YELLOW}WARN{RESET}")
        };
        println!("{status} {BOLD}{}{RESET}", file.display());

        for issue in issues {
            let color = severity_color(issue.severity);
            let location = issue
                .location
                .as_ref()
                .map(|l| format!("{DIM}[{RESET}{CYAN}{l}{RESET}{DIM}]{RESET} "))
                .unwrap_or_default();
            println!(
                "  {color}|{RESET} {location}{BOLD}{color}{}{RESET}: {} {DIM}({}){RESET}",
                issue.severity.label(),
                issue.message,
                issue.code
            );
            if let Some(suggestion) = &issue.suggestion {
                println!("  {color}|{RESET}   {GREEN}-> {suggestion}{RESET}");
            }
        }
        println!();
    }

    println!(
        "{DIM}Files checked:{RESET} {BOLD}{}{RESET}  {RED}Errors:{RESET} {BOLD}{}{RESET}  {YELLOW}Warnings:{RESET} {BOLD}{}{RESET}",
        result.files_checked, result.errors, result.warnings
    );
    if result.errors == 0 && result.warnings == 0 {
        println!("{GREEN}{BOLD}All checks passed!{RESET}");
    } else if result.errors == 0 {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{RED}{BOLD}Linting failed with errors{RESET}");
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}
