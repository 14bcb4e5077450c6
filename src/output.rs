//! CLI output formatting.
//!
//! Every `format_*` function is pure and returns display lines; the matching
//! `print_*` wrapper writes them to stdout. Diagnostics go through `tracing`
//! on stderr, so stdout stays a clean report.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Post (2 sources)
//!     hello.md → generated/posts/hello.json
//!     world.md → generated/posts/world.json (unchanged)
//!     Module: generated/posts/index.mjs (2 imports)
//!     Removed: generated/posts/draft.json
//! Post: 1 written, 1 unchanged → generated/posts
//! ```
//!
//! ## Check
//!
//! ```text
//! Post: 3 files checked, 1 failed
//!     ValidationError: world.md failed validation: record does not match schema
//!       - title: is missing
//! ```

use crate::error::PipelineError;
use crate::pipeline::{BuildEvent, CheckReport, CollectionReport};
use crate::writer::WriteOutcome;

const INDENT: &str = "    ";

/// Format one progress event. Events from worker threads arrive unordered,
/// so each line stands on its own.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::CollectionStarted {
            collection,
            sources,
        } => {
            vec![format!("{collection} ({})", plural(*sources, "source"))]
        }
        BuildEvent::ArtifactWritten { artifact, .. } => {
            let suffix = match artifact.outcome {
                WriteOutcome::Written => "",
                WriteOutcome::Unchanged => " (unchanged)",
            };
            vec![format!(
                "{INDENT}{} \u{2192} {}{suffix}",
                artifact.source,
                artifact.artifact.display()
            )]
        }
        BuildEvent::ModuleGenerated {
            aggregator,
            imports,
            ..
        } => vec![format!(
            "{INDENT}Module: {} ({})",
            aggregator.display(),
            plural(*imports, "import")
        )],
        BuildEvent::Pruned { path, .. } => {
            vec![format!("{INDENT}Removed: {}", path.display())]
        }
    }
}

/// One summary line per built collection.
pub fn format_collection_report(report: &CollectionReport) -> Vec<String> {
    vec![format!(
        "{}: {} written, {} unchanged \u{2192} {}",
        report.collection,
        report.written(),
        report.unchanged(),
        report.module_dir.display()
    )]
}

pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let checked = plural(report.checked, "file");
    if report.is_ok() {
        return vec![format!("{}: {checked} checked, all valid", report.collection)];
    }
    let mut lines = vec![format!(
        "{}: {checked} checked, {} failed",
        report.collection,
        report.failures.len()
    )];
    for failure in &report.failures {
        lines.extend(format_error(failure).into_iter().map(|l| format!("{INDENT}{l}")));
    }
    lines
}

/// `Tag: message`, continuation lines (validation issues) kept as-is.
pub fn format_error(err: &PipelineError) -> Vec<String> {
    let text = format!("{}: {err}", err.tag());
    text.lines().map(str::to_string).collect()
}

pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}

pub fn print_collection_report(report: &CollectionReport) {
    for line in format_collection_report(report) {
        println!("{}", line);
    }
}

pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
