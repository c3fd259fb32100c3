//! CLI output formatting for the build pipeline.
//!
//! Output is **content-centric**: the summary lists what went into the
//! ebook (categories, their technologies in page order, resource count)
//! rather than which files were touched. Paths appear only where the user
//! needs them: stage headers and the final artifacts.
//!
//! # Output Format
//!
//! ```text
//! ==> Stage 1: Cleaning workspace
//! ==> Stage 2: Loading templates from conteudos
//! ==> Stage 3: Fetching technologies from https://docs.google.com/...
//! ==> Stage 3: Fetching resources from https://docs.google.com/...
//! ==> Stage 4: Assembling document
//! ==> Stage 5: Writing .tmp/ebook.html
//! ==> Stage 6: Rendering ebook.pdf
//!
//! Categories
//! 001 Lang (2 items)
//!     001 C
//!     002 Go
//!
//! Resources: 3
//! Pages: 10
//!
//! HTML → .tmp/ebook.html
//! PDF → ebook.pdf
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns lines (or a line) for testability; the
//! `print_*` wrappers write them to stdout. Format functions are pure.

use crate::assemble::DocumentSummary;
use crate::pipeline::{BuildReport, Stage};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Path relative to `root` when it lives inside it.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Stages
// ============================================================================

pub fn format_stage(stage: &Stage, root: &Path) -> String {
    let (number, action) = match stage {
        Stage::Clean => (1, "Cleaning workspace".to_string()),
        Stage::Templates(dir) => (
            2,
            format!("Loading templates from {}", display_path(dir, root)),
        ),
        Stage::Fetch(kind, location) => (3, format!("Fetching {kind} from {location}")),
        Stage::Assemble => (4, "Assembling document".to_string()),
        Stage::Write(path) => (5, format!("Writing {}", display_path(path, root))),
        Stage::Render(path) => (6, format!("Rendering {}", display_path(path, root))),
    };
    format!("==> Stage {number}: {action}")
}

pub fn print_stage(stage: &Stage, root: &Path) {
    println!("{}", format_stage(stage, root));
}

// ============================================================================
// Summary
// ============================================================================

/// Categories with their items in page order, then counts and warnings.
pub fn format_summary(summary: &DocumentSummary, root: &Path) -> Vec<String> {
    let mut lines = vec!["Categories".to_string()];
    if summary.categories.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, category) in summary.categories.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            category.name,
            plural(category.items.len(), "item", "items")
        ));
        for (j, title) in category.items.iter().enumerate() {
            lines.push(format!("{}{} {}", indent(1), format_index(j + 1), title));
        }
    }

    lines.push(String::new());
    lines.push(format!("Resources: {}", summary.resources));
    lines.push(format!("Pages: {}", summary.pages));

    if !summary.dropped_rows.is_empty() || !summary.missing_images.is_empty() {
        lines.push(String::new());
        lines.push("Warnings".to_string());
        for row in &summary.dropped_rows {
            lines.push(format!("{}row {row} skipped: no category", indent(1)));
        }
        for image in &summary.missing_images {
            lines.push(format!(
                "{}image not found: {}",
                indent(1),
                display_path(image, root)
            ));
        }
    }
    lines
}

pub fn print_summary(summary: &DocumentSummary, root: &Path) {
    for line in format_summary(summary, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Build report
// ============================================================================

pub fn format_build_report(report: &BuildReport, root: &Path) -> Vec<String> {
    let mut lines = format_summary(&report.summary, root);
    lines.push(String::new());
    lines.push(format!("HTML → {}", display_path(&report.html, root)));
    match &report.pdf {
        Some(pdf) => lines.push(format!("PDF → {}", display_path(pdf, root))),
        None => lines.push("PDF → (not rendered)".to_string()),
    }
    lines
}

pub fn print_build_report(report: &BuildReport, root: &Path) {
    for line in format_build_report(report, root) {
        println!("{}", line);
    }
}
