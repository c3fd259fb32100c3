//! # Ebook Builder
//!
//! Builds a technology-catalog ebook from two spreadsheets and a directory of
//! hand-written HTML fragments. The spreadsheets are the data source: each
//! technology row becomes a page, grouped under its category, and a final
//! page lists the recommended resources.
//!
//! # Architecture: Linear Pipeline
//!
//! ```text
//! 1. Clean      ebook.pdf, .tmp/          (stale artifacts removed)
//! 2. Templates  conteudos/*.html          (every fragment must exist)
//! 3. Fetch      technologies + resources  (published CSV → rows)
//! 4. Assemble   fragments + rows          → .tmp/ebook.html
//! 5. Render     .tmp/ebook.html           → ebook.pdf (wkhtmltopdf)
//! ```
//!
//! Every input is read before anything is written, and the old PDF is gone
//! before the first fetch, so a failed run never leaves a PDF that disagrees
//! with the current data.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `ebook.toml` loading over stock defaults, validation, `gen-config` output |
//! | [`workspace`] | Absolute project paths, stale-artifact cleanup |
//! | [`templates`] | Fragment loading and `{placeholder}` substitution |
//! | [`dataset`] | CSV download (or local read) and parsing into named-column rows |
//! | [`assemble`] | Category grouping, link formatting, resource list, final document |
//! | [`render`] | External HTML-to-PDF renderer behind the [`render::Renderer`] trait |
//! | [`pipeline`] | Stage ordering, artifact writing, build report |
//! | [`output`] | CLI output formatting for stages and the build summary |
//!
//! # Design Decisions
//!
//! ## Fragments Stay HTML
//!
//! The content directory is owned by writers, not developers. Fragments are
//! plain HTML files with `{name}` placeholders filled from spreadsheet
//! columns; the generated wrapper (page breaks, stylesheet links) and the
//! resource list are built with Maud.
//!
//! ## Renderer Behind a Trait
//!
//! PDF output depends on a system binary. [`pipeline::build`] takes an
//! optional `&dyn Renderer`, so tests run the full pipeline with a recording
//! fake and the `html` subcommand skips rendering entirely.

pub mod assemble;
pub mod config;
pub mod dataset;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod templates;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_helpers;
