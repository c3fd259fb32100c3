//! End-to-end build orchestration.
//!
//! ```text
//! 1. Clean      remove ebook.pdf, recreate .tmp/
//! 2. Templates  read every fragment from the content directory
//! 3. Fetch      technologies + resources CSV
//! 4. Assemble   one HTML document, one page per section
//! 5. Write      .tmp/ebook.html + .tmp/manifest.json
//! 6. Render     external renderer → ebook.pdf
//! ```
//!
//! Templates are loaded before any dataset is fetched, and the workspace is
//! cleaned before both, so every failure leaves no PDF behind.

use crate::assemble::{self, AssembleError, AssembleOptions, Document, DocumentSummary};
use crate::config::{self, BuildConfig, ConfigError};
use crate::dataset::{self, DatasetError, DatasetKind, Fetch, Location};
use crate::render::{self, RenderError, Renderer};
use crate::templates::{self, TemplateError};
use crate::workspace::{Workspace, WorkspaceError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("{0}")]
    Template(#[from] TemplateError),
    #[error("{0}")]
    Dataset(#[from] DatasetError),
    #[error("Formatting error: {0}")]
    Assemble(#[from] AssembleError),
    #[error("{0}")]
    Render(#[from] RenderError),
    #[error("Cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Progress notifications, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Clean,
    Templates(PathBuf),
    Fetch(DatasetKind, Location),
    Assemble,
    Write(PathBuf),
    Render(PathBuf),
}

/// Resolved config and paths for one run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: BuildConfig,
    pub workspace: Workspace,
}

impl BuildContext {
    pub fn new(root: &Path, config: BuildConfig) -> Result<Self, BuildError> {
        let workspace = Workspace::resolve(root, &config)?;
        Ok(Self { config, workspace })
    }

    /// Load `config_path` (stock defaults when absent) for the project at `root`.
    pub fn load(root: &Path, config_path: &Path) -> Result<Self, BuildError> {
        let config = config::load_config(config_path)?;
        Self::new(root, config)
    }

    pub fn location(&self, kind: DatasetKind) -> Location {
        let value = match kind {
            DatasetKind::Technologies => &self.config.sources.technologies,
            DatasetKind::Resources => &self.config.sources.resources,
        };
        Location::parse(value, &self.workspace.root)
    }
}

/// What a build produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub html: PathBuf,
    pub manifest: PathBuf,
    /// `None` when rendering was skipped.
    pub pdf: Option<PathBuf>,
    pub summary: DocumentSummary,
}

/// Load templates, fetch both datasets and assemble, without touching the
/// workspace.
pub fn assemble_document(
    ctx: &BuildContext,
    fetcher: &dyn Fetch,
    progress: &dyn Fn(Stage),
) -> Result<Document, BuildError> {
    let content_dir = &ctx.workspace.content_dir;
    progress(Stage::Templates(content_dir.clone()));
    let templates = templates::load_templates(content_dir)?;
    let stylesheet = content_dir.join(&ctx.config.stylesheet);
    if !stylesheet.is_file() {
        tracing::warn!(path = %stylesheet.display(), "stylesheet not found, document will be unstyled");
    }

    let fetch = |kind: DatasetKind| {
        let location = ctx.location(kind);
        progress(Stage::Fetch(kind, location.clone()));
        dataset::load_dataset(fetcher, kind, &location)
    };
    let technologies = fetch(DatasetKind::Technologies)?;
    let resources = fetch(DatasetKind::Resources)?;

    progress(Stage::Assemble);
    let options = AssembleOptions::new(&ctx.config, &ctx.workspace);
    Ok(assemble::assemble(
        &templates,
        &technologies,
        &resources,
        &options,
    )?)
}

/// Run the whole pipeline. With `renderer = None` the run stops after the
/// HTML is written.
pub fn build(
    ctx: &BuildContext,
    fetcher: &dyn Fetch,
    renderer: Option<&dyn Renderer>,
    progress: &dyn Fn(Stage),
) -> Result<BuildReport, BuildError> {
    let ws = &ctx.workspace;
    progress(Stage::Clean);
    ws.prepare()?;

    let document = assemble_document(ctx, fetcher, progress)?;

    let html = ws.html_path();
    progress(Stage::Write(html.clone()));
    write_file(&html, document.html.as_bytes())?;
    let manifest = ws.manifest_path();
    let json = serde_json::to_string_pretty(&document.summary)?;
    write_file(&manifest, json.as_bytes())?;
    tracing::info!(path = %html.display(), pages = document.summary.pages, "document written");

    let pdf = match renderer {
        Some(renderer) => {
            progress(Stage::Render(ws.output.clone()));
            if let Err(e) = renderer.render(&html, &ws.output) {
                render::discard_output(&ws.output);
                return Err(e.into());
            }
            tracing::info!(path = %ws.output.display(), "PDF generated");
            Some(ws.output.clone())
        }
        None => None,
    };

    Ok(BuildReport {
        html,
        manifest,
        pdf,
        summary: document.summary,
    })
}

/// Validate content and data without writing anything.
pub fn check(
    ctx: &BuildContext,
    fetcher: &dyn Fetch,
    progress: &dyn Fn(Stage),
) -> Result<DocumentSummary, BuildError> {
    Ok(assemble_document(ctx, fetcher, progress)?.summary)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    fs::write(path, contents).map_err(|source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    })
}
