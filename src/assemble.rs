//! Document assembly.
//!
//! Turns the loaded fragments and the two datasets into one HTML document,
//! one PDF page per top-level section:
//!
//! ```text
//! head (charset + stylesheet, absolute and relative)
//! cover
//! introduction
//! instructions
//! for each category, in first-seen order:
//!     category divider
//!     one page per technology, sorted by title
//! resources
//! conclusion
//! back cover
//! ```
//!
//! ## Item Fields
//!
//! Every column of a technology row is available to the item template under
//! its column name, verbatim (cell text is trusted HTML). Two fields are
//! derived:
//!
//! - the image column is rewritten to an absolute `file://` URL inside the
//!   images directory, since the renderer loads the document from the temp
//!   directory;
//! - `links_formatados` holds the link column expanded into a `<ul>`.
//!
//! ## Failure Reporting
//!
//! Formatting problems (missing template fields, malformed link entries) do
//! not stop at the first offending row: every row is checked and all problems
//! are reported together in one [`AssembleError::Formatting`].

use crate::config::{BuildConfig, ColumnsConfig};
use crate::dataset::{Dataset, Row};
use crate::templates::{MissingFields, RESOURCES_MARKER, Templates};
use crate::workspace::Workspace;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Category template placeholder for the category name.
pub const CATEGORY_FIELD: &str = "categoria";
/// Category template placeholder for the category description.
pub const CATEGORY_DESCRIPTION_FIELD: &str = "descricao_categoria";
/// Item template placeholder for the expanded link list.
pub const LINKS_FIELD: &str = "links_formatados";

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("technologies dataset has no {0:?} column")]
    MissingCategoryColumn(String),
    #[error("{} formatting problem(s):\n{}", .problems.len(), format_problems(.problems))]
    Formatting { problems: Vec<FormatProblem> },
}

fn format_problems(problems: &[FormatProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One reason a section could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatProblem {
    /// The category template references fields the group cannot provide.
    Category {
        category: String,
        missing: MissingFields,
    },
    /// The item template references columns the row lacks.
    Item {
        row: usize,
        title: String,
        missing: MissingFields,
    },
    /// A link entry without exactly one `platform,url` separator.
    MalformedLink {
        row: usize,
        title: String,
        entry: String,
    },
    /// The resources dataset lacks columns the resource list needs.
    ResourceColumns { missing: Vec<String> },
}

impl fmt::Display for FormatProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatProblem::Category { category, missing } => {
                write!(f, "category {category:?}: {missing}")
            }
            FormatProblem::Item {
                row,
                title,
                missing,
            } => write!(f, "technologies row {row} ({title:?}): {missing}"),
            FormatProblem::MalformedLink { row, title, entry } => write!(
                f,
                "technologies row {row} ({title:?}): malformed link entry {entry:?}, expected \"platform,url\""
            ),
            FormatProblem::ResourceColumns { missing } => {
                write!(f, "resources dataset: missing column(s): {}", missing.join(", "))
            }
        }
    }
}

/// A link entry without exactly one `platform,url` separator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed link entry {entry:?}")]
pub struct MalformedLink {
    pub entry: String,
}

/// Everything the assembler needs besides fragments and data.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub columns: ColumnsConfig,
    /// Absolute images directory.
    pub images_dir: PathBuf,
    /// Absolute stylesheet path, linked as a `file://` URL.
    pub stylesheet_path: PathBuf,
    /// Stylesheet path relative to the directory the HTML is written to.
    pub stylesheet_href: String,
    /// Shown instead of the resource list when there are no resources.
    pub no_resources: String,
}

impl AssembleOptions {
    pub fn new(config: &BuildConfig, workspace: &Workspace) -> Self {
        let stylesheet_path = workspace.content_dir.join(&config.stylesheet);
        Self {
            columns: config.columns.clone(),
            images_dir: workspace.images_dir.clone(),
            stylesheet_href: relative_href(&workspace.temp_dir, &stylesheet_path),
            stylesheet_path,
            no_resources: config.text.no_resources.clone(),
        }
    }
}

/// Category name plus its rows, title-sorted.
#[derive(Debug, Clone)]
pub struct CategoryGroup<'a> {
    pub name: &'a str,
    /// Taken from the group's first row in dataset order.
    pub description: Option<&'a str>,
    pub rows: Vec<&'a Row>,
}

/// Per-category listing kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub description: String,
    pub items: Vec<String>,
}

/// What went into the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub categories: Vec<CategorySummary>,
    pub resources: usize,
    /// Data row numbers skipped because their category was blank.
    pub dropped_rows: Vec<usize>,
    /// Image paths referenced by rows but absent on disk.
    pub missing_images: Vec<PathBuf>,
    pub pages: usize,
}

impl DocumentSummary {
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }
}

/// The assembled HTML plus its summary.
#[derive(Debug, Clone)]
pub struct Document {
    pub html: String,
    pub summary: DocumentSummary,
}

// ============================================================================
// Grouping
// ============================================================================

/// Partition rows by category, keeping categories in first-seen order and
/// sorting each group by title (stable, byte-wise).
///
/// Rows with a blank category are returned separately.
pub fn group_by_category<'a>(
    rows: &'a [Row],
    columns: &ColumnsConfig,
) -> (Vec<CategoryGroup<'a>>, Vec<&'a Row>) {
    let mut groups: Vec<CategoryGroup<'a>> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut dropped = Vec::new();

    for row in rows {
        let Some(name) = row.value(&columns.category) else {
            dropped.push(row);
            continue;
        };
        match index.get(name) {
            Some(&i) => groups[i].rows.push(row),
            None => {
                index.insert(name, groups.len());
                groups.push(CategoryGroup {
                    name,
                    description: row.get(&columns.category_description),
                    rows: vec![row],
                });
            }
        }
    }

    for group in &mut groups {
        group
            .rows
            .sort_by(|a, b| sort_key(a, &columns.title).cmp(sort_key(b, &columns.title)));
    }
    (groups, dropped)
}

fn sort_key<'r>(row: &'r Row, column: &str) -> &'r str {
    row.get(column).unwrap_or("")
}

// ============================================================================
// Field rendering
// ============================================================================

/// Expand a `platform,url;platform,url` field into an HTML list.
///
/// Blank or absent fields, and fields with only empty entries, yield `""`.
/// Each entry must hold exactly one comma.
pub fn format_links(field: Option<&str>) -> Result<String, MalformedLink> {
    let Some(field) = field.filter(|f| !f.trim().is_empty()) else {
        return Ok(String::new());
    };
    let mut items = String::new();
    for entry in field.split(';').filter(|e| !e.trim().is_empty()) {
        let (platform, url) = entry
            .split_once(',')
            .filter(|(_, url)| !url.contains(','))
            .ok_or_else(|| MalformedLink {
                entry: entry.to_string(),
            })?;
        let (platform, url) = (platform.trim(), url.trim());
        items.push_str(&format!(
            "<li>{platform}: <a href='{url}'>{url}</a></li>"
        ));
    }
    if items.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("<ul>{items}</ul>"))
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Relative href from `from_dir` to `target`, both absolute.
fn relative_href(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = target.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

fn category_fields(group: &CategoryGroup<'_>) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    fields.insert(CATEGORY_FIELD.to_string(), group.name.to_string());
    if let Some(description) = group.description {
        fields.insert(
            CATEGORY_DESCRIPTION_FIELD.to_string(),
            description.to_string(),
        );
    }
    fields
}

// ============================================================================
// Resources
// ============================================================================

/// Resource entries (title, muted description, link, rule) in dataset order,
/// or the fallback text when there are none.
pub fn render_resource_list(resources: &Dataset, columns: &ColumnsConfig, fallback: &str) -> String {
    if resources.is_empty() {
        return fallback.to_string();
    }
    let cell = |row: &Row, column: &str| row.get(column).unwrap_or("").to_string();
    let markup = html! {
        @for row in &resources.rows {
            @let link = cell(row, &columns.resource_link);
            p {
                strong { (cell(row, &columns.resource_title)) }
                br;
                span.text-muted { (cell(row, &columns.resource_description)) }
                br;
                a.text-decoration-none href=(link) { (link) }
                hr;
            }
        }
    };
    markup.into_string()
}

fn missing_resource_columns(resources: &Dataset, columns: &ColumnsConfig) -> Vec<String> {
    if resources.is_empty() {
        return Vec::new();
    }
    [
        &columns.resource_title,
        &columns.resource_description,
        &columns.resource_link,
    ]
    .into_iter()
    .filter(|c| !resources.has_column(c))
    .cloned()
    .collect()
}

// ============================================================================
// Document
// ============================================================================

fn document(options: &AssembleOptions, sections: &[String]) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="UTF-8";
                link rel="stylesheet" type="text/css" href=(file_url(&options.stylesheet_path));
                link rel="stylesheet" type="text/css" href=(options.stylesheet_href);
            }
            body {
                @for section in sections {
                    div style="page-break-after: always;" { (PreEscaped(section)) }
                }
            }
        }
    }
}

/// Build the full document.
///
/// Every row is rendered (or checked) before failing, so the error lists all
/// formatting problems at once.
pub fn assemble(
    templates: &Templates,
    technologies: &Dataset,
    resources: &Dataset,
    options: &AssembleOptions,
) -> Result<Document, AssembleError> {
    let columns = &options.columns;
    if !technologies.is_empty() && !technologies.has_column(&columns.category) {
        return Err(AssembleError::MissingCategoryColumn(columns.category.clone()));
    }

    let mut sections = vec![
        templates.cover.clone(),
        templates.introduction.clone(),
        templates.instructions.clone(),
    ];
    let mut problems = Vec::new();
    let mut summary = DocumentSummary::default();

    let (groups, dropped) = group_by_category(&technologies.rows, columns);
    for row in &dropped {
        tracing::warn!(row = row.number, "row has no category, skipped");
        summary.dropped_rows.push(row.number);
    }

    for group in &groups {
        tracing::debug!(category = group.name, items = group.rows.len(), "rendering category");
        match templates.category.render(&category_fields(group)) {
            Ok(html) => sections.push(html),
            Err(missing) => problems.push(FormatProblem::Category {
                category: group.name.to_string(),
                missing,
            }),
        }

        let mut category = CategorySummary {
            name: group.name.to_string(),
            description: group.description.unwrap_or("").to_string(),
            items: Vec::with_capacity(group.rows.len()),
        };
        for row in &group.rows {
            let title = row.get(&columns.title).unwrap_or("").to_string();
            let mut fields = row.fields().clone();

            if let Some(image) = row.value(&columns.image) {
                let path = options.images_dir.join(image);
                if !path.is_file() {
                    tracing::warn!(row = row.number, image = %path.display(), "image not found");
                    summary.missing_images.push(path.clone());
                }
                fields.insert(columns.image.clone(), file_url(&path));
            }

            match format_links(row.get(&columns.link)) {
                Ok(list) => {
                    fields.insert(LINKS_FIELD.to_string(), list);
                }
                Err(MalformedLink { entry }) => {
                    problems.push(FormatProblem::MalformedLink {
                        row: row.number,
                        title: title.clone(),
                        entry,
                    });
                    continue;
                }
            }

            match templates.item.render(&fields) {
                Ok(html) => sections.push(html),
                Err(missing) => problems.push(FormatProblem::Item {
                    row: row.number,
                    title: title.clone(),
                    missing,
                }),
            }
            category.items.push(title);
        }
        summary.categories.push(category);
    }

    let missing = missing_resource_columns(resources, columns);
    if !missing.is_empty() {
        problems.push(FormatProblem::ResourceColumns { missing });
    }
    if !problems.is_empty() {
        return Err(AssembleError::Formatting { problems });
    }

    let list = render_resource_list(resources, columns, &options.no_resources);
    sections.push(templates.resources.replace(RESOURCES_MARKER, &list));
    sections.push(templates.conclusion.clone());
    sections.push(templates.back_cover.clone());

    summary.resources = resources.len();
    summary.pages = sections.len();
    Ok(Document {
        html: document(options, &sections).into_string(),
        summary,
    })
}
