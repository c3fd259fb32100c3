//! HTML fragment loading and placeholder substitution.
//!
//! The ebook's prose lives in hand-written HTML fragments inside the content
//! directory. Two of them are per-row templates with `{name}` placeholders;
//! the resources page carries a single `{lista_recursos}` marker; the rest are
//! copied into the document verbatim.
//!
//! ## Content Directory
//!
//! ```text
//! conteudos/
//! ├── capa.html                  # Cover (verbatim)
//! ├── introducao.html            # Introduction (verbatim)
//! ├── instrucoes.html            # Instructions (verbatim)
//! ├── categoria_template.html    # {categoria}, {descricao_categoria}
//! ├── tecnologia_template.html   # any technology column + {links_formatados}
//! ├── recursos.html              # {lista_recursos}
//! ├── conclusao.html             # Conclusion (verbatim)
//! ├── contracapa.html            # Back cover (verbatim)
//! └── style.css                  # Linked from the document head
//! ```
//!
//! ## Placeholder Syntax
//!
//! `{name}` is replaced by the field called `name`. `{{` and `}}` produce
//! literal braces. Placeholders are matched by exact name; when fields are
//! missing, all of them are reported together.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Literal marker replaced by the rendered resource list.
pub const RESOURCES_MARKER: &str = "{lista_recursos}";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template file not found: {}", .path.display())]
    Missing { path: PathBuf },
    #[error("Cannot read template {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Invalid template {}: {source}", .path.display())]
    Parse { path: PathBuf, source: ParseError },
}

/// Syntax error inside a placeholder template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnclosedPlaceholder,
    UnmatchedClosingBrace,
    EmptyPlaceholder,
    WhitespaceInPlaceholder,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnclosedPlaceholder => f.write_str("unclosed '{' (use '{{' for a literal brace)"),
            Self::UnmatchedClosingBrace => {
                f.write_str("unmatched '}' (use '}}' for a literal brace)")
            }
            Self::EmptyPlaceholder => f.write_str("empty placeholder '{}'"),
            Self::WhitespaceInPlaceholder => {
                f.write_str("whitespace inside placeholder (use '{{' for a literal brace)")
            }
        }
    }
}

/// Fields a template referenced but the row did not provide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing field(s): {}", .names.join(", "))]
pub struct MissingFields {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed `{name}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        if n == '{' {
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(ParseError {
                            offset,
                            kind: ParseErrorKind::UnclosedPlaceholder,
                        });
                    }
                    if name.is_empty() {
                        return Err(ParseError {
                            offset,
                            kind: ParseErrorKind::EmptyPlaceholder,
                        });
                    }
                    if name.chars().any(char::is_whitespace) {
                        return Err(ParseError {
                            offset,
                            kind: ParseErrorKind::WhitespaceInPlaceholder,
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    return Err(ParseError {
                        offset,
                        kind: ParseErrorKind::UnmatchedClosingBrace,
                    });
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Distinct placeholder names, in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) if seen.insert(name.as_str()) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Placeholders with no entry in `fields`.
    pub fn missing_fields(&self, fields: &HashMap<String, String>) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter(|name| !fields.contains_key(*name))
            .map(str::to_string)
            .collect()
    }

    /// Substitute every placeholder. Fails, listing every absent name, if any
    /// placeholder has no field.
    pub fn render(&self, fields: &HashMap<String, String>) -> Result<String, MissingFields> {
        let missing = self.missing_fields(fields);
        if !missing.is_empty() {
            return Err(MissingFields { names: missing });
        }
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = fields.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// One fragment file of the content directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    Cover,
    Introduction,
    Instructions,
    Category,
    Item,
    Resources,
    Conclusion,
    BackCover,
}

impl Fragment {
    /// In book order.
    pub const ALL: [Fragment; 8] = [
        Fragment::Cover,
        Fragment::Introduction,
        Fragment::Instructions,
        Fragment::Category,
        Fragment::Item,
        Fragment::Resources,
        Fragment::Conclusion,
        Fragment::BackCover,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Fragment::Cover => "capa.html",
            Fragment::Introduction => "introducao.html",
            Fragment::Instructions => "instrucoes.html",
            Fragment::Category => "categoria_template.html",
            Fragment::Item => "tecnologia_template.html",
            Fragment::Resources => "recursos.html",
            Fragment::Conclusion => "conclusao.html",
            Fragment::BackCover => "contracapa.html",
        }
    }
}

/// Every fragment the document is built from.
#[derive(Debug, Clone)]
pub struct Templates {
    pub cover: String,
    pub introduction: String,
    pub instructions: String,
    pub category: Template,
    pub item: Template,
    /// Raw text; [`RESOURCES_MARKER`] is replaced literally.
    pub resources: String,
    pub conclusion: String,
    pub back_cover: String,
}

fn read_fragment(content_dir: &Path, fragment: Fragment) -> Result<String, TemplateError> {
    let path = content_dir.join(fragment.file_name());
    fs::read_to_string(&path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => TemplateError::Missing { path: path.clone() },
        _ => TemplateError::Io {
            path: path.clone(),
            source,
        },
    })
}

fn parse_fragment(
    content_dir: &Path,
    fragment: Fragment,
    text: &str,
) -> Result<Template, TemplateError> {
    Template::parse(text).map_err(|source| TemplateError::Parse {
        path: content_dir.join(fragment.file_name()),
        source,
    })
}

/// Read every fragment from `content_dir`. The first absent file aborts the
/// load with [`TemplateError::Missing`].
pub fn load_templates(content_dir: &Path) -> Result<Templates, TemplateError> {
    let mut texts = HashMap::new();
    for fragment in Fragment::ALL {
        let text = read_fragment(content_dir, fragment)?;
        tracing::debug!(file = fragment.file_name(), bytes = text.len(), "loaded fragment");
        texts.insert(fragment.file_name(), text);
    }
    let mut take = |fragment: Fragment| texts.remove(fragment.file_name()).unwrap_or_default();

    let category_text = take(Fragment::Category);
    let item_text = take(Fragment::Item);
    let resources = take(Fragment::Resources);
    if !resources.contains(RESOURCES_MARKER) {
        tracing::warn!(
            file = Fragment::Resources.file_name(),
            "no {RESOURCES_MARKER} marker, resource list will not appear"
        );
    }

    Ok(Templates {
        category: parse_fragment(content_dir, Fragment::Category, &category_text)?,
        item: parse_fragment(content_dir, Fragment::Item, &item_text)?,
        resources,
        cover: take(Fragment::Cover),
        introduction: take(Fragment::Introduction),
        instructions: take(Fragment::Instructions),
        conclusion: take(Fragment::Conclusion),
        back_cover: take(Fragment::BackCover),
    })
}
