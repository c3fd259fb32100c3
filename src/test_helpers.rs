//! Shared test fixtures for the ebook-builder test suite.
//!
//! Provides a minimal content directory (every fragment, each tagged with an
//! HTML comment so tests can locate sections), in-memory templates, and a
//! builder for technology datasets.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let ds = technologies(&[("Lang", "Languages", "Go", "go.png", "Site,https://go.dev")]);
//! let doc = assemble(&sample_templates(), &ds, &resources, &sample_options(root)).unwrap();
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::assemble::AssembleOptions;
use crate::config::{ColumnsConfig, TextConfig};
use crate::dataset::{Dataset, Row};
use crate::templates::{Fragment, Template, Templates};

// =========================================================================
// Fragments
// =========================================================================

pub const CATEGORY_TEMPLATE: &str =
    r#"<section class="category"><h1>{categoria}</h1><p>{descricao_categoria}</p></section>"#;
pub const ITEM_TEMPLATE: &str =
    "<article><h2>{titulo}</h2><img src='{imagem}'><p>{descricao}</p>{links_formatados}</article>";
pub const RESOURCES_TEMPLATE: &str = r#"<div class="resources">{lista_recursos}</div>"#;

fn fragment_text(fragment: Fragment) -> &'static str {
    match fragment {
        Fragment::Cover => "<!-- cover --><h1>Tech cover</h1>",
        Fragment::Introduction => "<!-- intro --><p>Intro</p>",
        Fragment::Instructions => "<!-- instructions --><p>How to read</p>",
        Fragment::Category => CATEGORY_TEMPLATE,
        Fragment::Item => ITEM_TEMPLATE,
        Fragment::Resources => RESOURCES_TEMPLATE,
        Fragment::Conclusion => "<!-- conclusion --><p>The end</p>",
        Fragment::BackCover => "<!-- back cover -->",
    }
}

/// Write every fragment into `dir` (created if needed).
pub fn write_fragments(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    for fragment in Fragment::ALL {
        fs::write(dir.join(fragment.file_name()), fragment_text(fragment)).unwrap();
    }
}

/// The same fragments as [`write_fragments`], already loaded.
pub fn sample_templates() -> Templates {
    Templates {
        cover: fragment_text(Fragment::Cover).to_string(),
        introduction: fragment_text(Fragment::Introduction).to_string(),
        instructions: fragment_text(Fragment::Instructions).to_string(),
        category: Template::parse(CATEGORY_TEMPLATE).unwrap(),
        item: Template::parse(ITEM_TEMPLATE).unwrap(),
        resources: RESOURCES_TEMPLATE.to_string(),
        conclusion: fragment_text(Fragment::Conclusion).to_string(),
        back_cover: fragment_text(Fragment::BackCover).to_string(),
    }
}

/// Assembler options for a project rooted at `root` with the stock layout.
pub fn sample_options(root: &Path) -> AssembleOptions {
    AssembleOptions {
        columns: ColumnsConfig::default(),
        images_dir: root.join("imagens"),
        stylesheet_path: root.join("conteudos/style.css"),
        stylesheet_href: "../conteudos/style.css".to_string(),
        no_resources: TextConfig::default().no_resources,
    }
}

// =========================================================================
// Datasets
// =========================================================================

pub const TECHNOLOGY_HEADERS: [&str; 6] = [
    "categoria",
    "categoria_descricao",
    "titulo",
    "descricao",
    "imagem",
    "link",
];

/// Build a technologies dataset from `(category, category description,
/// title, image, link)` tuples. `descricao` is derived from the title.
pub fn technologies(rows: &[(&str, &str, &str, &str, &str)]) -> Dataset {
    let rows = rows
        .iter()
        .enumerate()
        .map(|(i, (category, description, title, image, link))| {
            let about = format!("About {title}");
            let values = [*category, *description, *title, about.as_str(), *image, *link];
            let fields: HashMap<String, String> = TECHNOLOGY_HEADERS
                .iter()
                .zip(values)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Row::new(i + 1, fields)
        })
        .collect();
    Dataset {
        headers: TECHNOLOGY_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}
