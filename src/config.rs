//! Build configuration module.
//!
//! Handles loading, validating, and merging the optional `ebook.toml` that
//! lives in the project root. Stock defaults reproduce the layout the ebook
//! has always used (`conteudos/`, `imagens/`, `.tmp/`, `ebook.pdf`), so a
//! project without a config file builds exactly as before.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_dir = "conteudos"   # HTML fragments + stylesheet
//! images_dir = "imagens"      # Images referenced by the technologies sheet
//! temp_dir = ".tmp"           # Scratch directory, wiped on every run
//! output = "ebook.pdf"        # Final PDF, deleted before every run
//! stylesheet = "style.css"    # Stylesheet inside content_dir
//!
//! [sources]
//! technologies = "https://docs.google.com/spreadsheets/d/<id>/export?format=csv"
//! resources = "https://docs.google.com/spreadsheets/d/<id>/export?format=csv"
//! timeout_secs = 60
//!
//! [columns]
//! category = "categoria"
//! category_description = "categoria_descricao"
//! title = "titulo"
//! image = "imagem"
//! link = "link"
//! resource_title = "titulo"
//! resource_description = "descricao"
//! resource_link = "link"
//!
//! [renderer]
//! program = "wkhtmltopdf"
//! local_file_access_flag = "--enable-local-file-access"
//! extra_args = []
//! timeout_secs = 300
//!
//! [text]
//! no_resources = "<p>Nenhum recurso disponível.</p>"
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want:
//!
//! ```toml
//! [sources]
//! technologies = "data/tecnologias.csv"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Spreadsheet holding one row per technology.
pub const TECHNOLOGIES_SHEET_ID: &str = "1g-zamZFp5FHTGxZOA0vT3ULXjwROhWS0mz0_K1xTvXc";
/// Spreadsheet holding the recommended resources.
pub const RESOURCES_SHEET_ID: &str = "1lePYinFlYePVYPwwUqy1Xa1r1FF_l3vaAkRxntSvWq4";

/// Default config file name, looked up in the project root.
pub const CONFIG_FILE: &str = "ebook.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Google Sheets CSV export link for a spreadsheet.
pub fn sheet_export_url(sheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{sheet_id}/export?format=csv")
}

/// Build configuration loaded from `ebook.toml`.
///
/// Paths are relative to the project root unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding the HTML fragments and the stylesheet.
    pub content_dir: String,
    /// Directory holding the images named by the technologies sheet.
    pub images_dir: String,
    /// Scratch directory for the assembled HTML. Wiped on every run, so it
    /// may not contain the project root, `content_dir` or `images_dir`.
    pub temp_dir: String,
    /// Final PDF path. Deleted at the start of every run.
    pub output: String,
    /// Stylesheet file name inside `content_dir`.
    pub stylesheet: String,
    /// Where the two datasets come from.
    pub sources: SourcesConfig,
    /// Dataset column names.
    pub columns: ColumnsConfig,
    /// External HTML-to-PDF renderer.
    pub renderer: RendererConfig,
    /// Fixed text snippets.
    pub text: TextConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: "conteudos".to_string(),
            images_dir: "imagens".to_string(),
            temp_dir: ".tmp".to_string(),
            output: "ebook.pdf".to_string(),
            stylesheet: "style.css".to_string(),
            sources: SourcesConfig::default(),
            columns: ColumnsConfig::default(),
            renderer: RendererConfig::default(),
            text: TextConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let paths = [
            ("content_dir", &self.content_dir),
            ("images_dir", &self.images_dir),
            ("temp_dir", &self.temp_dir),
            ("output", &self.output),
            ("stylesheet", &self.stylesheet),
            ("sources.technologies", &self.sources.technologies),
            ("sources.resources", &self.sources.resources),
            ("renderer.program", &self.renderer.program),
        ];
        for (key, value) in paths {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        for (key, value) in self.columns.entries() {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "columns.{key} must not be empty"
                )));
            }
        }
        if self.sources.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "sources.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.renderer.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "renderer.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Dataset locations. Each value is an `http(s)://` URL or a local CSV path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub technologies: String,
    pub resources: String,
    /// Upper bound for each HTTP fetch, in seconds.
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            technologies: sheet_export_url(TECHNOLOGIES_SHEET_ID),
            resources: sheet_export_url(RESOURCES_SHEET_ID),
            timeout_secs: 60,
        }
    }
}

/// Column names in the two datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnsConfig {
    pub category: String,
    pub category_description: String,
    pub title: String,
    pub image: String,
    pub link: String,
    pub resource_title: String,
    pub resource_description: String,
    pub resource_link: String,
}

impl ColumnsConfig {
    fn entries(&self) -> [(&'static str, &String); 8] {
        [
            ("category", &self.category),
            ("category_description", &self.category_description),
            ("title", &self.title),
            ("image", &self.image),
            ("link", &self.link),
            ("resource_title", &self.resource_title),
            ("resource_description", &self.resource_description),
            ("resource_link", &self.resource_link),
        ]
    }
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            category: "categoria".to_string(),
            category_description: "categoria_descricao".to_string(),
            title: "titulo".to_string(),
            image: "imagem".to_string(),
            link: "link".to_string(),
            resource_title: "titulo".to_string(),
            resource_description: "descricao".to_string(),
            resource_link: "link".to_string(),
        }
    }
}

/// External renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Program name (looked up on `PATH`) or path to the binary.
    pub program: String,
    /// Flag that lets the renderer load `file://` stylesheets and images.
    pub local_file_access_flag: String,
    /// Extra arguments placed before the input and output paths.
    pub extra_args: Vec<String>,
    /// Upper bound for the renderer run, in seconds.
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "wkhtmltopdf".to_string(),
            local_file_access_flag: "--enable-local-file-access".to_string(),
            extra_args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Rendered in place of the resource list when the sheet is empty.
    pub no_resources: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            no_resources: "<p>Nenhum recurso disponível.</p>".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(BuildConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when the
/// file is absent.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `ebook.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# ebook-builder configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Paths are relative to the project root.
# Unknown keys will cause an error.

# Directory with the HTML fragments (capa.html, introducao.html, ...) and the stylesheet.
content_dir = "conteudos"

# Directory with the images named in the technologies sheet.
images_dir = "imagens"

# Scratch directory for the assembled HTML. Deleted and recreated on every run,
# so it must not be (or contain) the project root, content_dir or images_dir.
temp_dir = ".tmp"

# Final PDF. Deleted at the start of every run.
output = "ebook.pdf"

# Stylesheet file inside content_dir.
stylesheet = "style.css"

# ---------------------------------------------------------------------------
# Data sources: an http(s) URL or a local CSV path
# ---------------------------------------------------------------------------
[sources]
technologies = "https://docs.google.com/spreadsheets/d/1g-zamZFp5FHTGxZOA0vT3ULXjwROhWS0mz0_K1xTvXc/export?format=csv"
resources = "https://docs.google.com/spreadsheets/d/1lePYinFlYePVYPwwUqy1Xa1r1FF_l3vaAkRxntSvWq4/export?format=csv"

# Upper bound for each download, in seconds.
timeout_secs = 60

# ---------------------------------------------------------------------------
# Column names
# ---------------------------------------------------------------------------
[columns]
category = "categoria"
category_description = "categoria_descricao"
title = "titulo"
image = "imagem"
link = "link"
resource_title = "titulo"
resource_description = "descricao"
resource_link = "link"

# ---------------------------------------------------------------------------
# HTML-to-PDF renderer
# ---------------------------------------------------------------------------
[renderer]
program = "wkhtmltopdf"

# Lets the renderer load the file:// stylesheet and images.
local_file_access_flag = "--enable-local-file-access"

# Extra arguments, placed before the input and output paths.
extra_args = []

# Upper bound for the renderer run, in seconds.
timeout_secs = 300

# ---------------------------------------------------------------------------
# Fixed text
# ---------------------------------------------------------------------------
[text]
# Shown instead of the resource list when the resources sheet is empty.
no_resources = "<p>Nenhum recurso disponível.</p>"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_legacy_layout() {
        let config = BuildConfig::default();
        assert_eq!(config.content_dir, "conteudos");
        assert_eq!(config.images_dir, "imagens");
        assert_eq!(config.temp_dir, ".tmp");
        assert_eq!(config.output, "ebook.pdf");
        assert_eq!(config.renderer.program, "wkhtmltopdf");
        assert_eq!(
            config.renderer.local_file_access_flag,
            "--enable-local-file-access"
        );
    }

    #[test]
    fn default_sources_are_sheet_exports() {
        let config = BuildConfig::default();
        assert_eq!(
            config.sources.technologies,
            "https://docs.google.com/spreadsheets/d/1g-zamZFp5FHTGxZOA0vT3ULXjwROhWS0mz0_K1xTvXc/export?format=csv"
        );
        assert!(config.sources.resources.contains(RESOURCES_SHEET_ID));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[sources]
technologies = "data/tech.csv"
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.sources.technologies, "data/tech.csv");
        // Default values preserved
        assert_eq!(config.sources.timeout_secs, 60);
        assert_eq!(config.columns.title, "titulo");
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.content_dir, "conteudos");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
output = "build/book.pdf"

[renderer]
extra_args = ["--page-size", "A5"]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.output, "build/book.pdf");
        assert_eq!(config.renderer.extra_args, vec!["--page-size", "A5"]);
        assert_eq!(config.renderer.program, "wkhtmltopdf");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[renderer]
program = "wkhtmltopdf"
timeout_secs = 300
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[renderer]
timeout_secs = 30
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let renderer = merged.get("renderer").unwrap();
        assert_eq!(renderer.get("timeout_secs").unwrap().as_integer(), Some(30));
        assert_eq!(
            renderer.get("program").unwrap().as_str(),
            Some("wkhtmltopdf")
        );
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"output = "a.pdf""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"output = "b.pdf""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("output").unwrap().as_str(), Some("b.pdf"));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[renderer]
programm = "weasyprint"
"#;
        let result: Result<BuildConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<BuildConfig, _> = toml::from_str("[render]\nprogram = \"x\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_timeout() {
        let mut config = BuildConfig::default();
        config.renderer.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("renderer.timeout_secs"));
    }

    #[test]
    fn validate_empty_column() {
        let mut config = BuildConfig::default();
        config.columns.image = " ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("columns.image"));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[sources]\ntimeout_secs = 0\n").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BuildConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BuildConfig::default();
        assert_eq!(config.sources.technologies, defaults.sources.technologies);
        assert_eq!(config.sources.resources, defaults.sources.resources);
        assert_eq!(config.text.no_resources, defaults.text.no_resources);
        assert_eq!(config.renderer.timeout_secs, 300);
        assert_eq!(config.columns.resource_description, "descricao");
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        for section in ["sources", "columns", "renderer", "text"] {
            assert!(val.get(section).is_some(), "missing {section}");
        }
    }
}
