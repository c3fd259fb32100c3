//! Dataset retrieval and CSV parsing.
//!
//! Both datasets are spreadsheets exported as CSV. A source is either an
//! `http(s)://` URL (the Google Sheets export link by default) or a local
//! file path, which keeps offline builds and tests off the network.
//!
//! Empty cells are kept as empty strings; callers decide what "empty" means
//! for each column. Any fetch or parse failure is fatal for the run.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Which of the two datasets an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Technologies,
    Resources,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Technologies => f.write_str("technologies"),
            DatasetKind::Resources => f.write_str("resources"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("duplicate column {0:?}")]
    DuplicateColumn(String),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to load {dataset} dataset from {location}: {source}")]
    Fetch {
        dataset: DatasetKind,
        location: Location,
        source: FetchError,
    },
    #[error("Failed to parse {dataset} dataset from {location}: {source}")]
    Parse {
        dataset: DatasetKind,
        location: Location,
        source: ParseError,
    },
}

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Url(String),
    File(PathBuf),
}

impl Location {
    /// Interpret a config value: `http://` / `https://` prefixes are URLs,
    /// anything else is a path relative to `root`.
    pub fn parse(value: &str, root: &Path) -> Self {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            Location::Url(value.to_string())
        } else {
            Location::File(root.join(value))
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Url(url) => f.write_str(url),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Retrieves the raw CSV text behind a [`Location`].
pub trait Fetch {
    fn fetch_text(&self, location: &Location) -> Result<String, FetchError>;
}

/// Production fetcher: blocking HTTP with a timeout, plus local files.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch_text(&self, location: &Location) -> Result<String, FetchError> {
        match location {
            Location::Url(url) => {
                let response = self.client.get(url).send()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                        url: url.clone(),
                    });
                }
                Ok(response.text()?)
            }
            Location::File(path) => Ok(fs::read_to_string(path)?),
        }
    }
}

/// One data row. Cells are addressed by column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based position among the data rows (header excluded).
    pub number: usize,
    fields: HashMap<String, String>,
}

impl Row {
    pub fn new(number: usize, fields: HashMap<String, String>) -> Self {
        Self { number, fields }
    }

    /// Raw cell value; `None` only when the column does not exist.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Cell value when present and not blank.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.trim().is_empty())
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }
}

/// A parsed CSV table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

/// Parse CSV text with a mandatory header row.
///
/// Rows with a different number of cells than the header are rejected.
pub fn parse_csv(text: &str) -> Result<Dataset, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    for (i, header) in headers.iter().enumerate() {
        if headers[..i].contains(header) {
            return Err(ParseError::DuplicateColumn(header.clone()));
        }
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let fields = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(Row::new(idx + 1, fields));
    }
    Ok(Dataset { headers, rows })
}

/// Fetch and parse one dataset.
pub fn load_dataset(
    fetcher: &dyn Fetch,
    dataset: DatasetKind,
    location: &Location,
) -> Result<Dataset, DatasetError> {
    tracing::info!(%dataset, %location, "fetching dataset");
    let text = fetcher
        .fetch_text(location)
        .map_err(|source| DatasetError::Fetch {
            dataset,
            location: location.clone(),
            source,
        })?;
    let parsed = parse_csv(&text).map_err(|source| DatasetError::Parse {
        dataset,
        location: location.clone(),
        source,
    })?;
    tracing::info!(%dataset, rows = parsed.len(), "dataset loaded");
    Ok(parsed)
}
