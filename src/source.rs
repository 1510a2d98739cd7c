//! Record sources: where datasets come from.
//!
//! A source only has to hand back an ordered list of rows with a known length;
//! parsing of the conversation columns happens later, per row, in the
//! classifier.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use serde_json::{Map, Number, Value};

use crate::error::SourceError;
use crate::pipeline::types::RawRecord;

/// A fully loaded dataset: rows in source order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub name: String,
    pub rows: Vec<RawRecord>,
}

impl Dataset {
    /// Number each row by its position.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Map<String, Value>>) -> Self {
        Self {
            name: name.into(),
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(i, fields)| RawRecord::new(i, fields))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Supplies one dataset to an analysis run.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Display name (file name, "inline", ...).
    fn name(&self) -> &str;

    /// Load every row. Failure here fails the whole task.
    async fn open(&self) -> Result<Dataset, SourceError>;
}

/// Rows already in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    rows: Vec<Map<String, Value>>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>, rows: Vec<Map<String, Value>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<Dataset, SourceError> {
        Ok(Dataset::from_rows(self.name.clone(), self.rows.clone()))
    }
}

/// Supported dataset file layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.json`: one array of row objects.
    Json,
    /// `.jsonl`: one row object per line.
    JsonLines,
    /// `.xlsx`: first worksheet, header row names the columns.
    Xlsx,
}

/// A dataset file: a JSON array of row objects (`.json`), one row object
/// per line (`.jsonl`) or a spreadsheet export (`.xlsx`).
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    /// Resolve `file_name` inside `data_dir`, refusing anything that would
    /// escape it.
    pub fn in_dir(data_dir: &Path, file_name: &str) -> Result<Self, SourceError> {
        let candidate = Path::new(file_name);
        let plain = candidate
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
        if file_name.trim().is_empty() || !plain {
            return Err(SourceError::NotFound(file_name.to_string()));
        }
        Ok(Self::new(data_dir.join(candidate)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Layout implied by the file extension.
    pub fn format(&self) -> Result<FileFormat, SourceError> {
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("json") => Ok(FileFormat::Json),
            Some("jsonl") => Ok(FileFormat::JsonLines),
            Some("xlsx") => Ok(FileFormat::Xlsx),
            _ => Err(SourceError::UnsupportedFormat(self.name.clone())),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Malformed {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn row_from(&self, position: usize, value: Value) -> Result<Map<String, Value>, SourceError> {
        match value {
            Value::Object(fields) => Ok(fields),
            _ => Err(self.malformed(format!("row {position} is not an object"))),
        }
    }
}

#[async_trait]
impl RecordSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<Dataset, SourceError> {
        let format = self.format()?;
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(self.name.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let rows = match format {
            FileFormat::Xlsx => {
                let name = self.name.clone();
                tokio::task::spawn_blocking(move || read_workbook(&name, bytes))
                    .await
                    .map_err(|e| self.malformed(format!("workbook reader failed: {e}")))??
            }
            FileFormat::JsonLines => {
                let text = String::from_utf8(bytes).map_err(|e| self.malformed(e.to_string()))?;
                text.lines()
                    .filter(|line| !line.trim().is_empty())
                    .enumerate()
                    .map(|(i, line)| {
                        let value: Value = serde_json::from_str(line)
                            .map_err(|e| self.malformed(format!("line {}: {e}", i + 1)))?;
                        self.row_from(i, value)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            FileFormat::Json => {
                let values: Vec<Value> =
                    serde_json::from_slice(&bytes).map_err(|e| self.malformed(e.to_string()))?;
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| self.row_from(i, value))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Dataset::from_rows(self.name.clone(), rows))
    }
}

/// Rows of the first worksheet keyed by the header row. Blank rows are
/// skipped; blank cells become `null`.
fn read_workbook(name: &str, bytes: Vec<u8>) -> Result<Vec<Map<String, Value>>, SourceError> {
    let malformed = |reason: String| SourceError::Malformed {
        name: name.to_string(),
        reason,
    };
    let mut workbook: Xlsx<Cursor<Vec<u8>>> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|e: calamine::XlsxError| malformed(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| malformed("workbook has no worksheets".into()))?
        .map_err(|e| malformed(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = header.iter().map(|cell| cell.to_string()).collect();

    Ok(rows
        .filter(|cells| cells.iter().any(|cell| *cell != Data::Empty))
        .map(|cells| {
            columns
                .iter()
                .zip(cells)
                .filter(|(column, _)| !column.is_empty())
                .map(|(column, cell)| (column.clone(), cell_value(cell)))
                .collect()
        })
        .collect())
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}
