//! Core types and errors for the migration pipeline

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::content_model::{ContentModelDefinition, FieldType};

use super::dates;

/// One cell of a parsed archive row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// Raw text exactly as read from the archive (trailing whitespace stripped)
    Text(String),
    /// A date column after normalization
    Date(NaiveDateTime),
}

impl CellValue {
    /// Whether this is an empty text cell
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }

    /// Text content, if the cell has not been converted to a date
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Date(_) => None,
        }
    }

    /// Rendering used by the CSV audit trail
    pub fn to_audit_string(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Date(d) => dates::to_audit_string(d),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// One record, aligned positionally with [`WebcenterDataset::field_names`]
pub type ParsedRow = Vec<CellValue>;

/// Everything read from one archive file
#[derive(Debug, Clone)]
pub struct WebcenterDataset {
    /// Content model the rows will be mapped through
    pub definition: ContentModelDefinition,
    /// Field names from the archive, followed by the synthetic batch-id and run-stamp fields
    pub field_names: Vec<String>,
    /// Field names listed in the header type list (these columns hold timestamps)
    pub date_fields: Vec<String>,
    /// Parsed records
    pub rows: Vec<ParsedRow>,
    /// Grandparent directory of the archive; primary files are relative to it
    pub base_dir: PathBuf,
    /// Name of the archive's parent directory
    pub batch_id: String,
}

impl WebcenterDataset {
    /// Position of a field in every row
    pub fn column(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|f| f == name)
    }

    /// Number of parsed rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were parsed
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Inclusive range of archive sequence numbers to process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceWindow {
    pub start: u32,
    /// `None` means no upper bound
    pub end: Option<u32>,
}

impl SequenceWindow {
    pub fn new(start: u32, end: Option<u32>) -> Self {
        Self { start, end }
    }

    /// Every sequence number
    pub fn all() -> Self {
        Self::new(0, None)
    }

    pub fn contains(&self, sequence: u32) -> bool {
        sequence >= self.start && self.end.map_or(true, |end| sequence <= end)
    }
}

impl Default for SequenceWindow {
    fn default() -> Self {
        Self::all()
    }
}

/// Run statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationStats {
    /// Archive files fully processed
    pub files_processed: usize,
    /// Records read from archives
    pub documents_processed: usize,
    /// Property files written
    pub documents_written: usize,
    /// Records skipped (failed validation, no primary file, no substitute content)
    pub documents_skipped: usize,
    /// Content links created
    pub links_created: usize,
    /// Content links left alone because the destination already existed
    pub links_existing: usize,
    /// Processing time in seconds
    pub elapsed_seconds: f64,
    /// Documents per second
    pub docs_per_second: f64,
}

impl MigrationStats {
    /// Calculate documents per second
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.docs_per_second = self.documents_processed as f64 / self.elapsed_seconds;
        }
    }
}

/// Errors that abort a migration run
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Invalid profile '{profile}' for content model '{source_name}'")]
    ProfileNotFound { profile: String, source_name: String },

    #[error("Unexpected date format: {0}")]
    UnexpectedDateFormat(String),

    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Invalid date in field '{field}' row {row}: '{value}'")]
    InvalidDate {
        field: String,
        row: usize,
        value: String,
    },

    #[error("Source field '{0}' is not present in the archive")]
    UnknownSourceField(String),

    #[error("Content model error: {0}")]
    ContentModel(String),

    #[error("Collision snapshot error: {0}")]
    Snapshot(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for MigrationError {
    fn from(e: serde_yaml::Error) -> Self {
        MigrationError::ContentModel(e.to_string())
    }
}

impl From<bincode::Error> for MigrationError {
    fn from(e: bincode::Error) -> Self {
        MigrationError::Snapshot(e.to_string())
    }
}

impl From<csv::Error> for MigrationError {
    fn from(e: csv::Error) -> Self {
        MigrationError::Csv(e.to_string())
    }
}

impl From<quick_xml::Error> for MigrationError {
    fn from(e: quick_xml::Error) -> Self {
        MigrationError::Xml(e.to_string())
    }
}

/// Errors that skip a single document; the rest of the batch continues
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Invalid Type - Field '{field}' expected type: '{field_type}', received value: '{value}' for document: {document_id}")]
    InvalidDocument {
        field: String,
        field_type: FieldType,
        value: String,
        document_id: String,
    },

    #[error("No primary file for document: {document_id}")]
    MissingPrimaryFile { document_id: String },

    #[error("No substitute content with extension '{extension}' for document: {document_id}")]
    MissingSubstitute {
        extension: String,
        document_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_window_bounds() {
        let window = SequenceWindow::new(3, Some(5));
        assert!(!window.contains(2));
        assert!(window.contains(3));
        assert!(window.contains(5));
        assert!(!window.contains(6));

        let open = SequenceWindow::new(3, None);
        assert!(open.contains(u32::MAX));
        assert!(SequenceWindow::all().contains(0));
    }

    #[test]
    fn test_cell_value_emptiness() {
        assert!(CellValue::from("").is_empty());
        assert!(!CellValue::from("x").is_empty());
        let date = NaiveDateTime::parse_from_str("2020-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(!CellValue::Date(date).is_empty());
        assert_eq!(CellValue::Date(date).as_text(), None);
    }

    #[test]
    fn test_invalid_document_message() {
        let err = DocumentError::InvalidDocument {
            field: "uw:pageCount".to_string(),
            field_type: FieldType::Int,
            value: "twelve".to_string(),
            document_id: "1001".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid Type - Field 'uw:pageCount' expected type: 'int', received value: 'twelve' for document: 1001"
        );
    }

    #[test]
    fn test_stats_rate() {
        let mut stats = MigrationStats {
            documents_processed: 50,
            elapsed_seconds: 2.0,
            ..Default::default()
        };
        stats.update_rate();
        assert!((stats.docs_per_second - 25.0).abs() < f64::EPSILON);
    }
}
