//! Flat CSV audit trail of every parsed record

use csv::{QuoteStyle, Writer, WriterBuilder};
use std::fs::File;
use std::path::Path;
use tracing::info;

use super::source::{MigrationError, WebcenterDataset};

/// Appends the rows of each processed archive to one CSV file.
///
/// The header is taken from the first dataset written.
pub struct AuditWriter {
    writer: Writer<File>,
    header_written: bool,
    rows_written: usize,
}

impl AuditWriter {
    pub fn create(path: &Path) -> Result<Self, MigrationError> {
        info!("Writing to csv: {}", path.display());
        let writer = WriterBuilder::new()
            .delimiter(b',')
            .quote(b'|')
            .quote_style(QuoteStyle::Necessary)
            .flexible(true)
            .from_path(path)?;
        Ok(Self {
            writer,
            header_written: false,
            rows_written: 0,
        })
    }

    /// Append every row of `dataset`
    pub fn write_dataset(&mut self, dataset: &WebcenterDataset) -> Result<usize, MigrationError> {
        if !self.header_written {
            self.writer.write_record(&dataset.field_names)?;
            self.header_written = true;
        }

        for row in &dataset.rows {
            self.writer
                .write_record(row.iter().map(|cell| cell.to_audit_string()))?;
        }
        self.writer.flush()?;

        self.rows_written += dataset.rows.len();
        Ok(dataset.rows.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}
