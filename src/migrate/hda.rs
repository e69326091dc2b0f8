//! HDA archive parser
//!
//! An export archive is a line-oriented text file:
//!
//! ```text
//! <?hda version="11.1.1.9.0" jcharset=UTF8 encoding=utf-8?>
//! @Properties LocalData
//! blFieldTypes=dInDate date,dOutDate date
//! blDateFormat='{ts' ''yyyy-MM-dd HH:mm:ss{.SSS}[Z]'''}'!tAmerica/Los_Angeles
//! NumRows=2
//! @end
//! @ResultSet ExportResults
//! 3                 <- fields per record
//! dID 3 30          <- one line per field, name first
//! primaryFile 6 255
//! dInDate 5 0
//! 1001              <- records, one cell per line, row-major
//! vault/a.pdf
//! {ts '2019-03-04 10:15:00.000'}
//! ...
//! @end
//! ```
//!
//! Cells are assigned to fields purely by position, so every line must be
//! consumed in order.

use chrono::Local;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::content_model::ContentModelDefinition;

use super::source::{CellValue, MigrationError, ParsedRow, WebcenterDataset};

/// The only date format the archive may declare
pub const EXPECTED_DATE_FORMAT: &str =
    "'{ts' ''yyyy-MM-dd HH:mm:ss{.SSS}[Z]'''}'!tAmerica/Los_Angeles";

/// Synthetic field holding the archive's parent directory name
pub const BATCH_ID_FIELD: &str = "wccArchiverBatchId";

/// Synthetic field holding the tool version and run timestamp
pub const RUN_STAMP_FIELD: &str = "wccMigrationRunStamp";

const RESULT_SET_MARKER: &str = "@ResultSet ExportResults";
const END_MARKER: &str = "@end";
const FIELD_TYPES_KEY: &str = "blFieldTypes=";
const DATE_FORMAT_KEY: &str = "blDateFormat=";
const ROW_COUNT_KEY: &str = "NumRows=";

/// Stamp identifying this run: crate version plus local wall-clock time
pub fn run_stamp_now() -> String {
    format!(
        "{} {}",
        env!("CARGO_PKG_VERSION"),
        Local::now().format("%Y-%m-%dT%H:%M:%S")
    )
}

#[derive(Debug, Default)]
struct ArchiveHeader {
    date_fields: Vec<String>,
    row_count: usize,
}

/// Line reader that tracks position for error messages
struct LineReader<R> {
    inner: R,
    line_no: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            buf: Vec::new(),
        }
    }

    /// Next line without its line terminator, `None` at end of file.
    ///
    /// Bytes that are not valid UTF-8 become U+FFFD.
    fn next_line(&mut self) -> Result<Option<String>, MigrationError> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let mut line = String::from_utf8_lossy(&self.buf).into_owned();
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn require_line(&mut self, expecting: &str) -> Result<String, MigrationError> {
        self.next_line()?.ok_or_else(|| {
            MigrationError::MalformedArchive(format!(
                "unexpected end of file after line {} while reading {}",
                self.line_no, expecting
            ))
        })
    }
}

/// Parses one archive into a [`WebcenterDataset`]
pub struct HdaParser<'a> {
    definition: &'a ContentModelDefinition,
    row_limit: Option<usize>,
    run_stamp: String,
}

impl<'a> HdaParser<'a> {
    pub fn new(definition: &'a ContentModelDefinition) -> Self {
        Self {
            definition,
            row_limit: None,
            run_stamp: run_stamp_now(),
        }
    }

    /// Read at most `limit` rows; the end marker is not checked when set
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    /// Use a fixed run stamp instead of the current time
    pub fn with_run_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.run_stamp = stamp.into();
        self
    }

    /// Parse an archive file.
    ///
    /// The batch id is the archive's parent directory name; primary file paths
    /// are resolved against the grandparent directory.
    pub fn parse_file(&self, path: &Path) -> Result<WebcenterDataset, MigrationError> {
        match self.row_limit {
            Some(n) => info!("Processing {} documents from file: {}", n, path.display()),
            None => info!("Processing all documents from file: {}", path.display()),
        }

        let parent = path.parent();
        let batch_id = parent
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let base_dir = parent
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let file = File::open(path)?;
        self.parse_reader(BufReader::new(file), &batch_id, base_dir)
    }

    /// Parse archive text from any buffered reader
    pub fn parse_reader<R: BufRead>(
        &self,
        reader: R,
        batch_id: &str,
        base_dir: PathBuf,
    ) -> Result<WebcenterDataset, MigrationError> {
        let mut lines = LineReader::new(reader);

        let header = parse_header(&mut lines)?;

        let count_line = lines.require_line("field count")?;
        let field_count: usize = count_line.trim().parse().map_err(|_| {
            MigrationError::MalformedArchive(format!(
                "line {}: expected field count, found '{}'",
                lines.line_no, count_line
            ))
        })?;

        let mut field_names = Vec::new();
        for _ in 0..field_count {
            let line = lines.require_line("field names")?;
            let name = line.split_whitespace().next().unwrap_or_default();
            field_names.push(name.to_string());
        }
        field_names.push(BATCH_ID_FIELD.to_string());
        field_names.push(RUN_STAMP_FIELD.to_string());

        let row_count = match self.row_limit {
            Some(limit) => limit.min(header.row_count),
            None => header.row_count,
        };
        debug!("Reading {} rows of {} fields", row_count, field_count);

        // Counts come from the header and are untrusted until the lines are read
        let mut rows: Vec<ParsedRow> = Vec::new();
        for _ in 0..row_count {
            let mut row = Vec::new();
            for _ in 0..field_count {
                let line = lines.require_line("records")?;
                row.push(CellValue::Text(line.trim_end().to_string()));
            }
            row.push(CellValue::from(batch_id));
            row.push(CellValue::Text(self.run_stamp.clone()));
            rows.push(row);
        }

        if self.row_limit.is_none() {
            let trailer = lines.next_line()?.unwrap_or_default();
            if trailer.trim_end() != END_MARKER {
                return Err(MigrationError::MalformedArchive(format!(
                    "expected '{}' found '{}'",
                    END_MARKER, trailer
                )));
            }
        }

        Ok(WebcenterDataset {
            definition: self.definition.clone(),
            field_names,
            date_fields: header.date_fields,
            rows,
            base_dir,
            batch_id: batch_id.to_string(),
        })
    }
}

fn parse_header<R: BufRead>(lines: &mut LineReader<R>) -> Result<ArchiveHeader, MigrationError> {
    let mut header = ArchiveHeader::default();

    loop {
        let line = lines.require_line("archive header")?;
        if line.starts_with(RESULT_SET_MARKER) {
            return Ok(header);
        }

        if let Some(value) = line.strip_prefix(FIELD_TYPES_KEY) {
            header.date_fields = value
                .trim_end()
                .split(',')
                .filter_map(|pair| {
                    pair.trim_matches(|c: char| c == '\'' || c.is_whitespace())
                        .split(' ')
                        .next()
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                })
                .collect();
        } else if let Some(value) = line.strip_prefix(DATE_FORMAT_KEY) {
            if value.trim_end() != EXPECTED_DATE_FORMAT {
                return Err(MigrationError::UnexpectedDateFormat(line));
            }
        } else if let Some(value) = line.strip_prefix(ROW_COUNT_KEY) {
            header.row_count = value.trim().parse().map_err(|_| {
                MigrationError::MalformedArchive(format!(
                    "line {}: invalid row count '{}'",
                    lines.line_no, value
                ))
            })?;
        }
    }
}
