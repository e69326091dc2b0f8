//! Timestamp normalization for archive date columns
//!
//! Archives store dates as a quoted literal inside an escape wrapper, e.g.
//! `{ts '2019-03-04 10:15:00.000'}`. The header's date format key pins the
//! layout; [`normalize_dates`] turns every non-empty cell of a date column
//! into a [`NaiveDateTime`].

use chrono::{NaiveDateTime, Timelike};

use super::source::{CellValue, MigrationError, WebcenterDataset};

/// Layout of the quoted timestamp literal
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Convert every date column of `dataset` in place.
///
/// Returns the number of converted cells. Empty cells stay empty.
pub fn normalize_dates(dataset: &mut WebcenterDataset) -> Result<usize, MigrationError> {
    let columns: Vec<(usize, String)> = dataset
        .field_names
        .iter()
        .enumerate()
        .filter(|(_, name)| dataset.date_fields.contains(name))
        .map(|(idx, name)| (idx, name.clone()))
        .collect();

    let mut converted = 0;
    for (row_idx, row) in dataset.rows.iter_mut().enumerate() {
        for (col, field) in &columns {
            let Some(cell) = row.get_mut(*col) else {
                continue;
            };
            let CellValue::Text(raw) = cell else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }

            let parsed = parse_embedded_timestamp(raw).ok_or_else(|| MigrationError::InvalidDate {
                field: field.clone(),
                row: row_idx,
                value: raw.clone(),
            })?;
            *cell = CellValue::Date(parsed);
            converted += 1;
        }
    }

    Ok(converted)
}

/// Extract and parse the timestamp literal from a raw cell.
///
/// The literal is the first quote-delimited segment that starts with a digit;
/// anything after the seconds fraction is ignored.
pub fn parse_embedded_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let segment = raw
        .split('\'')
        .find(|s| s.starts_with(|c: char| c.is_ascii_digit()))?;

    let end = segment
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | ':' | '.' | ' ')))
        .unwrap_or(segment.len());
    let literal = segment[..end].trim_end().trim_end_matches('.');

    NaiveDateTime::parse_from_str(literal, TIMESTAMP_FORMAT).ok()
}

/// ISO-8601 rendering: `2020-01-01T00:00:00`, with microseconds only when non-zero
pub fn to_iso8601(value: &NaiveDateTime) -> String {
    with_micros(value, "%Y-%m-%dT%H:%M:%S")
}

/// Space-separated rendering used in the CSV audit trail
pub fn to_audit_string(value: &NaiveDateTime) -> String {
    with_micros(value, "%Y-%m-%d %H:%M:%S")
}

fn with_micros(value: &NaiveDateTime, layout: &str) -> String {
    let base = value.format(layout).to_string();
    let micros = value.nanosecond() / 1_000;
    if micros == 0 {
        base
    } else {
        format!("{}.{:06}", base, micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_model::ContentModelDefinition;
    use std::path::PathBuf;

    fn dataset(rows: Vec<Vec<&str>>) -> WebcenterDataset {
        WebcenterDataset {
            definition: ContentModelDefinition {
                profile: "general".to_string(),
                content_type: "cm:content".to_string(),
                aspects: vec![],
                fields: vec![],
            },
            field_names: vec!["dID".to_string(), "dInDate".to_string(), "dOutDate".to_string()],
            date_fields: vec!["dInDate".to_string(), "dOutDate".to_string()],
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(CellValue::from).collect())
                .collect(),
            base_dir: PathBuf::from("/archive"),
            batch_id: "batch".to_string(),
        }
    }

    #[test]
    fn test_parse_escaped_literal() {
        let dt = parse_embedded_timestamp("{ts '2019-03-04 10:15:00.000'}").unwrap();
        assert_eq!(to_iso8601(&dt), "2019-03-04T10:15:00");
    }

    #[test]
    fn test_parse_literal_with_format_residue() {
        let dt = parse_embedded_timestamp("'{ts '2020-01-01 00:00:00.0{.0}[Z]'''}'").unwrap();
        assert_eq!(to_iso8601(&dt), "2020-01-01T00:00:00");
    }

    #[test]
    fn test_fractional_seconds_round_trip() {
        let dt = parse_embedded_timestamp("{ts '2018-11-30 23:59:58.250'}").unwrap();
        assert_eq!(to_iso8601(&dt), "2018-11-30T23:59:58.250000");
        assert_eq!(to_audit_string(&dt), "2018-11-30 23:59:58.250000");

        let reparsed = NaiveDateTime::parse_from_str(&to_iso8601(&dt), "%Y-%m-%dT%H:%M:%S%.f").unwrap();
        assert_eq!(reparsed, dt);
    }

    #[test]
    fn test_unparseable_literal() {
        assert!(parse_embedded_timestamp("{ts 'yesterday'}").is_none());
        assert!(parse_embedded_timestamp("").is_none());
    }

    #[test]
    fn test_normalize_dates_converts_declared_columns() {
        let mut data = dataset(vec![
            vec!["1", "{ts '2019-03-04 10:15:00.000'}", ""],
            vec!["2", "", "{ts '2021-07-01 08:00:00.000'}"],
        ]);

        let converted = normalize_dates(&mut data).unwrap();
        assert_eq!(converted, 2);
        assert!(matches!(data.rows[0][1], CellValue::Date(_)));
        assert_eq!(data.rows[0][2], CellValue::from(""));
        assert_eq!(data.rows[1][1], CellValue::from(""));
        assert!(matches!(data.rows[1][2], CellValue::Date(_)));
        assert_eq!(data.rows[0][0], CellValue::from("1"));
    }

    #[test]
    fn test_normalize_dates_rejects_garbage() {
        let mut data = dataset(vec![vec!["1", "not a date", ""]]);
        let err = normalize_dates(&mut data).unwrap_err();
        match err {
            MigrationError::InvalidDate { field, row, value } => {
                assert_eq!(field, "dInDate");
                assert_eq!(row, 0);
                assert_eq!(value, "not a date");
            }
            other => panic!("Expected InvalidDate, got {:?}", other),
        }
    }
}
