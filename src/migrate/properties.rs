//! Property file rendering
//!
//! Each record becomes a `<name>.metadata.properties.xml` file in the Java
//! properties XML dialect the bulk importer reads:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE properties SYSTEM "http://java.sun.com/dtd/properties.dtd">
//! <properties>
//!   <entry key="type">cm:content</entry>
//!   <entry key="aspects">cm:titled,uw:record</entry>
//!   <entry key="cm:title">Quarterly report</entry>
//! </properties>
//! ```

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::content_model::{ContentModelDefinition, Field, FieldType};
use crate::util::{base_name, split_extension};

use super::dates::to_iso8601;
use super::source::{CellValue, DocumentError, MigrationError, ParsedRow, WebcenterDataset};

/// Internal subset of the DOCTYPE line
pub const PROPERTIES_DOCTYPE: &str = r#"properties SYSTEM "http://java.sun.com/dtd/properties.dtd""#;

/// Appended to the resolved base name to form the property file name
pub const PROPERTIES_SUFFIX: &str = ".metadata.properties.xml";

/// Archive field naming the record's content file
pub const PRIMARY_FILE_FIELD: &str = "primaryFile";

const NAME_PROPERTY: &str = "cm:name";

/// One `<entry key="...">value</entry>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub key: String,
    pub value: String,
}

impl PropertyEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered entries of one property file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyDocument {
    pub entries: Vec<PropertyEntry>,
}

impl PropertyDocument {
    /// Value of the first entry with `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Serialize with XML declaration and DOCTYPE
    pub fn to_xml(&self) -> Result<String, MigrationError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::DocType(BytesText::from_escaped(PROPERTIES_DOCTYPE)))?;
        writer.write_event(Event::Start(BytesStart::new("properties")))?;

        for entry in &self.entries {
            let start = BytesStart::new("entry").with_attributes([("key", entry.key.as_str())]);
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(&entry.value)))?;
            writer.write_event(Event::End(BytesEnd::new("entry")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("properties")))?;

        let mut xml =
            String::from_utf8(writer.into_inner()).map_err(|e| MigrationError::Xml(e.to_string()))?;
        xml.push('\n');
        Ok(xml)
    }
}

/// A content model field bound to its column in the dataset
#[derive(Debug, Clone, Copy)]
pub struct FieldBinding<'a> {
    pub field: &'a Field,
    pub column: usize,
}

/// `type` entry
pub fn build_content_type_entry(definition: &ContentModelDefinition) -> PropertyEntry {
    PropertyEntry::new("type", definition.content_type.as_str())
}

/// `aspects` entry, omitted when the profile has no aspects
pub fn build_aspects_entry(definition: &ContentModelDefinition) -> Option<PropertyEntry> {
    if definition.aspects.is_empty() {
        None
    } else {
        Some(PropertyEntry::new("aspects", definition.aspects.join(",")))
    }
}

/// Entries for every mapped field of one row.
///
/// Empty `int` and `date` values are left out. With `validate`, a value that
/// does not fit its field type rejects the whole document.
pub fn build_field_entries(
    bindings: &[FieldBinding<'_>],
    row: &ParsedRow,
    primary_extension: &str,
    validate: bool,
    document_id: &str,
) -> Result<Vec<PropertyEntry>, DocumentError> {
    let empty = CellValue::Text(String::new());
    let mut entries = Vec::with_capacity(bindings.len());

    for binding in bindings {
        let value = row.get(binding.column).unwrap_or(&empty);

        if validate {
            validate_value(binding.field, value, document_id)?;
        }

        if let Some(text) = render_value(binding.field, value, primary_extension) {
            entries.push(PropertyEntry::new(binding.field.name.as_str(), text));
        }
    }

    Ok(entries)
}

fn validate_value(field: &Field, value: &CellValue, document_id: &str) -> Result<(), DocumentError> {
    let valid = match (field.field_type, value) {
        (_, v) if v.is_empty() => true,
        (FieldType::Text, _) => true,
        (FieldType::Int, CellValue::Text(s)) => s.trim().parse::<i64>().is_ok(),
        (FieldType::Int, CellValue::Date(_)) => false,
        (FieldType::Date, CellValue::Date(_)) => true,
        (FieldType::Date, CellValue::Text(_)) => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DocumentError::InvalidDocument {
            field: field.name.clone(),
            field_type: field.field_type,
            value: value.to_audit_string(),
            document_id: document_id.to_string(),
        })
    }
}

fn render_value(field: &Field, value: &CellValue, primary_extension: &str) -> Option<String> {
    let mut text = match value {
        CellValue::Text(s) => s.clone(),
        CellValue::Date(d) => to_iso8601(d),
    };

    if field.name == NAME_PROPERTY && !text.contains('.') {
        text.push_str(primary_extension);
    }

    match field.field_type {
        FieldType::Int | FieldType::Date if text.is_empty() => None,
        _ => Some(text),
    }
}

/// Renders the property documents of one dataset
pub struct PropertyXmlWriter<'a> {
    dataset: &'a WebcenterDataset,
    bindings: Vec<FieldBinding<'a>>,
    primary_column: usize,
    validate: bool,
}

impl<'a> PropertyXmlWriter<'a> {
    /// Bind every content model field to a dataset column.
    ///
    /// Fails if the archive lacks `primaryFile` or any mapped source field.
    pub fn new(dataset: &'a WebcenterDataset, validate: bool) -> Result<Self, MigrationError> {
        let primary_column = dataset
            .column(PRIMARY_FILE_FIELD)
            .ok_or_else(|| MigrationError::UnknownSourceField(PRIMARY_FILE_FIELD.to_string()))?;

        let bindings = dataset
            .definition
            .fields
            .iter()
            .map(|field| {
                dataset
                    .column(&field.source_field)
                    .map(|column| FieldBinding { field, column })
                    .ok_or_else(|| MigrationError::UnknownSourceField(field.source_field.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dataset,
            bindings,
            primary_column,
            validate,
        })
    }

    /// Relative primary file path of a row
    pub fn primary_file(&self, row: usize) -> &str {
        self.dataset.rows[row]
            .get(self.primary_column)
            .and_then(CellValue::as_text)
            .unwrap_or_default()
    }

    /// Last path segment of the primary file; the candidate output base name
    pub fn primary_file_name(&self, row: usize) -> &str {
        base_name(self.primary_file(row))
    }

    /// Extension of the primary file, with its leading dot
    pub fn primary_extension(&self, row: usize) -> &str {
        split_extension(self.primary_file_name(row)).1
    }

    /// Identifier reported in errors: the row's first cell
    pub fn document_id(&self, row: usize) -> String {
        self.dataset.rows[row]
            .first()
            .map(CellValue::to_audit_string)
            .unwrap_or_default()
    }

    /// Build the property document for one row
    pub fn render(&self, row: usize) -> Result<PropertyDocument, DocumentError> {
        let definition = &self.dataset.definition;
        let mut entries = vec![build_content_type_entry(definition)];
        entries.extend(build_aspects_entry(definition));
        entries.extend(build_field_entries(
            &self.bindings,
            &self.dataset.rows[row],
            self.primary_extension(row),
            self.validate,
            &self.document_id(row),
        )?);
        Ok(PropertyDocument { entries })
    }
}

/// Write `xml` as `<output_dir>/<base_name>.metadata.properties.xml`
pub fn write_property_file(
    xml: &str,
    output_dir: &Path,
    base_name: &str,
) -> Result<PathBuf, MigrationError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}{}", base_name, PROPERTIES_SUFFIX));
    debug!("Writing properties: {}", path.display());
    fs::write(&path, xml)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::dates::parse_embedded_timestamp;
    use std::path::PathBuf;

    fn field(name: &str, source: &str, field_type: FieldType) -> Field {
        Field {
            name: name.to_string(),
            source_field: source.to_string(),
            field_type,
        }
    }

    fn dataset(aspects: Vec<&str>, rows: Vec<Vec<CellValue>>) -> WebcenterDataset {
        WebcenterDataset {
            definition: ContentModelDefinition {
                profile: "finance".to_string(),
                content_type: "uw:financeDocument".to_string(),
                aspects: aspects.into_iter().map(String::from).collect(),
                fields: vec![
                    field("cm:name", "dOriginalName", FieldType::Text),
                    field("cm:title", "dDocTitle", FieldType::Text),
                    field("uw:pageCount", "xuwPageCount", FieldType::Int),
                    field("uw:recordDate", "dInDate", FieldType::Date),
                ],
            },
            field_names: ["dID", "primaryFile", "dOriginalName", "dDocTitle", "xuwPageCount", "dInDate"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            date_fields: vec!["dInDate".to_string()],
            rows,
            base_dir: PathBuf::from("/exports"),
            batch_id: "batch".to_string(),
        }
    }

    fn row(id: &str, primary: &str, name: &str, pages: &str, date: Option<&str>) -> Vec<CellValue> {
        vec![
            CellValue::from(id),
            CellValue::from(primary),
            CellValue::from(name),
            CellValue::from("Quarterly <report> & notes"),
            CellValue::from(pages),
            match date {
                Some(raw) => CellValue::Date(parse_embedded_timestamp(raw).unwrap()),
                None => CellValue::from(""),
            },
        ]
    }

    #[test]
    fn test_render_document() {
        let data = dataset(
            vec!["cm:titled", "uw:record"],
            vec![row("1001", "vault/2019/q1.pdf", "q1", "12", Some("{ts '2019-03-04 10:15:00.000'}"))],
        );
        let writer = PropertyXmlWriter::new(&data, true).unwrap();
        let doc = writer.render(0).unwrap();

        assert_eq!(doc.entries[0], PropertyEntry::new("type", "uw:financeDocument"));
        assert_eq!(doc.get("aspects"), Some("cm:titled,uw:record"));
        assert_eq!(doc.get("cm:name"), Some("q1.pdf"));
        assert_eq!(doc.get("uw:pageCount"), Some("12"));
        assert_eq!(doc.get("uw:recordDate"), Some("2019-03-04T10:15:00"));
        assert_eq!(writer.primary_file_name(0), "q1.pdf");
        assert_eq!(writer.primary_extension(0), ".pdf");
    }

    #[test]
    fn test_name_with_extension_is_kept() {
        let data = dataset(vec![], vec![row("1", "a.pdf", "scan.tiff", "", None)]);
        let doc = PropertyXmlWriter::new(&data, false).unwrap().render(0).unwrap();
        assert_eq!(doc.get("cm:name"), Some("scan.tiff"));
    }

    #[test]
    fn test_empty_int_and_date_are_omitted() {
        let data = dataset(vec![], vec![row("1", "a.pdf", "a", "", None)]);
        let doc = PropertyXmlWriter::new(&data, true).unwrap().render(0).unwrap();

        assert_eq!(doc.get("aspects"), None);
        assert_eq!(doc.get("uw:pageCount"), None);
        assert_eq!(doc.get("uw:recordDate"), None);
        assert_eq!(doc.entries.len(), 3);
    }

    #[test]
    fn test_invalid_int_rejects_document() {
        let data = dataset(vec![], vec![row("1001", "a.pdf", "a", "twelve", None)]);
        let err = PropertyXmlWriter::new(&data, true).unwrap().render(0).unwrap_err();
        assert_eq!(
            err,
            DocumentError::InvalidDocument {
                field: "uw:pageCount".to_string(),
                field_type: FieldType::Int,
                value: "twelve".to_string(),
                document_id: "1001".to_string(),
            }
        );
    }

    #[test]
    fn test_unconverted_date_rejects_document() {
        let mut data = dataset(vec![], vec![row("7", "a.pdf", "a", "", None)]);
        data.rows[0][5] = CellValue::from("last tuesday");
        let writer = PropertyXmlWriter::new(&data, true).unwrap();
        assert!(matches!(
            writer.render(0),
            Err(DocumentError::InvalidDocument { ref field, .. }) if field == "uw:recordDate"
        ));
    }

    #[test]
    fn test_validation_disabled_keeps_raw_value() {
        let data = dataset(vec![], vec![row("1001", "a.pdf", "a", "twelve", None)]);
        let doc = PropertyXmlWriter::new(&data, false).unwrap().render(0).unwrap();
        assert_eq!(doc.get("uw:pageCount"), Some("twelve"));
    }

    #[test]
    fn test_missing_source_field_is_fatal() {
        let mut data = dataset(vec![], vec![]);
        data.definition.fields.push(field("uw:owner", "xuwOwner", FieldType::Text));
        match PropertyXmlWriter::new(&data, false) {
            Err(MigrationError::UnknownSourceField(name)) => assert_eq!(name, "xuwOwner"),
            _ => panic!("Expected UnknownSourceField"),
        }
    }

    #[test]
    fn test_xml_layout() {
        let doc = PropertyDocument {
            entries: vec![
                PropertyEntry::new("type", "cm:content"),
                PropertyEntry::new("cm:title", "R&D <draft>"),
                PropertyEntry::new("cm:description", ""),
            ],
        };
        let xml = doc.to_xml().unwrap();
        let lines: Vec<&str> = xml.lines().collect();

        assert_eq!(lines[0], r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        assert_eq!(
            lines[1],
            r#"<!DOCTYPE properties SYSTEM "http://java.sun.com/dtd/properties.dtd">"#
        );
        assert_eq!(lines[2], "<properties>");
        assert!(xml.contains(r#"<entry key="type">cm:content</entry>"#));
        assert!(xml.contains(r#"<entry key="cm:title">R&amp;D &lt;draft&gt;</entry>"#));
        assert!(xml.contains(r#"<entry key="cm:description"></entry>"#));
        assert!(xml.trim_end().ends_with("</properties>"));
    }

    #[test]
    fn test_write_property_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("3");
        let path = write_property_file("<properties/>\n", &out, "a(1).pdf").unwrap();
        assert_eq!(path, out.join("a(1).pdf.metadata.properties.xml"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<properties/>\n");
    }
}
