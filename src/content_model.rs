//! Content model definitions
//!
//! A content model file is YAML with a `common` section shared by every
//! profile and a `content_models` list holding one entry per profile:
//!
//! ```yaml
//! common:
//!   aspects: [cm:titled]
//!   fields:
//!     - name: cm:title
//!   record_fields:
//!     - name: uw:recordId
//! content_models:
//!   - profile: finance
//!     content_type: uw:financeDocument
//!     aspects: [uw:record]
//!     fields:
//!       - name: cm:name
//!         source_field: dOriginalName
//!       - name: uw:pageCount
//!         type: int
//! ```
//!
//! Fields that omit `source_field` get one derived from the target name using
//! the legacy exporter's naming convention, see [`derive_source_field`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::migrate::MigrationError;

/// Aspect that pulls the common `record_fields` into a profile
pub const DEFAULT_RECORD_ASPECT: &str = "uw:record";

/// Tag the legacy exporter puts in front of custom metadata field names
pub const DEFAULT_SOURCE_FIELD_PREFIX: &str = "xuw";

/// How a field value is validated and rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Int,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target property and where its value comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Target property key, possibly namespaced (`cm:title`)
    pub name: String,
    /// Archive field the value is read from
    pub source_field: String,
    /// Value type
    pub field_type: FieldType,
}

/// Resolved mapping for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentModelDefinition {
    pub profile: String,
    pub content_type: String,
    pub aspects: Vec<String>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct ContentModelFile {
    common: CommonSection,
    content_models: Vec<ProfileSection>,
}

#[derive(Debug, Default, Deserialize)]
struct CommonSection {
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    record_fields: Vec<RawField>,
    #[serde(default)]
    aspects: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileSection {
    profile: String,
    content_type: String,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    aspects: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawField {
    name: String,
    #[serde(default)]
    source_field: Option<String>,
    #[serde(default, rename = "type")]
    field_type: FieldType,
}

/// Derive the archive field name for a target property.
///
/// Drops any namespace prefix, rewrites a trailing `Id` to `D`, upper-cases
/// the first remaining character and prepends `prefix`:
/// `uw:recordId` becomes `xuwRecordD` with the default prefix.
pub fn derive_source_field(prefix: &str, name: &str) -> String {
    let local = match name.find(':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };

    let local = match local.strip_suffix("Id") {
        Some(stem) => format!("{}D", stem),
        None => local.to_string(),
    };

    let mut chars = local.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", prefix, first.to_uppercase(), chars.as_str()),
        None => prefix.to_string(),
    }
}

/// Loads a [`ContentModelDefinition`] for one profile
#[derive(Debug, Clone)]
pub struct ContentModelLoader {
    record_aspect: String,
    source_field_prefix: String,
}

impl Default for ContentModelLoader {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_ASPECT, DEFAULT_SOURCE_FIELD_PREFIX)
    }
}

impl ContentModelLoader {
    pub fn new(record_aspect: impl Into<String>, source_field_prefix: impl Into<String>) -> Self {
        Self {
            record_aspect: record_aspect.into(),
            source_field_prefix: source_field_prefix.into(),
        }
    }

    /// Load `profile` from a content model file
    pub fn load(&self, path: &Path, profile: &str) -> Result<ContentModelDefinition, MigrationError> {
        let yaml = std::fs::read_to_string(path)?;
        self.load_from_str(&yaml, &path.display().to_string(), profile)
    }

    /// Load `profile` from YAML text. `source_name` only appears in errors.
    pub fn load_from_str(
        &self,
        yaml: &str,
        source_name: &str,
        profile: &str,
    ) -> Result<ContentModelDefinition, MigrationError> {
        let file: ContentModelFile = serde_yaml::from_str(yaml)?;

        let section = file
            .content_models
            .into_iter()
            .find(|m| m.profile == profile)
            .ok_or_else(|| MigrationError::ProfileNotFound {
                profile: profile.to_string(),
                source_name: source_name.to_string(),
            })?;

        let mut fields = self.resolve_fields(section.fields);
        fields.extend(self.resolve_fields(file.common.fields));

        let mut aspects = file.common.aspects;
        aspects.extend(section.aspects);

        if aspects.iter().any(|a| *a == self.record_aspect) {
            fields.extend(self.resolve_fields(file.common.record_fields));
        }

        debug!(
            "Loaded profile '{}' ({}): {} fields, {} aspects",
            section.profile,
            section.content_type,
            fields.len(),
            aspects.len()
        );

        Ok(ContentModelDefinition {
            profile: section.profile,
            content_type: section.content_type,
            aspects,
            fields,
        })
    }

    fn resolve_fields(&self, raw: Vec<RawField>) -> Vec<Field> {
        raw.into_iter()
            .map(|f| {
                let source_field = f
                    .source_field
                    .unwrap_or_else(|| derive_source_field(&self.source_field_prefix, &f.name));
                Field {
                    name: f.name,
                    source_field,
                    field_type: f.field_type,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"
common:
  aspects:
    - cm:titled
  fields:
    - name: cm:title
      source_field: dDocTitle
    - name: cm:description
  record_fields:
    - name: uw:recordId
    - name: uw:recordDate
      type: date
content_models:
  - profile: general
    content_type: cm:content
    fields:
      - name: cm:name
        source_field: primaryFile
  - profile: finance
    content_type: uw:financeDocument
    aspects:
      - uw:record
    fields:
      - name: cm:name
        source_field: primaryFile
      - name: uw:pageCount
        type: int
"#;

    fn names(def: &ContentModelDefinition) -> Vec<&str> {
        def.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_derive_source_field() {
        assert_eq!(derive_source_field("xuw", "uw:recordId"), "xuwRecordD");
        assert_eq!(derive_source_field("xuw", "cm:description"), "xuwDescription");
        assert_eq!(derive_source_field("xuw", "expirationDate"), "xuwExpirationDate");
        assert_eq!(derive_source_field("xuw", "uw:Id"), "xuwD");
        assert_eq!(derive_source_field("xuw", "uw:"), "xuw");
    }

    #[test]
    fn test_general_profile_merges_common_fields() {
        let def = ContentModelLoader::default()
            .load_from_str(MODEL, "model.yml", "general")
            .unwrap();

        assert_eq!(def.content_type, "cm:content");
        assert_eq!(def.aspects, vec!["cm:titled"]);
        assert_eq!(names(&def), vec!["cm:name", "cm:title", "cm:description"]);
        assert_eq!(def.fields[1].source_field, "dDocTitle");
        assert_eq!(def.fields[2].source_field, "xuwDescription");
        assert_eq!(def.fields[2].field_type, FieldType::Text);
    }

    #[test]
    fn test_record_aspect_adds_record_fields() {
        let def = ContentModelLoader::default()
            .load_from_str(MODEL, "model.yml", "finance")
            .unwrap();

        assert_eq!(def.aspects, vec!["cm:titled", "uw:record"]);
        assert_eq!(
            names(&def),
            vec![
                "cm:name",
                "uw:pageCount",
                "cm:title",
                "cm:description",
                "uw:recordId",
                "uw:recordDate"
            ]
        );
        assert_eq!(def.fields[1].field_type, FieldType::Int);
        assert_eq!(def.fields[4].source_field, "xuwRecordD");
        assert_eq!(def.fields[5].field_type, FieldType::Date);
    }

    #[test]
    fn test_custom_record_aspect_and_prefix() {
        let loader = ContentModelLoader::new("cm:titled", "xab");
        let def = loader.load_from_str(MODEL, "model.yml", "general").unwrap();
        assert_eq!(def.fields.len(), 5);
        assert_eq!(def.fields[2].source_field, "xabDescription");
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        let err = ContentModelLoader::default()
            .load_from_str(MODEL, "model.yml", "legal")
            .unwrap_err();
        match err {
            MigrationError::ProfileNotFound { profile, source_name } => {
                assert_eq!(profile, "legal");
                assert_eq!(source_name, "model.yml");
            }
            other => panic!("Expected ProfileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let result = ContentModelLoader::default().load_from_str("common: [", "bad.yml", "general");
        assert!(matches!(result, Err(MigrationError::ContentModel(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content-model.yml");
        std::fs::write(&path, MODEL).unwrap();

        let def = ContentModelLoader::default().load(&path, "finance").unwrap();
        assert_eq!(def.profile, "finance");
    }
}
