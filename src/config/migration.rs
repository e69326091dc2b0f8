//! Migration pipeline configuration

use serde::{Deserialize, Serialize};

use crate::content_model::{DEFAULT_RECORD_ASPECT, DEFAULT_SOURCE_FIELD_PREFIX};
use crate::migrate::sequencer::{
    DEFAULT_ARCHIVE_EXTENSION, DEFAULT_COUNT_DIR, DEFAULT_DEFINITIONS_FILE,
};

/// Settings that rarely change between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Extension (without dot) of archive files
    pub archive_extension: String,
    /// Definitions file in the input directory that is never migrated
    pub definitions_file: String,
    /// Directory under the output root for collision snapshots
    pub count_dir: String,
    /// Aspect that pulls the common `record_fields` into a profile
    pub record_aspect: String,
    /// Prefix for derived source field names
    pub source_field_prefix: String,
    /// Validate int and date values before writing
    pub validate: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            definitions_file: DEFAULT_DEFINITIONS_FILE.to_string(),
            count_dir: DEFAULT_COUNT_DIR.to_string(),
            record_aspect: DEFAULT_RECORD_ASPECT.to_string(),
            source_field_prefix: DEFAULT_SOURCE_FIELD_PREFIX.to_string(),
            validate: false,
        }
    }
}
