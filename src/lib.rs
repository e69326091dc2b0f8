//! hdamigrate: legacy HDA archive migration
//!
//! Converts the sequence-numbered text archives of a document-management
//! export into a staging tree for a bulk importer, featuring:
//! - Content model profiles loaded from YAML
//! - Strict line-oriented HDA parsing with date normalization
//! - Java-properties XML metadata files with optional type validation
//! - Output name collision counting that survives split runs
//! - Content links to real or substitute files
//! - CSV audit trail of every parsed record

pub mod config;
pub mod content_model;
pub mod migrate;
pub mod util;

pub use config::Config;
pub use content_model::{ContentModelDefinition, ContentModelLoader, Field, FieldType};
pub use migrate::{BatchSequencer, BatchSequencerBuilder, MigrationError, MigrationStats};
