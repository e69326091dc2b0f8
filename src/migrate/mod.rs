//! Migration pipeline for legacy HDA archive exports
//!
//! Turns a directory of sequence-numbered HDA archives into property files
//! plus content links laid out for a bulk importer.
//!
//! # Example Usage
//!
//! ```no_run
//! use hdamigrate::content_model::ContentModelLoader;
//! use hdamigrate::migrate::{BatchSequencerBuilder, SequenceWindow};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let definition = ContentModelLoader::default()
//!     .load(Path::new("content_models.yml"), "finance")?;
//!
//! let sequencer = BatchSequencerBuilder::new("exports/batch", "staging", definition)
//!     .with_window(SequenceWindow::new(1, Some(20)))
//!     .with_validation(true)
//!     .build()?;
//!
//! let stats = sequencer.run()?;
//! println!("Wrote {} documents", stats.documents_written);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//!  BatchSequencer (discover, order, filter archives)
//!        │
//!        │ per archive, in sequence order
//!        ▼
//!  HdaParser ──► DateNormalizer ──► AuditWriter (optional CSV)
//!                     │
//!                     ▼ per record
//!  PropertyXmlWriter ──► CollisionResolver ──► ContentLinker
//!        │
//!        ▼
//!  count_files/<archive>.count  (seeds the next archive)
//! ```

pub mod audit;
pub mod collision;
pub mod dates;
pub mod hda;
pub mod linker;
pub mod progress;
pub mod properties;
pub mod sequencer;
pub mod source;

// Re-export main types
pub use audit::AuditWriter;
pub use collision::{CollisionCounts, CollisionResolver};
pub use hda::HdaParser;
pub use linker::{ContentLinker, LinkOutcome, SubstituteContent};
pub use progress::MigrationProgress;
pub use properties::{PropertyDocument, PropertyEntry, PropertyXmlWriter};
pub use sequencer::{discover_archives, ArchiveFile, BatchSequencer, BatchSequencerBuilder};
pub use source::{
    CellValue, DocumentError, MigrationError, MigrationStats, ParsedRow, SequenceWindow,
    WebcenterDataset,
};
