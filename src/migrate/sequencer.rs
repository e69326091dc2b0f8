//! Batch sequencer that drives a migration run over an archive directory

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::content_model::ContentModelDefinition;

use super::audit::AuditWriter;
use super::collision::CollisionResolver;
use super::dates::normalize_dates;
use super::hda::{run_stamp_now, HdaParser};
use super::linker::{ContentLinker, LinkOutcome, SubstituteContent};
use super::progress::MigrationProgress;
use super::properties::{write_property_file, PropertyXmlWriter};
use super::source::{DocumentError, MigrationError, MigrationStats, SequenceWindow};

/// Extension of archive files
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "hda";

/// Shared definitions file that sits among the archives but is never migrated
pub const DEFAULT_DEFINITIONS_FILE: &str = "docmetadefinition.hda";

/// Directory under the output root holding collision snapshots
pub const DEFAULT_COUNT_DIR: &str = "count_files";

const COUNT_SUFFIX: &str = ".count";

/// An archive discovered in the input directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub file_name: String,
    /// Number embedded in the file name after `~`
    pub sequence: u32,
}

/// Sequence number of an archive named `<prefix>~<n>.<ext>`
pub fn sequence_number(file_name: &str) -> Option<u32> {
    file_name
        .split('~')
        .nth(1)?
        .split('.')
        .next()?
        .parse()
        .ok()
}

/// List the archives directly inside `dir`, ascending by sequence number.
///
/// The definitions file is excluded. Files with the archive extension but no
/// sequence number are logged and ignored.
pub fn discover_archives(
    dir: &Path,
    extension: &str,
    definitions_file: &str,
) -> Result<Vec<ArchiveFile>, MigrationError> {
    let dir = dir.canonicalize()?;
    let mut archives = Vec::new();

    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| MigrationError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != extension) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name == definitions_file {
            debug!("Skipping definitions file {}", file_name);
            continue;
        }

        match sequence_number(&file_name) {
            Some(sequence) => archives.push(ArchiveFile {
                path: path.to_path_buf(),
                file_name,
                sequence,
            }),
            None => warn!("No sequence number in archive name, ignoring: {}", file_name),
        }
    }

    archives.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.file_name.cmp(&b.file_name)));
    Ok(archives)
}

/// Snapshot path for an archive: `<output>/<count_dir>/<archive>.count`
pub fn count_file_path(output_dir: &Path, count_dir: &str, archive_file_name: &str) -> PathBuf {
    output_dir
        .join(count_dir)
        .join(format!("{}{}", archive_file_name, COUNT_SUFFIX))
}

/// The archive whose snapshot seeds the archive at `index` of the full list
pub fn predecessor(archives: &[ArchiveFile], index: usize) -> Option<&ArchiveFile> {
    index.checked_sub(1).and_then(|i| archives.get(i))
}

/// Result of handling one record
enum DocumentOutcome {
    Written(LinkOutcome),
    Skipped(DocumentError),
}

/// Builder for [`BatchSequencer`]
pub struct BatchSequencerBuilder {
    input_dir: PathBuf,
    output_dir: PathBuf,
    definition: ContentModelDefinition,
    window: SequenceWindow,
    csv_path: Option<PathBuf>,
    print_to_screen: bool,
    row_limit: Option<usize>,
    substitute_dir: Option<PathBuf>,
    starting_counts: Option<PathBuf>,
    validate: bool,
    quiet: bool,
    archive_extension: String,
    definitions_file: String,
    count_dir: String,
    run_stamp: Option<String>,
}

impl BatchSequencerBuilder {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        definition: ContentModelDefinition,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            definition,
            window: SequenceWindow::all(),
            csv_path: None,
            print_to_screen: false,
            row_limit: None,
            substitute_dir: None,
            starting_counts: None,
            validate: false,
            quiet: false,
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            definitions_file: DEFAULT_DEFINITIONS_FILE.to_string(),
            count_dir: DEFAULT_COUNT_DIR.to_string(),
            run_stamp: None,
        }
    }

    pub fn with_window(mut self, window: SequenceWindow) -> Self {
        self.window = window;
        self
    }

    /// Also write every parsed record to a CSV audit file
    pub fn with_csv(mut self, path: Option<PathBuf>) -> Self {
        self.csv_path = path;
        self
    }

    pub fn with_print_to_screen(mut self, print: bool) -> Self {
        self.print_to_screen = print;
        self
    }

    /// Process at most `limit` rows of each archive
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    /// Link to substitute files from `dir` instead of the real content
    pub fn with_substitute_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.substitute_dir = dir;
        self
    }

    /// Snapshot to seed the first processed archive with
    pub fn with_starting_counts(mut self, path: Option<PathBuf>) -> Self {
        self.starting_counts = path;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_archive_extension(mut self, extension: impl Into<String>) -> Self {
        self.archive_extension = extension.into();
        self
    }

    pub fn with_definitions_file(mut self, name: impl Into<String>) -> Self {
        self.definitions_file = name.into();
        self
    }

    pub fn with_count_dir(mut self, dir: impl Into<String>) -> Self {
        self.count_dir = dir.into();
        self
    }

    /// Fixed run stamp; defaults to the version and the current time
    pub fn with_run_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.run_stamp = Some(stamp.into());
        self
    }

    pub fn build(self) -> Result<BatchSequencer, MigrationError> {
        if let Some(end) = self.window.end {
            if end < self.window.start {
                return Err(MigrationError::Configuration(format!(
                    "end sequence {} is before start sequence {}",
                    end, self.window.start
                )));
            }
        }

        Ok(BatchSequencer {
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            definition: self.definition,
            window: self.window,
            csv_path: self.csv_path,
            print_to_screen: self.print_to_screen,
            row_limit: self.row_limit,
            substitute_dir: self.substitute_dir,
            starting_counts: self.starting_counts,
            validate: self.validate,
            quiet: self.quiet,
            archive_extension: self.archive_extension,
            definitions_file: self.definitions_file,
            count_dir: self.count_dir,
            run_stamp: self.run_stamp.unwrap_or_else(run_stamp_now),
        })
    }
}

/// Migrates every archive of a sequence window, in order.
///
/// Collision state is passed from archive to archive and snapshotted after
/// each one, so a later run can resume from any archive boundary.
pub struct BatchSequencer {
    input_dir: PathBuf,
    output_dir: PathBuf,
    definition: ContentModelDefinition,
    window: SequenceWindow,
    csv_path: Option<PathBuf>,
    print_to_screen: bool,
    row_limit: Option<usize>,
    substitute_dir: Option<PathBuf>,
    starting_counts: Option<PathBuf>,
    validate: bool,
    quiet: bool,
    archive_extension: String,
    definitions_file: String,
    count_dir: String,
    run_stamp: String,
}

impl BatchSequencer {
    /// All archives in the input directory, in processing order
    pub fn archives(&self) -> Result<Vec<ArchiveFile>, MigrationError> {
        discover_archives(&self.input_dir, &self.archive_extension, &self.definitions_file)
    }

    /// Snapshot written after `archive`
    pub fn count_file(&self, archive: &ArchiveFile) -> PathBuf {
        count_file_path(&self.output_dir, &self.count_dir, &archive.file_name)
    }

    /// Run the migration
    pub fn run(&self) -> Result<MigrationStats, MigrationError> {
        let archives = self.archives()?;
        let first_index = archives
            .iter()
            .position(|a| self.window.contains(a.sequence));

        let Some(first_index) = first_index else {
            warn!(
                "No archives in {} within sequence window {}..{}",
                self.input_dir.display(),
                self.window.start,
                self.window.end.map_or_else(|| "".to_string(), |e| e.to_string())
            );
            return Ok(MigrationStats::default());
        };

        let mut resolver = self.initial_resolver(&archives, first_index)?;

        let substitutes = match &self.substitute_dir {
            Some(dir) => Some(SubstituteContent::scan(dir)?),
            None => None,
        };
        let linker = ContentLinker::new(substitutes);

        let mut audit = match &self.csv_path {
            Some(path) => Some(AuditWriter::create(path)?),
            None => None,
        };

        let mut progress = MigrationProgress::new(self.quiet);

        for archive in archives[first_index..]
            .iter()
            .filter(|a| self.window.contains(a.sequence))
        {
            match self.process_archive(archive, resolver, &linker, audit.as_mut(), &mut progress) {
                Ok(next) => resolver = next,
                Err(e) => {
                    progress.abandon();
                    error!("Migration of {} failed: {}", archive.file_name, e);
                    return Err(e);
                }
            }
        }

        progress.finish();
        let stats = progress.get_stats();
        info!(
            "Migration complete: {} files, {} documents written, {} skipped in {:.1}s",
            stats.files_processed, stats.documents_written, stats.documents_skipped, stats.elapsed_seconds
        );
        Ok(stats)
    }

    /// Collision state for the first archive of the window.
    ///
    /// Fails when the window starts mid-sequence and neither an explicit
    /// snapshot nor the preceding archive's snapshot is available.
    fn initial_resolver(
        &self,
        archives: &[ArchiveFile],
        first_index: usize,
    ) -> Result<CollisionResolver, MigrationError> {
        if let Some(path) = &self.starting_counts {
            if !path.exists() {
                return Err(MigrationError::Snapshot(format!(
                    "starting snapshot not found: {}",
                    path.display()
                )));
            }
            info!("Loading collision counts from {}", path.display());
            return CollisionResolver::load(path);
        }

        match predecessor(archives, first_index) {
            Some(previous) => {
                let path = self.count_file(previous);
                if !path.exists() {
                    return Err(MigrationError::Snapshot(format!(
                        "no snapshot for preceding archive {} at {}; pass a starting snapshot explicitly",
                        previous.file_name,
                        path.display()
                    )));
                }
                info!("Resuming collision counts from {}", path.display());
                CollisionResolver::load(&path)
            }
            None => Ok(CollisionResolver::new()),
        }
    }

    /// Migrate one archive, returning the collision state for the next one
    fn process_archive(
        &self,
        archive: &ArchiveFile,
        mut resolver: CollisionResolver,
        linker: &ContentLinker,
        audit: Option<&mut AuditWriter>,
        progress: &mut MigrationProgress,
    ) -> Result<CollisionResolver, MigrationError> {
        let parser = HdaParser::new(&self.definition)
            .with_row_limit(self.row_limit)
            .with_run_stamp(self.run_stamp.clone());
        let mut dataset = parser.parse_file(&archive.path)?;
        normalize_dates(&mut dataset)?;

        if let Some(audit) = audit {
            audit.write_dataset(&dataset)?;
        }

        let writer = PropertyXmlWriter::new(&dataset, self.validate)?;
        let out_dir = self.output_dir.join(archive.sequence.to_string());
        progress.archive_started(&archive.file_name, dataset.len());

        for row in 0..dataset.len() {
            match self.write_document(&writer, row, &dataset.base_dir, &out_dir, &mut resolver, linker)? {
                DocumentOutcome::Written(link) => progress.document_written(link),
                DocumentOutcome::Skipped(e) => {
                    match e {
                        DocumentError::InvalidDocument { .. } => error!("{}", e),
                        _ => warn!("Skipping document: {}", e),
                    }
                    progress.document_skipped();
                }
            }
        }

        let count_file = self.count_file(archive);
        resolver.save(&count_file)?;
        debug!("Saved collision counts to {}", count_file.display());

        progress.archive_finished();
        info!(
            "Finished {} from batch {} ({} documents)",
            archive.file_name,
            dataset.batch_id,
            dataset.len()
        );
        Ok(resolver)
    }

    /// Render, write and link one record.
    ///
    /// Every check that can skip the record runs before a name is taken
    /// from the resolver.
    fn write_document(
        &self,
        writer: &PropertyXmlWriter<'_>,
        row: usize,
        base_dir: &Path,
        out_dir: &Path,
        resolver: &mut CollisionResolver,
        linker: &ContentLinker,
    ) -> Result<DocumentOutcome, MigrationError> {
        let document = match writer.render(row) {
            Ok(document) => document,
            Err(e) => return Ok(DocumentOutcome::Skipped(e)),
        };

        let primary_file = writer.primary_file(row);
        let primary_name = writer.primary_file_name(row);
        if primary_name.is_empty() {
            return Ok(DocumentOutcome::Skipped(DocumentError::MissingPrimaryFile {
                document_id: writer.document_id(row),
            }));
        }

        let source = match linker.content_source(base_dir, primary_file, row, &writer.document_id(row)) {
            Ok(source) => source,
            Err(e) => return Ok(DocumentOutcome::Skipped(e)),
        };

        let name = resolver.resolve(primary_name);
        let xml = document.to_xml()?;
        if self.print_to_screen {
            println!("{}", xml);
        }

        write_property_file(&xml, out_dir, &name)?;
        let link = linker.link(&source, &out_dir.join(&name))?;
        debug!("Wrote {} -> {}", name, source.display());
        Ok(DocumentOutcome::Written(link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_sequence_number() {
        assert_eq!(sequence_number("docmeta~12.hda"), Some(12));
        assert_eq!(sequence_number("a~3.b.hda"), Some(3));
        assert_eq!(sequence_number("docmetadefinition.hda"), None);
        assert_eq!(sequence_number("docmeta~x.hda"), None);
    }

    #[test]
    fn test_discover_orders_numerically_and_skips_definitions() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "docmeta~10.hda",
            "docmeta~2.hda",
            "docmeta~1.hda",
            "docmetadefinition.hda",
            "notes.txt",
            "stray.hda",
        ] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("docmeta~5.hda")).unwrap();

        let archives = discover_archives(dir.path(), "hda", "docmetadefinition.hda").unwrap();
        let names: Vec<&str> = archives.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["docmeta~1.hda", "docmeta~2.hda", "docmeta~10.hda"]);
        assert_eq!(archives[2].sequence, 10);
    }

    #[test]
    fn test_count_file_and_predecessor() {
        let path = count_file_path(Path::new("/out"), "count_files", "docmeta~3.hda");
        assert_eq!(path, PathBuf::from("/out/count_files/docmeta~3.hda.count"));

        let archives: Vec<ArchiveFile> = [1, 2, 4]
            .iter()
            .map(|&n| ArchiveFile {
                path: PathBuf::from(format!("/in/a~{}.hda", n)),
                file_name: format!("a~{}.hda", n),
                sequence: n,
            })
            .collect();
        assert!(predecessor(&archives, 0).is_none());
        assert_eq!(predecessor(&archives, 2).unwrap().sequence, 2);
    }

    #[test]
    fn test_build_rejects_inverted_window() {
        let definition = ContentModelDefinition {
            profile: "p".to_string(),
            content_type: "cm:content".to_string(),
            aspects: vec![],
            fields: vec![],
        };
        let result = BatchSequencerBuilder::new("/in", "/out", definition)
            .with_window(SequenceWindow::new(5, Some(3)))
            .build();
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }

    #[test]
    fn test_empty_window_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "docmeta~1.hda");
        let definition = ContentModelDefinition {
            profile: "p".to_string(),
            content_type: "cm:content".to_string(),
            aspects: vec![],
            fields: vec![],
        };
        let stats = BatchSequencerBuilder::new(dir.path(), dir.path().join("out"), definition)
            .with_window(SequenceWindow::new(7, None))
            .with_quiet(true)
            .build()
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(stats.files_processed, 0);
    }

    #[test]
    fn test_missing_predecessor_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "docmeta~1.hda");
        touch(dir.path(), "docmeta~2.hda");
        let definition = ContentModelDefinition {
            profile: "p".to_string(),
            content_type: "cm:content".to_string(),
            aspects: vec![],
            fields: vec![],
        };
        let result = BatchSequencerBuilder::new(dir.path(), dir.path().join("out"), definition)
            .with_window(SequenceWindow::new(2, None))
            .with_quiet(true)
            .build()
            .unwrap()
            .run();
        match result {
            Err(MigrationError::Snapshot(msg)) => assert!(msg.contains("docmeta~1.hda")),
            other => panic!("Expected Snapshot error, got {:?}", other),
        }
        assert!(!dir.path().join("out/2").exists());
    }
}
