//! Progress tracking for migration runs

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

use crate::util::truncate_str;

use super::linker::LinkOutcome;
use super::source::MigrationStats;

/// Counts documents as they move through the pipeline and drives an optional
/// progress bar. The bar length grows as each archive reveals its row count.
pub struct MigrationProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    stats: MigrationStats,
}

impl MigrationProgress {
    pub fn new(quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            stats: MigrationStats::default(),
        }
    }

    /// An archive has been parsed and its rows are about to be written
    pub fn archive_started(&mut self, name: &str, rows: usize) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc_length(rows as u64);
            pb.set_message(truncate_str(name, 40));
        }
    }

    pub fn archive_finished(&mut self) {
        self.stats.files_processed += 1;
    }

    /// A property file was written and its content link handled
    pub fn document_written(&mut self, link: LinkOutcome) {
        self.stats.documents_written += 1;
        match link {
            LinkOutcome::Created => self.stats.links_created += 1,
            LinkOutcome::AlreadyPresent => self.stats.links_existing += 1,
        }
        self.document_done();
    }

    /// A document was skipped
    pub fn document_skipped(&mut self) {
        self.stats.documents_skipped += 1;
        self.document_done();
    }

    fn document_done(&mut self) {
        self.stats.documents_processed += 1;
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
        }
    }

    /// Current statistics
    pub fn get_stats(&self) -> MigrationStats {
        let mut stats = self.stats.clone();
        stats.elapsed_seconds = self.start_time.elapsed().as_secs_f64();
        stats.update_rate();
        stats
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} written, {} skipped, {:.1} docs/s",
                stats.documents_written, stats.documents_skipped, stats.docs_per_second
            ));
        }
    }

    /// Stop the bar after a fatal error
    pub fn abandon(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message("Aborted");
        }
    }
}
