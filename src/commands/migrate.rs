use anyhow::{Context, Result};
use clap::Args;
use hdamigrate::{
    config::Config,
    content_model::ContentModelLoader,
    migrate::{BatchSequencerBuilder, MigrationStats, SequenceWindow},
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Arguments of the `migrate` subcommand
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Directory holding the archive files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output root for property files, links and collision snapshots
    #[arg(short, long)]
    pub output: PathBuf,

    /// Content model YAML file
    #[arg(short = 'm', long)]
    pub content_model: PathBuf,

    /// Content model profile to migrate with
    #[arg(short, long)]
    pub profile: String,

    /// Also write every parsed record to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Print each property document to stdout
    #[arg(long)]
    pub print_to_screen: bool,

    /// Process at most this many records of each archive
    #[arg(short = 'n', long)]
    pub number_to_process: Option<usize>,

    /// Link to files from this directory instead of the real content
    #[arg(long)]
    pub sample_files: Option<PathBuf>,

    /// First archive sequence number to process
    #[arg(long, default_value = "1")]
    pub start: u32,

    /// Last archive sequence number to process
    #[arg(long)]
    pub end: Option<u32>,

    /// Collision snapshot to start from
    #[arg(long)]
    pub counts: Option<PathBuf>,

    /// Validate int and date values before writing
    #[arg(long)]
    pub validate: bool,

    /// Quiet mode (no progress bar)
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run_migration(config: Config, args: MigrateArgs) -> Result<()> {
    let started = Instant::now();

    if !args.input.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.input.display());
    }

    let loader = ContentModelLoader::new(
        config.migration.record_aspect.clone(),
        config.migration.source_field_prefix.clone(),
    );
    let definition = loader
        .load(&args.content_model, &args.profile)
        .with_context(|| format!("Failed to load content model '{}'", args.content_model.display()))?;

    info!(
        "Migrating {} with profile '{}' ({} fields) into {}",
        args.input.display(),
        definition.profile,
        definition.fields.len(),
        args.output.display()
    );

    let sequencer = BatchSequencerBuilder::new(&args.input, &args.output, definition)
        .with_window(SequenceWindow::new(args.start, args.end))
        .with_csv(args.csv)
        .with_print_to_screen(args.print_to_screen)
        .with_row_limit(args.number_to_process)
        .with_substitute_dir(args.sample_files)
        .with_starting_counts(args.counts)
        .with_validation(args.validate || config.migration.validate)
        .with_quiet(args.quiet)
        .with_archive_extension(config.migration.archive_extension.clone())
        .with_definitions_file(config.migration.definitions_file.clone())
        .with_count_dir(config.migration.count_dir.clone())
        .build()
        .context("Invalid migration settings")?;

    let stats = sequencer.run().context("Migration failed")?;

    if !args.quiet {
        print_summary(&stats);
    }

    info!("Total translation time: {:.2?}", started.elapsed());
    Ok(())
}

fn print_summary(stats: &MigrationStats) {
    println!("\nMigration Summary");
    println!("=================");
    println!("Archives processed:  {}", stats.files_processed);
    println!("Documents processed: {}", stats.documents_processed);
    println!("Documents written:   {}", stats.documents_written);
    println!("Documents skipped:   {}", stats.documents_skipped);
    println!("Links created:       {}", stats.links_created);
    println!("Links existing:      {}", stats.links_existing);
    println!("Duration:            {:.1}s", stats.elapsed_seconds);
    println!("Rate:                {:.1} docs/s", stats.docs_per_second);
}
