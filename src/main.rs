//! hdamigrate: migrate legacy HDA archive exports into bulk-import staging trees

use anyhow::Result;
use clap::{Parser, Subcommand};
use hdamigrate::config::{Config, LogFormat, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::{list_archives, run_migration, show_counts, MigrateArgs};

#[derive(Parser)]
#[command(name = "hdamigrate")]
#[command(about = "Migrate legacy HDA archive exports into bulk-import property files")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a window of archives
    Migrate(MigrateArgs),

    /// Show the contents of a collision snapshot
    InspectCounts {
        /// Snapshot file (output/count_files/<archive>.count)
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List archives in processing order
    ListArchives {
        /// Directory holding the archive files
        dir: PathBuf,

        /// Output root whose snapshots would be resumed from
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;

    // Setup logging
    let log_level = config.logging.level.with_verbosity(cli.verbose);
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }

    match cli.command {
        Commands::Migrate(args) => run_migration(config, args),
        Commands::InspectCounts { file, format } => show_counts(file, format),
        Commands::ListArchives { dir, output } => list_archives(config, dir, output),
    }
}
