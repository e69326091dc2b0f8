use anyhow::{Context, Result};
use hdamigrate::{
    config::Config,
    migrate::{
        discover_archives,
        sequencer::{count_file_path, predecessor},
        CollisionResolver,
    },
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Snapshot summary printed by `inspect-counts --format json`
#[derive(Debug, Serialize)]
struct CountsReport<'a> {
    names: usize,
    occurrences: u64,
    collisions: Vec<(&'a str, u64)>,
}

pub fn show_counts(path: PathBuf, format: String) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Snapshot not found: {}", path.display());
    }

    let resolver = CollisionResolver::load(&path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;

    let report = CountsReport {
        names: resolver.len(),
        occurrences: resolver.total_occurrences(),
        collisions: resolver.collisions().collect(),
    };

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("\nCollision Snapshot: {}", path.display());
            println!("==================");
            println!("Distinct names:    {}", report.names);
            println!("Total occurrences: {}", report.occurrences);
            if report.collisions.is_empty() {
                println!("No collisions");
            } else {
                println!("\nCollided names:");
                for (name, count) in &report.collisions {
                    println!("  {} ({} uses, last suffix ({}))", name, count, count - 1);
                }
            }
        }
    }

    Ok(())
}

pub fn list_archives(config: Config, dir: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let archives = discover_archives(
        &dir,
        &config.migration.archive_extension,
        &config.migration.definitions_file,
    )
    .with_context(|| format!("Failed to scan {}", dir.display()))?;

    if archives.is_empty() {
        println!("No archives found in {}", dir.display());
        return Ok(());
    }

    let output = output.unwrap_or_default();
    println!("\nArchives in {} (processing order)", dir.display());
    println!("=============");
    for (index, archive) in archives.iter().enumerate() {
        let resume = match predecessor(&archives, index) {
            Some(prev) => describe_snapshot(&count_file_path(
                &output,
                &config.migration.count_dir,
                &prev.file_name,
            )),
            None => "empty".to_string(),
        };
        println!("{:>6}  {:<40} resumes from: {}", archive.sequence, archive.file_name, resume);
    }

    Ok(())
}

fn describe_snapshot(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}
