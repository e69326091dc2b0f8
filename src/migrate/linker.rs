//! Content links next to property files
//!
//! The bulk importer expects each property file to sit beside the content it
//! describes. Rather than copying content we create a symbolic link named
//! after the resolved base name, pointing either at the record's real primary
//! file or, for test migrations, at a substitute file with the same extension.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::util::split_extension;

use super::source::{DocumentError, MigrationError};

/// Result of a link request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// Destination already existed and was left untouched
    AlreadyPresent,
}

/// Substitute content files grouped by lowercase extension
#[derive(Debug, Clone, Default)]
pub struct SubstituteContent {
    by_extension: HashMap<String, Vec<PathBuf>>,
}

impl SubstituteContent {
    /// Index the regular files directly inside `dir`
    pub fn scan(dir: &Path) -> Result<Self, MigrationError> {
        let dir = dir.canonicalize()?;
        let mut by_extension: HashMap<String, Vec<PathBuf>> = HashMap::new();

        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            let ext = split_extension(&name).1.to_lowercase();
            by_extension.entry(ext).or_default().push(entry.path().to_path_buf());
        }

        debug!(
            "Indexed substitute content in {}: {} extensions",
            dir.display(),
            by_extension.len()
        );
        Ok(Self { by_extension })
    }

    /// Substitute for `extension`, cycling through the matching files by `index`
    pub fn get(&self, extension: &str, index: usize) -> Option<&Path> {
        let files = self.by_extension.get(&extension.to_lowercase())?;
        if files.is_empty() {
            return None;
        }
        Some(files[index % files.len()].as_path())
    }
}

/// Links property files to their content
#[derive(Debug, Clone, Default)]
pub struct ContentLinker {
    substitutes: Option<SubstituteContent>,
}

impl ContentLinker {
    pub fn new(substitutes: Option<SubstituteContent>) -> Self {
        Self { substitutes }
    }

    /// File the link should point at.
    ///
    /// Without substitutes this is `base_dir/primary_file`. With substitutes it
    /// is the `index`-th file (round robin) sharing the primary file's extension.
    pub fn content_source(
        &self,
        base_dir: &Path,
        primary_file: &str,
        index: usize,
        document_id: &str,
    ) -> Result<PathBuf, DocumentError> {
        match &self.substitutes {
            None => Ok(base_dir.join(primary_file)),
            Some(subs) => {
                let name = crate::util::base_name(primary_file);
                let ext = split_extension(name).1;
                subs.get(ext, index)
                    .map(Path::to_path_buf)
                    .ok_or_else(|| DocumentError::MissingSubstitute {
                        extension: ext.to_string(),
                        document_id: document_id.to_string(),
                    })
            }
        }
    }

    /// Create `dest` pointing at `source` unless something is already there
    pub fn link(&self, source: &Path, dest: &Path) -> Result<LinkOutcome, MigrationError> {
        if dest.symlink_metadata().is_ok() {
            debug!("Link destination exists, skipping: {}", dest.display());
            return Ok(LinkOutcome::AlreadyPresent);
        }

        create_symlink(source, dest)?;
        Ok(LinkOutcome::Created)
    }
}

#[cfg(unix)]
fn create_symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn create_symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, dest)
}
