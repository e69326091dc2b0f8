//! Output filename collision resolution
//!
//! Many archive records share a primary file name. The resolver counts how
//! often each name has been handed out and suffixes repeats with `(n)`:
//! `a.pdf`, `a(1).pdf`, `a(2).pdf`, ...
//!
//! Counts are snapshotted to disk after every archive so the next archive in
//! sequence order, possibly in a later run, continues from the same state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::util::split_extension;

use super::source::MigrationError;

/// Base filename to number of times it has been resolved
pub type CollisionCounts = BTreeMap<String, u64>;

/// Hands out unique output base names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionResolver {
    counts: CollisionCounts,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot. A missing file yields empty state.
    pub fn load(path: &Path) -> Result<Self, MigrationError> {
        if !path.exists() {
            debug!("No collision snapshot at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read(path)?;
        let counts: CollisionCounts = bincode::deserialize(&contents)?;
        debug!(
            "Loaded collision snapshot {} with {} names",
            path.display(),
            counts.len()
        );
        Ok(Self { counts })
    }

    /// Write a snapshot, replacing any existing file atomically
    pub fn save(&self, path: &Path) -> Result<(), MigrationError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let encoded = bincode::serialize(&self.counts)?;

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;

        fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Return a unique name for `candidate` and record the use.
    ///
    /// The first use returns `candidate` unchanged; the k-th use returns
    /// `stem(k-1)ext`, splitting only the final extension.
    pub fn resolve(&mut self, candidate: &str) -> String {
        let count = self.counts.entry(candidate.to_string()).or_insert(0);
        let previous = *count;
        *count += 1;

        if previous == 0 {
            candidate.to_string()
        } else {
            let (stem, ext) = split_extension(candidate);
            format!("{}({}){}", stem, previous, ext)
        }
    }

    /// Times `name` has been resolved
    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Distinct names seen
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total_occurrences(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Names seen more than once, in name order
    pub fn collisions(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts
            .iter()
            .filter(|(_, c)| **c > 1)
            .map(|(name, &c)| (name.as_str(), c))
    }

    pub fn into_counts(self) -> CollisionCounts {
        self.counts
    }
}
