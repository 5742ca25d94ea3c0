//! Exclude set: absolute paths at which descent stops.
//!
//! Matching is exact string equality against the directory path the walker
//! is about to descend into. No globbing, no prefix logic: an entry excludes
//! one directory (and, by stopping descent, everything below it).

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::core::errors::{PwalkError, Result};

/// Set of absolute directory paths that terminate descent when matched.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    paths: HashSet<PathBuf>,
}

impl ExcludeSet {
    /// Empty set; matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from literal paths (repairshr's repeatable `--exclude`).
    #[must_use]
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Read an exclude file: one absolute path per line, trailing newline
    /// stripped, empty lines ignored. An unreadable file is a configuration
    /// error and fatal to start-up.
    pub fn load(&mut self, file: &Path) -> Result<()> {
        let fp = fs::File::open(file).map_err(|e| PwalkError::ExcludeFile {
            path: file.to_path_buf(),
            details: e.to_string(),
        })?;
        for line in BufReader::new(fp).lines() {
            let line = line.map_err(|e| PwalkError::ExcludeFile {
                path: file.to_path_buf(),
                details: e.to_string(),
            })?;
            if !line.is_empty() {
                self.paths.insert(PathBuf::from(line));
            }
        }
        Ok(())
    }

    /// Exact-equality membership test.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        !self.paths.is_empty() && self.paths.contains(path)
    }

    /// Whether any exclusion is configured at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Entries that do not exist on disk. A missing exclude path usually
    /// means a typo in the exclude file; callers warn but continue.
    #[must_use]
    pub fn missing_entries(&self) -> Vec<&Path> {
        let mut missing: Vec<&Path> = self
            .paths
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| fs::symlink_metadata(p).is_err())
            .collect();
        missing.sort_unstable();
        missing
    }
}
