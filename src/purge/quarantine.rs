//! Quarantine directories and purge horizons.
//!
//! A `.ppurge` cache sits next to the files it quarantines, so a user can
//! recover a file with a plain `mv` and the final unlink stays on the same
//! volume. The cache carries mode `01777` like `/tmp`: sticky, so only a
//! file's owner can move or delete it.

#![allow(missing_docs)]

use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::{Path, PathBuf};

/// Name of the per-directory quarantine cache.
pub const QUARANTINE_DIR: &str = ".ppurge";

/// Sticky, world-writable; requires the process umask to be 0.
pub const QUARANTINE_MODE: u32 = 0o1777;

const SECONDS_PER_DAY: i64 = 86_400;

/// Purge horizons, computed once at start-up.
///
/// A file is quarantined when its mtime predates `purge_at` (N days ago) and
/// removed from quarantine once it predates `remove_at` (2N days ago) *and*
/// the quarantine directory itself has aged past `purge_at`, so a freshly
/// created cache never deletes in the same run.
#[derive(Debug, Clone, Copy)]
pub struct PurgeClock {
    pub now: i64,
    pub purge_at: i64,
    pub remove_at: i64,
}

impl PurgeClock {
    #[must_use]
    pub fn new(now: i64, purge_days: i64) -> Self {
        Self {
            now,
            purge_at: now - purge_days * SECONDS_PER_DAY,
            remove_at: now - 2 * purge_days * SECONDS_PER_DAY,
        }
    }

    #[must_use]
    pub fn should_quarantine(&self, mtime: i64) -> bool {
        mtime < self.purge_at
    }

    #[must_use]
    pub fn should_remove(&self, quarantine_atime: i64, mtime: i64) -> bool {
        quarantine_atime < self.purge_at && mtime < self.remove_at
    }
}

/// One directory's quarantine: its path plus the atime observed the moment
/// it was first seen or created. The atime snapshot gates the removal pass.
#[derive(Debug)]
pub struct Quarantine {
    pub path: PathBuf,
    pub atime: i64,
}

impl Quarantine {
    /// Record a `.ppurge` entry met during the walk.
    #[must_use]
    pub fn existing(path: PathBuf, atime: i64) -> Self {
        Self { path, atime }
    }

    /// Open `dir/.ppurge`, creating it with mode `01777` when absent. A
    /// fresh cache reports `now` as its atime.
    pub fn open_or_create(dir: &Path, now: i64) -> io::Result<Self> {
        let path = dir.join(QUARANTINE_DIR);
        match fs::symlink_metadata(&path) {
            Ok(meta) => {
                let atime = meta.atime();
                Ok(Self { path, atime })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let mut builder = fs::DirBuilder::new();
                builder.mode(QUARANTINE_MODE);
                builder.create(&path)?;
                Ok(Self { path, atime: now })
            }
            Err(err) => Err(err),
        }
    }

    /// Remove the cache directory itself; callers do this when a removal
    /// pass leaves it empty.
    pub fn remove_dir(&self) -> io::Result<()> {
        fs::remove_dir(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn horizons_are_measured_in_whole_days_from_now() {
        let clock = PurgeClock::new(1_000_000_000, 30);
        assert_eq!(clock.purge_at, 1_000_000_000 - 30 * 86_400);
        assert_eq!(clock.remove_at, 1_000_000_000 - 60 * 86_400);
        assert!(clock.should_quarantine(clock.purge_at - 1));
        assert!(!clock.should_quarantine(clock.purge_at));
    }

    #[test]
    fn removal_needs_both_an_old_cache_and_an_old_file() {
        let clock = PurgeClock::new(1_000_000_000, 30);
        let old_file = clock.remove_at - 1;
        assert!(clock.should_remove(clock.purge_at - 1, old_file));
        // Fresh cache: nothing is removed even for ancient files.
        assert!(!clock.should_remove(clock.now, old_file));
        // Old cache but file not yet past the second horizon.
        assert!(!clock.should_remove(clock.purge_at - 1, clock.remove_at));
    }

    #[test]
    fn creates_the_cache_sticky_and_world_writable() {
        let tmp = tempfile::tempdir().unwrap();
        // Mask would strip bits; neutralize for the assertion the way the
        // ppurge binary does globally.
        let old_umask = nix::sys::stat::umask(nix::sys::stat::Mode::empty());
        let q = Quarantine::open_or_create(tmp.path(), 1234).unwrap();
        let mode = fs::symlink_metadata(&q.path).unwrap().permissions().mode();
        nix::sys::stat::umask(old_umask);

        assert_eq!(mode & 0o7777, QUARANTINE_MODE);
        assert_eq!(q.atime, 1234);
        assert_eq!(q.path, tmp.path().join(".ppurge"));
    }

    #[test]
    fn reopening_reports_the_existing_atime_not_now() {
        let tmp = tempfile::tempdir().unwrap();
        let first = Quarantine::open_or_create(tmp.path(), 1234).unwrap();
        filetime::set_file_atime(&first.path, filetime::FileTime::from_unix_time(99, 0)).unwrap();
        let second = Quarantine::open_or_create(tmp.path(), 5678).unwrap();
        assert_eq!(second.atime, 99);
    }

    #[test]
    fn remove_dir_only_succeeds_when_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let q = Quarantine::open_or_create(tmp.path(), 0).unwrap();
        fs::write(q.path.join("survivor"), b"x").unwrap();
        assert!(q.remove_dir().is_err());
        fs::remove_file(q.path.join("survivor")).unwrap();
        q.remove_dir().unwrap();
        assert!(!q.path.exists());
    }
}
