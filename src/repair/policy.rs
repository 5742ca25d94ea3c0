//! Repair planning: what a shared-folder entry's mode and group should be.
//!
//! Shared project folders rot in two ways: directories lose their set-gid
//! bit (new files stop inheriting the project group) and entries end up
//! owned by someone's private group, by root, or by a group scheduled for
//! retirement. Planning is pure; the walker decides separately whether to
//! apply or just report.

#![allow(missing_docs)]

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

const S_ISGID: u32 = libc::S_ISGID as u32;
const S_IRGRP: u32 = libc::S_IRGRP as u32;
const S_IWGRP: u32 = libc::S_IWGRP as u32;
const S_IXGRP: u32 = libc::S_IXGRP as u32;
const S_IRWXG: u32 = libc::S_IRWXG as u32;

/// Repair policy knobs.
#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    /// Grant the group full read/write (and execute on directories) instead
    /// of the read(+execute) minimum.
    pub force_group_writable: bool,
    /// Group ids to migrate to the nearest suitable ancestor group.
    pub change_gids: Vec<u32>,
}

/// Planned changes for one entry. `None` means leave that aspect alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepairPlan {
    pub new_mode: Option<u32>,
    pub new_gid: Option<u32>,
    /// The group had to change but no ancestor offered a usable one.
    pub group_unresolved: bool,
}

impl RepairPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.new_mode.is_none() && self.new_gid.is_none() && !self.group_unresolved
    }
}

/// A group owner that must be replaced: the owner's private group, root's
/// group, or one on the migration list.
fn group_needs_change(gid: u32, uid: u32, opts: &RepairOptions) -> bool {
    gid == uid || gid == 0 || opts.change_gids.contains(&gid)
}

/// A candidate replacement group, judged against the ancestor that carries
/// it: not that ancestor's own private group, not root, not blacklisted.
fn qualifies(gid: u32, uid: u32, opts: &RepairOptions) -> bool {
    gid != uid && gid != 0 && !opts.change_gids.contains(&gid)
}

/// Walk ancestor directories of `path` (nearest first, stopping before the
/// file-system root) for the first qualifying group.
#[must_use]
pub fn nearest_shared_group(path: &Path, opts: &RepairOptions) -> Option<u32> {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().len() <= 1 {
            break;
        }
        if let Ok(stat) = fs::symlink_metadata(ancestor)
            && qualifies(stat.gid(), stat.uid(), opts)
        {
            return Some(stat.gid());
        }
    }
    None
}

/// Plan the repair of one entry, resolving replacement groups from the
/// real file system.
#[must_use]
pub fn plan_repair(
    path: &Path,
    mode: u32,
    uid: u32,
    gid: u32,
    is_dir: bool,
    opts: &RepairOptions,
) -> RepairPlan {
    plan_repair_with(mode, uid, gid, is_dir, opts, || {
        nearest_shared_group(path, opts)
    })
}

/// Planning core with an injectable group resolver (tests fake the ancestor
/// chain; the walker passes the lstat-based search).
pub fn plan_repair_with(
    mode: u32,
    uid: u32,
    gid: u32,
    is_dir: bool,
    opts: &RepairOptions,
    resolve: impl FnOnce() -> Option<u32>,
) -> RepairPlan {
    let mut new_mode = mode;
    let mut plan = RepairPlan::default();

    if is_dir && mode & S_ISGID == 0 {
        new_mode |= S_ISGID;
    }

    if group_needs_change(gid, uid, opts) {
        match resolve() {
            Some(replacement) => plan.new_gid = Some(replacement),
            None => plan.group_unresolved = true,
        }
    }

    if is_dir {
        if opts.force_group_writable {
            if mode & S_IRWXG != S_IRWXG {
                new_mode |= S_IRWXG;
            }
        } else if mode & S_IRGRP == 0 || mode & S_IXGRP == 0 {
            new_mode |= S_IRGRP | S_IXGRP;
        }
    } else if opts.force_group_writable {
        if mode & (S_IRGRP | S_IWGRP) != (S_IRGRP | S_IWGRP) {
            new_mode |= S_IRGRP | S_IWGRP;
        }
    } else if mode & S_IRGRP == 0 {
        new_mode |= S_IRGRP;
    }

    if new_mode != mode {
        plan.new_mode = Some(new_mode);
    }
    plan
}
