//! The report engine: directory workers over the shared slot pool, invoking
//! a pluggable action per entry.
//!
//! One worker walks one directory. For every subdirectory it first tries to
//! acquire a slot and offload; with the pool exhausted it recurses on its own
//! stack with an ephemeral descriptor, so a deep tree costs stack frames, not
//! correctness. Every file-like entry produces one action invocation; the
//! directory itself produces one summary invocation after its loop.

#![allow(missing_docs)]

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

use crate::core::errors::{PwalkError, Result};
use crate::core::exclude::ExcludeSet;
use crate::engine::output::{DiagSink, OutputSink};
use crate::engine::pool::{SlotPool, WorkerId};
use crate::engine::scratch::PathScratch;
use crate::report::csv::{basename_of, extension_of};

/// `file_count` value marking a per-file action invocation.
pub const NOT_A_DIRECTORY: i64 = -1;

/// Walk policy captured once at start-up and shared read-only by workers.
#[derive(Debug, Clone, Default)]
pub struct ReportConfig {
    /// Skip directories named exactly `.snapshot`.
    pub ignore_snapshots: bool,
    /// Positive limit suppresses descent below that many directory levels
    /// under the root; 0 means unlimited.
    pub depth_limit: i64,
    /// Skip entries whose device id differs from the root's.
    pub one_file_system: bool,
    /// Absolute paths at which descent stops.
    pub exclude: ExcludeSet,
    /// Worker pool capacity; 0 selects the default.
    pub threads: usize,
}

/// One action invocation's view of a visited entry.
///
/// `file_count == -1` marks a per-file invocation (`dir_size` is 0 there);
/// `file_count >= 0` marks a directory summary. `depth` and `parent_inode`
/// are already adjusted for the invocation kind: a summary carries the
/// grandparent inode and `depth - 1`, because the directory belongs to its
/// parent's level.
pub struct EntryRecord<'a> {
    pub path: &'a [u8],
    pub extension: Option<&'a [u8]>,
    pub stat: &'a Metadata,
    pub depth: i64,
    pub parent_inode: u64,
    pub file_count: i64,
    pub dir_size: i64,
}

impl EntryRecord<'_> {
    #[must_use]
    pub fn is_directory_summary(&self) -> bool {
        self.file_count != NOT_A_DIRECTORY
    }
}

/// Per-entry action, selected once at start-up.
///
/// `emit` runs under the output serializer: while it executes it is the only
/// action running in the process, and everything it writes to `out` lands
/// contiguously. Diagnostics bypass the serializer via `diag`.
pub trait Action: Send + Sync {
    /// Called once before the root worker starts.
    fn preamble(&self, _out: &mut dyn Write) {}

    /// Handle one entry or directory summary.
    fn emit(&self, entry: &EntryRecord<'_>, out: &mut dyn Write, diag: &DiagSink);
}

/// Worker descriptor: owned by a pool worker, or ephemeral on the stack of a
/// recursing worker.
struct DirTask {
    path: PathScratch,
    depth: i64,
    /// 0 while executing as an independent worker, > 0 per in-place
    /// recursion frame.
    recursion: u32,
    worker: WorkerId,
    /// Stat snapshot of the directory this task walks; file records take
    /// their parent inode from it.
    parent_stat: Metadata,
    /// Inode of the grandparent, for the directory's own summary record.
    parent_inode: u64,
}

struct ReportWalker<A: Action> {
    cfg: ReportConfig,
    root_dev: u64,
    pool: Arc<SlotPool>,
    action: A,
    out: OutputSink,
    diag: DiagSink,
}

/// Walk `root` and report every entry through `action`.
///
/// Fatal only on root setup; per-entry failures are diagnostics and the walk
/// continues. Returns after every worker has exited and output is flushed.
pub fn run_report<A: Action + 'static>(
    root: &Path,
    cfg: ReportConfig,
    action: A,
    out: OutputSink,
    diag: DiagSink,
) -> Result<()> {
    let root_stat = fs::symlink_metadata(root).map_err(|e| PwalkError::RootStat {
        path: root.to_path_buf(),
        source: e,
    })?;
    fs::read_dir(root).map_err(|e| PwalkError::RootOpen {
        path: root.to_path_buf(),
        source: e,
    })?;
    if cfg.exclude.contains(root) {
        return Ok(());
    }

    let pool = if cfg.threads > 0 {
        SlotPool::with_capacity(cfg.threads)
    } else {
        SlotPool::new()
    };
    let walker = Arc::new(ReportWalker {
        root_dev: root_stat.dev(),
        cfg,
        pool: Arc::clone(&pool),
        action,
        out: out.clone(),
        diag,
    });

    walker.out.with(|w| walker.action.preamble(w));

    let task = DirTask {
        path: PathScratch::new(root),
        depth: 0,
        recursion: 0,
        worker: 0,
        parent_stat: root_stat,
        parent_inode: 0,
    };
    dispatch(&walker, task);

    pool.wait_idle();
    out.flush();
    Ok(())
}

/// Offload onto a fresh worker, or run on the current stack when the pool
/// refuses.
fn dispatch<A: Action + 'static>(walker: &Arc<ReportWalker<A>>, task: DirTask) {
    let engine = Arc::clone(walker);
    if let Err(mut task) = walker.pool.offload(
        move |mut task: DirTask, id| {
            task.worker = id;
            walk_dir(&engine, task);
        },
        task,
    ) {
        task.recursion += 1;
        walk_dir(walker, task);
    }
}

/// The directory worker body: read one directory, classify each entry, emit
/// records, descend.
fn walk_dir<A: Action + 'static>(walker: &Arc<ReportWalker<A>>, mut task: DirTask) {
    let entries = match fs::read_dir(task.path.as_path()) {
        Ok(it) => it,
        Err(err) => {
            walker.diag.note(&format!(
                "cannot open directory worker={} rdepth={} '{}': {err}",
                task.worker,
                task.recursion,
                task.path.as_path().display()
            ));
            return;
        }
    };
    let dir_mark = task.path.mark();
    let mut file_count: i64 = 0;
    let mut dir_size: i64 = 0;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                walker.diag.note(&format!(
                    "read error worker={} rdepth={} '{}': {err}",
                    task.worker,
                    task.recursion,
                    task.path.as_path().display()
                ));
                continue;
            }
        };
        let name = entry.file_name();
        // Counted before the stat, so unreadable entries still show up in
        // their parent's file_count.
        file_count += 1;
        let stat = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                walker.diag.note(&format!(
                    "stat failed worker={} rdepth={} '{}': {err}",
                    task.worker,
                    task.recursion,
                    entry.path().display()
                ));
                continue;
            }
        };
        dir_size = dir_size.saturating_add(i64::try_from(stat.size()).unwrap_or(i64::MAX));

        if walker.cfg.one_file_system && stat.dev() != walker.root_dev {
            continue;
        }

        task.path.push(&name);
        if stat.is_dir() {
            enter_directory(walker, &mut task, &name, stat);
        } else {
            walker.emit_file_like(&task, name.as_bytes(), &stat);
        }
        task.path.truncate(dir_mark);
    }

    // The loop left the path truncated back to the directory itself.
    // Re-stat it for the summary record; the snapshot taken at spawn only
    // serves the file records' parent-inode field.
    match fs::symlink_metadata(task.path.as_path()) {
        Ok(stat) => {
            let name = basename_of(task.path.as_bytes()).to_vec();
            let record = EntryRecord {
                path: task.path.as_bytes(),
                extension: extension_of(&name),
                stat: &stat,
                depth: task.depth - 1,
                parent_inode: task.parent_inode,
                file_count,
                dir_size,
            };
            walker.invoke(&record);
        }
        Err(err) => {
            walker.diag.note(&format!(
                "summary stat failed worker={} rdepth={} '{}': {err}",
                task.worker,
                task.recursion,
                task.path.as_path().display()
            ));
        }
    }
    // Worker tasks drop their lease in the pool wrapper; recursion frames
    // simply return to the caller's loop.
}

/// Descent decision for a subdirectory; the task's path currently holds the
/// child.
fn enter_directory<A: Action + 'static>(
    walker: &Arc<ReportWalker<A>>,
    task: &mut DirTask,
    name: &OsStr,
    stat: Metadata,
) {
    if walker.cfg.ignore_snapshots && name.as_bytes() == b".snapshot" {
        walker.diag.note(&format!(
            "snapshot skipped: {}",
            task.path.as_path().display()
        ));
        return;
    }
    let child_depth = task.depth + 1;
    if (walker.cfg.depth_limit > 0 && child_depth >= walker.cfg.depth_limit)
        || walker.cfg.exclude.contains(task.path.as_path())
    {
        // Descent suppressed; the directory itself is still reported.
        walker.emit_file_like(task, name.as_bytes(), &stat);
        return;
    }

    let child = DirTask {
        path: task.path.clone(),
        depth: child_depth,
        recursion: 0,
        worker: task.worker,
        parent_inode: task.parent_stat.ino(),
        parent_stat: stat,
    };
    let engine = Arc::clone(walker);
    if let Err(mut child) = walker.pool.offload(
        move |mut task: DirTask, id| {
            task.worker = id;
            walk_dir(&engine, task);
        },
        child,
    ) {
        // Pool exhausted: ephemeral frame on this worker's stack.
        child.recursion = task.recursion + 1;
        child.worker = task.worker;
        walk_dir(walker, child);
    }
}

impl<A: Action + 'static> ReportWalker<A> {
    fn emit_file_like(&self, task: &DirTask, name: &[u8], stat: &Metadata) {
        let record = EntryRecord {
            path: task.path.as_bytes(),
            extension: extension_of(name),
            stat,
            depth: task.depth,
            parent_inode: task.parent_stat.ino(),
            file_count: NOT_A_DIRECTORY,
            dir_size: 0,
        };
        self.invoke(&record);
    }

    fn invoke(&self, record: &EntryRecord<'_>) {
        self.out.with(|w| self.action.emit(record, w, &self.diag));
    }
}
