//! The purge walker: the engine's rules specialized for two-phase deletion.
//!
//! Same slot pool, same offload-or-recurse rule, same path discipline as the
//! report engine, but the per-entry body is inline: quarantine decisions
//! need per-directory state (the `.ppurge` cache and its atime) that the
//! action contract does not carry. Directories are always descended: no
//! depth limit and no exclude set on a scratch volume.

use std::fs::{self, Metadata};
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

use filetime::FileTime;

use crate::core::errors::{PwalkError, Result};
use crate::engine::output::{DiagSink, OutputSink};
use crate::engine::pool::{SlotPool, WorkerId};
use crate::engine::scratch::PathScratch;
use crate::purge::quarantine::{PurgeClock, QUARANTINE_DIR, Quarantine};
use crate::report::csv::csv_escape;

/// Record tag: file moved into quarantine.
pub const PURGED: u8 = b'P';
/// Record tag: file permanently removed from quarantine.
pub const REMOVED: u8 = b'R';

struct PurgeTask {
    path: PathScratch,
    depth: i64,
    recursion: u32,
    worker: WorkerId,
}

struct PurgeWalker {
    clock: PurgeClock,
    pool: Arc<SlotPool>,
    out: OutputSink,
    diag: DiagSink,
}

/// Walk `root`, quarantining files older than the purge horizon and removing
/// quarantined files older than the remove horizon.
///
/// Records (`P`/`R` lines) go to `out`; all diagnostics go to `diag`, which
/// for the ppurge binary is its per-run log file.
pub fn run_purge(root: &Path, clock: PurgeClock, out: OutputSink, diag: DiagSink) -> Result<()> {
    fs::read_dir(root).map_err(|e| PwalkError::RootOpen {
        path: root.to_path_buf(),
        source: e,
    })?;

    let pool = SlotPool::new();
    let walker = Arc::new(PurgeWalker {
        clock,
        pool: Arc::clone(&pool),
        out: out.clone(),
        diag,
    });
    let task = PurgeTask {
        path: PathScratch::new(root),
        depth: 0,
        recursion: 0,
        worker: 0,
    };
    dispatch(&walker, task);

    pool.wait_idle();
    out.flush();
    Ok(())
}

fn dispatch(walker: &Arc<PurgeWalker>, task: PurgeTask) {
    let engine = Arc::clone(walker);
    if let Err(mut task) = walker.pool.offload(
        move |mut task: PurgeTask, id| {
            task.worker = id;
            walk_dir(&engine, task);
        },
        task,
    ) {
        task.recursion += 1;
        walk_dir(walker, task);
    }
}

fn walk_dir(walker: &Arc<PurgeWalker>, mut task: PurgeTask) {
    let entries = match fs::read_dir(task.path.as_path()) {
        Ok(it) => it,
        Err(err) => {
            walker.diag.note(&format!(
                "locked directory worker={} rdepth={} '{}': {err}",
                task.worker,
                task.recursion,
                task.path.as_path().display()
            ));
            return;
        }
    };
    let dir_mark = task.path.mark();
    let mut quarantine: Option<Quarantine> = None;
    let mut retained: u64 = 0;

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
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
        task.path.push(&name);

        if stat.is_dir() {
            if name == QUARANTINE_DIR {
                if quarantine.is_none() {
                    quarantine = Some(Quarantine::existing(
                        task.path.as_path().to_path_buf(),
                        stat.atime(),
                    ));
                }
            } else {
                enter_directory(walker, &mut task);
            }
            task.path.truncate(dir_mark);
            continue;
        }

        // File systems have been seen handing back zeroed timestamps;
        // repair the times instead of treating the file as ancient.
        if stat.mtime() <= 0 || stat.atime() <= 0 {
            walker
                .diag
                .note(&format!("bad mtime: {}", task.path.as_path().display()));
            let now = FileTime::from_unix_time(walker.clock.now, 0);
            if let Err(err) = filetime::set_file_times(task.path.as_path(), now, now) {
                walker.diag.note(&format!(
                    "touch failed: {}: {err}",
                    task.path.as_path().display()
                ));
            }
            task.path.truncate(dir_mark);
            continue;
        }
        if stat.file_type().is_symlink() {
            task.path.truncate(dir_mark);
            continue;
        }

        if walker.clock.should_quarantine(stat.mtime()) {
            if quarantine.is_none() {
                quarantine = match Quarantine::open_or_create(
                    task.path.path_at(dir_mark),
                    walker.clock.now,
                ) {
                    Ok(q) => Some(q),
                    Err(err) => {
                        walker.diag.note(&format!(
                            "cannot open quarantine in '{}': {err}",
                            task.path.path_at(dir_mark).display()
                        ));
                        None
                    }
                };
            }
            if let Some(q) = &quarantine {
                match fs::rename(task.path.as_path(), q.path.join(&name)) {
                    Ok(()) => walker.emit_record(PURGED, task.depth, task.path.as_bytes(), &stat),
                    Err(err) => walker.diag.note(&format!(
                        "could not move '{}' to {QUARANTINE_DIR}: {err}",
                        task.path.as_path().display()
                    )),
                }
            }
        } else {
            retained += 1;
        }
        task.path.truncate(dir_mark);
    }

    if let Some(q) = &quarantine {
        let remaining = walker.sweep_quarantine(q, task.depth);
        walker.diag.note(&format!(
            "quarantine '{}': {remaining} file(s) held, {retained} retained in parent",
            q.path.display()
        ));
        if remaining == 0 {
            if let Err(err) = q.remove_dir() {
                walker.diag.note(&format!(
                    "cannot remove empty quarantine '{}': {err}",
                    q.path.display()
                ));
            }
        }
    }
}

fn enter_directory(walker: &Arc<PurgeWalker>, task: &mut PurgeTask) {
    let child = PurgeTask {
        path: task.path.clone(),
        depth: task.depth + 1,
        recursion: 0,
        worker: task.worker,
    };
    let engine = Arc::clone(walker);
    if let Err(mut child) = walker.pool.offload(
        move |mut task: PurgeTask, id| {
            task.worker = id;
            walk_dir(&engine, task);
        },
        child,
    ) {
        child.recursion = task.recursion + 1;
        walk_dir(walker, child);
    }
}

impl PurgeWalker {
    /// The removal pass over one `.ppurge` cache. Returns how many files the
    /// pass left behind.
    fn sweep_quarantine(&self, q: &Quarantine, depth: i64) -> u64 {
        let entries = match fs::read_dir(&q.path) {
            Ok(it) => it,
            Err(err) => {
                self.diag
                    .note(&format!("cannot open quarantine '{}': {err}", q.path.display()));
                return u64::MAX;
            }
        };
        let mut remaining: u64 = 0;
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let stat = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    self.diag.note(&format!(
                        "stat failed in quarantine '{}': {err}",
                        entry.path().display()
                    ));
                    remaining += 1;
                    continue;
                }
            };
            if self.clock.should_remove(q.atime, stat.mtime()) {
                let victim = entry.path();
                match fs::remove_file(&victim) {
                    Ok(()) => self.emit_record(
                        REMOVED,
                        depth,
                        victim.as_os_str().as_encoded_bytes(),
                        &stat,
                    ),
                    Err(err) => {
                        self.diag
                            .note(&format!("unlink failed: '{}': {err}", victim.display()));
                        remaining += 1;
                    }
                }
            } else {
                remaining += 1;
            }
        }
        remaining
    }

    /// One `P`/`R` CSV line:
    /// `type, depth, "path", uid, gid, size, "mode", atime, mtime, ctime`.
    fn emit_record(&self, kind: u8, depth: i64, path: &[u8], stat: &Metadata) {
        let mut rec = Vec::with_capacity(path.len() + 64);
        rec.push(kind);
        let _ = write!(rec, ",{depth},\"");
        let dropped = csv_escape(path, &mut rec);
        let _ = writeln!(
            rec,
            "\",{},{},{},\"{:07o}\",{},{},{}",
            stat.uid(),
            stat.gid(),
            stat.size(),
            stat.mode(),
            stat.atime(),
            stat.mtime(),
            stat.ctime(),
        );
        if dropped > 0 {
            self.diag
                .note(&format!("bad file name: {}", String::from_utf8_lossy(path)));
        }
        self.out.emit(&rec);
    }
}
