//! The repair walker: the engine applied to permission repair.
//!
//! Same slot pool and path discipline as the report engine, but the
//! per-entry body runs the repair policy on every entry, directory or file,
//! before any descent decision, and there is no depth limit: a shared
//! folder is repaired all the way down. The root directory itself is left
//! untouched; only its descendants are repaired.

use std::fs::{self, Metadata};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use std::sync::Arc;

use crate::core::errors::{PwalkError, Result};
use crate::core::exclude::ExcludeSet;
use crate::engine::output::{DiagSink, OutputSink};
use crate::engine::pool::{SlotPool, WorkerId};
use crate::engine::scratch::PathScratch;
use crate::repair::policy::{RepairOptions, plan_repair};

/// Repair walk policy, captured once at start-up.
#[derive(Debug, Clone, Default)]
pub struct RepairConfig {
    /// Report every intended change without touching the file system.
    pub dry_run: bool,
    /// Skip directories named exactly `.snapshot`.
    pub ignore_snapshots: bool,
    /// Skip entries whose device id differs from the root's.
    pub one_file_system: bool,
    /// Absolute paths at which descent stops.
    pub exclude: ExcludeSet,
    /// Mode/group policy knobs.
    pub options: RepairOptions,
    /// Worker pool capacity; 0 selects the default.
    pub threads: usize,
}

struct RepairTask {
    path: PathScratch,
    recursion: u32,
    worker: WorkerId,
}

struct RepairWalker {
    cfg: RepairConfig,
    root_dev: u64,
    pool: Arc<SlotPool>,
    out: OutputSink,
    diag: DiagSink,
}

/// Repair every entry under `root`. Change reports go to `out`; failures and
/// unresolvable groups to `diag`.
pub fn run_repair(root: &Path, cfg: RepairConfig, out: OutputSink, diag: DiagSink) -> Result<()> {
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
    let walker = Arc::new(RepairWalker {
        root_dev: root_stat.dev(),
        cfg,
        pool: Arc::clone(&pool),
        out: out.clone(),
        diag,
    });
    let task = RepairTask {
        path: PathScratch::new(root),
        recursion: 0,
        worker: 0,
    };
    dispatch(&walker, task);

    pool.wait_idle();
    out.flush();
    Ok(())
}

fn dispatch(walker: &Arc<RepairWalker>, task: RepairTask) {
    let engine = Arc::clone(walker);
    if let Err(mut task) = walker.pool.offload(
        move |mut task: RepairTask, id| {
            task.worker = id;
            walk_dir(&engine, task);
        },
        task,
    ) {
        task.recursion += 1;
        walk_dir(walker, task);
    }
}

fn walk_dir(walker: &Arc<RepairWalker>, mut task: RepairTask) {
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

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let stat = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                walker
                    .diag
                    .note(&format!("cannot stat '{}': {err}", entry.path().display()));
                continue;
            }
        };
        if walker.cfg.one_file_system && stat.dev() != walker.root_dev {
            continue;
        }
        task.path.push(&name);

        walker.repair_entry(&stat, &task);

        if stat.is_dir() {
            let snapshot = walker.cfg.ignore_snapshots && name.as_bytes() == b".snapshot";
            if !snapshot && !walker.cfg.exclude.contains(task.path.as_path()) {
                enter_directory(walker, &mut task);
            }
        }
        task.path.truncate(dir_mark);
    }
}

fn enter_directory(walker: &Arc<RepairWalker>, task: &mut RepairTask) {
    let child = RepairTask {
        path: task.path.clone(),
        recursion: 0,
        worker: task.worker,
    };
    let engine = Arc::clone(walker);
    if let Err(mut child) = walker.pool.offload(
        move |mut task: RepairTask, id| {
            task.worker = id;
            walk_dir(&engine, task);
        },
        child,
    ) {
        child.recursion = task.recursion + 1;
        walk_dir(walker, child);
    }
}

impl RepairWalker {
    fn repair_entry(&self, stat: &Metadata, task: &RepairTask) {
        let path = task.path.as_path();
        let plan = plan_repair(
            path,
            stat.mode(),
            stat.uid(),
            stat.gid(),
            stat.is_dir(),
            &self.cfg.options,
        );

        if plan.group_unresolved {
            self.diag.note(&format!(
                "no suitable non-private, non-root group found for {} (current gid: {}, uid: {})",
                path.display(),
                stat.gid(),
                stat.uid()
            ));
        }

        if let Some(mode) = plan.new_mode {
            // Symlink modes cannot be changed without following the link;
            // leave them be.
            if !stat.file_type().is_symlink() {
                self.apply_mode(path, stat.mode(), mode);
            }
        }
        if let Some(gid) = plan.new_gid {
            self.apply_group(path, stat.gid(), gid);
        }
    }

    fn apply_mode(&self, path: &Path, old: u32, new: u32) {
        if self.cfg.dry_run {
            self.report(&format!(
                "Would change mode of {} from {old:o} to {new:o}",
                path.display()
            ));
            return;
        }
        match fs::set_permissions(path, fs::Permissions::from_mode(new)) {
            Ok(()) => self.report(&format!(
                "Changed mode of {} from {old:o} to {new:o}",
                path.display()
            )),
            Err(err) => self.diag.note(&format!(
                "failed to change mode for {}: {err}",
                path.display()
            )),
        }
    }

    fn apply_group(&self, path: &Path, old: u32, new: u32) {
        if self.cfg.dry_run {
            self.report(&format!(
                "Would change group of {} from {old} to {new}",
                path.display()
            ));
            return;
        }
        match std::os::unix::fs::lchown(path, None, Some(new)) {
            Ok(()) => self.report(&format!(
                "Changed group of {} from {old} to {new}",
                path.display()
            )),
            Err(err) => self.diag.note(&format!(
                "failed to change group for {}: {err}",
                path.display()
            )),
        }
    }

    fn report(&self, line: &str) {
        let mut rec = Vec::with_capacity(line.len() + 1);
        rec.extend_from_slice(line.as_bytes());
        rec.push(b'\n');
        self.out.emit(&rec);
    }
}
