#![forbid(unsafe_code)]

//! pwalk — walk a file tree in parallel and report one CSV record of inode
//! metadata per entry, built for file systems too large for `du`.

use std::path::PathBuf;

use clap::Parser;

use pwalk::core::errors::Result;
use pwalk::core::exclude::ExcludeSet;
use pwalk::engine::output::{DiagSink, OutputSink};
use pwalk::engine::scratch::PathScratch;
use pwalk::report::chown::OwnerChange;
use pwalk::report::meta::MetaReport;
use pwalk::report::walker::{ReportConfig, run_report};

/// Parallel file tree walk with CSV inode reporting.
#[derive(Debug, Parser)]
#[command(
    name = "pwalk",
    version,
    about = "Walk a file tree in parallel and report inode metadata as CSV",
    long_about = None
)]
struct Cli {
    /// Fully qualified root directory to walk.
    directory: PathBuf,

    /// Ignore directories named .snapshot.
    #[arg(long = "no-snap")]
    no_snap: bool,

    /// Limit descent to this many directory levels below the root.
    #[arg(long, value_name = "LEVELS", value_parser = clap::value_parser!(i64).range(1..))]
    depth: Option<i64>,

    /// File of absolute paths to exclude from descent, one per line.
    #[arg(long, value_name = "PATH")]
    exclude_file: Option<PathBuf>,

    /// Stay on the root's file system.
    #[arg(short = 'x', long)]
    one_file_system: bool,

    /// Emit a CSV header row before any record.
    #[arg(long)]
    header: bool,

    /// Instead of reporting, re-own entries currently owned by this uid.
    #[arg(long, value_name = "UID", requires = "chown_to")]
    chown_from: Option<u32>,

    /// New owner as UID:GID; applied to entries matching --chown-from.
    #[arg(long, value_name = "UID:GID", requires = "chown_from", value_parser = parse_owner)]
    chown_to: Option<(u32, u32)>,
}

fn parse_owner(raw: &str) -> std::result::Result<(u32, u32), String> {
    let (uid, gid) = raw
        .split_once(':')
        .ok_or_else(|| format!("'{raw}' is not UID:GID"))?;
    Ok((
        uid.parse().map_err(|_| format!("bad uid in '{raw}'"))?,
        gid.parse().map_err(|_| format!("bad gid in '{raw}'"))?,
    ))
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("pwalk: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Normalize away a trailing slash so exclude matching and record paths
    // agree with what the walker builds.
    let root = PathScratch::new(&cli.directory).as_path().to_path_buf();
    let diag = DiagSink::stderr();

    let mut exclude = ExcludeSet::new();
    if let Some(file) = &cli.exclude_file {
        exclude.load(file)?;
    }
    for missing in exclude.missing_entries() {
        diag.note(&format!("exclude path not found: {}", missing.display()));
    }

    let cfg = ReportConfig {
        ignore_snapshots: cli.no_snap,
        depth_limit: cli.depth.unwrap_or(0),
        one_file_system: cli.one_file_system,
        exclude,
        threads: 0,
    };
    let out = OutputSink::stdout();

    match (cli.chown_from, cli.chown_to) {
        (Some(from), Some((uid, gid))) => {
            run_report(&root, cfg, OwnerChange { from, uid, gid }, out, diag)
        }
        _ => run_report(&root, cfg, MetaReport { header: cli.header }, out, diag),
    }
}
