#![forbid(unsafe_code)]

//! ppurge — two-phase purge for HPC scratch volumes.
//!
//! Run once per day with the same `--purge-days` value. The first N days a
//! stale file spends quarantined in a sibling `.ppurge` directory, from
//! which its owner can still recover it with a plain `mv`; after another N
//! days it is removed for good. Must run as root (or set-uid root) to reach
//! every user's files; run only on volumes without snapshots.

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;

use pwalk::core::errors::{PwalkError, Result};
use pwalk::engine::output::{DiagSink, OutputSink};
use pwalk::engine::scratch::PathScratch;
use pwalk::purge::quarantine::PurgeClock;
use pwalk::purge::walker::run_purge;

/// Parallel two-phase scratch-volume purge.
#[derive(Debug, Parser)]
#[command(
    name = "ppurge",
    version,
    about = "Quarantine files older than N days into .ppurge caches; remove them after 2N days",
    long_about = None
)]
struct Cli {
    /// Fully qualified root directory to purge.
    directory: PathBuf,

    /// Purge files older than this many days. Keep the value stable from
    /// run to run.
    #[arg(
        long = "purge-days",
        value_name = "DAYS",
        value_parser = clap::value_parser!(i64).range(1..=32_000)
    )]
    purge_days: i64,

    /// Reserved for future directory-level purging.
    #[arg(long, value_name = "LEVELS", hide = true)]
    depth: Option<i64>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("ppurge: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let now = chrono::Local::now();

    let log_name = now.format("ppurge-%Y.%m.%d-%H_%M_%S.log").to_string();
    let log = File::create(&log_name).map_err(|e| PwalkError::LogOpen {
        path: PathBuf::from(&log_name),
        source: e,
    })?;
    let diag = DiagSink::log_file(log);
    if cli.depth.is_some() {
        diag.note("--depth is reserved for directory-level purging and currently ignored");
    }

    // The walk must reach every user's files, so root is mandatory.
    nix::unistd::setuid(nix::unistd::Uid::from_raw(0)).map_err(|e| PwalkError::Privilege {
        details: format!("unable to setuid root; not all files would be processed ({e})"),
    })?;
    // Quarantine directories must come out exactly 01777, like /tmp.
    nix::sys::stat::umask(nix::sys::stat::Mode::empty());

    let root = PathScratch::new(&cli.directory).as_path().to_path_buf();
    let clock = PurgeClock::new(now.timestamp(), cli.purge_days);
    run_purge(&root, clock, OutputSink::stdout(), diag)
}
