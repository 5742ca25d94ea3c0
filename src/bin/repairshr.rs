#![forbid(unsafe_code)]

//! repairshr — repair permissions on shared project folders.
//!
//! Ensures directories carry the set-gid bit, entries grant the group at
//! least read (plus execute on directories), and group owners that are
//! private, root, or scheduled for retirement are replaced by the nearest
//! suitable ancestor group.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::TypedValueParser;

use pwalk::core::errors::Result;
use pwalk::core::exclude::ExcludeSet;
use pwalk::engine::output::{DiagSink, OutputSink};
use pwalk::engine::pool::MAX_WORKERS;
use pwalk::engine::scratch::PathScratch;
use pwalk::repair::policy::RepairOptions;
use pwalk::repair::walker::{RepairConfig, run_repair};

/// Parallel shared-folder permission repair.
#[derive(Debug, Parser)]
#[command(
    name = "repairshr",
    version,
    about = "Repair set-gid bits, group access, and group owners on shared folders",
    long_about = None
)]
struct Cli {
    /// Shared folder to repair.
    directory: PathBuf,

    /// Show changes without making them.
    #[arg(long)]
    dry_run: bool,

    /// Ignore .snapshot directories.
    #[arg(long = "no-snap")]
    no_snap: bool,

    /// Full path to exclude from descent (repeatable).
    #[arg(long, value_name = "PATH")]
    exclude: Vec<PathBuf>,

    /// Comma-separated group ids to migrate to the next suitable group up.
    #[arg(long, value_name = "GIDS", value_delimiter = ',')]
    change_gids: Vec<u32>,

    /// Make all files and folders group readable and writable.
    #[arg(long)]
    force_group_writable: bool,

    /// Maximum number of worker threads.
    #[arg(
        long,
        value_name = "NUM",
        default_value_t = MAX_WORKERS,
        value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize)
    )]
    threads: usize,

    /// Stay on one file system.
    #[arg(short = 'x', long)]
    one_file_system: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("repairshr: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = PathScratch::new(&cli.directory).as_path().to_path_buf();
    let diag = DiagSink::stderr();

    let exclude = ExcludeSet::from_paths(cli.exclude);
    for missing in exclude.missing_entries() {
        diag.note(&format!("exclude path not found: {}", missing.display()));
    }

    if cli.dry_run {
        println!("Dry run mode: no changes will be made to the file system");
    }

    let cfg = RepairConfig {
        dry_run: cli.dry_run,
        ignore_snapshots: cli.no_snap,
        one_file_system: cli.one_file_system,
        exclude,
        options: RepairOptions {
            force_group_writable: cli.force_group_writable,
            change_gids: cli.change_gids,
        },
        threads: cli.threads,
    };
    run_repair(&root, cfg, OutputSink::stdout(), diag)
}
