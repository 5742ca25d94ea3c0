//! Shared test infrastructure for the pwalk tool family.
//!
//! Provides tree-building helpers, a quote-aware CSV splitter for record
//! assertions, a shared capture buffer for library-level walks, and binary
//! runners for CLI-level tests.

// Not every test binary uses every item; suppress dead-code warnings for the
// shared module.
#![allow(dead_code)]

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use filetime::FileTime;
use parking_lot::Mutex;

use pwalk::engine::output::OutputSink;

/// Writer handing its bytes back to the asserting test.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    pub fn sink(&self) -> OutputSink {
        OutputSink::new(Box::new(self.clone()))
    }

    pub fn lines(&self) -> Vec<String> {
        let data = self.0.lock();
        String::from_utf8_lossy(&data)
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

/// Write `len` bytes of filler at `path`.
pub fn file_of_size(path: &Path, len: usize) {
    fs::write(path, vec![b'x'; len]).expect("write fixture file");
}

/// Set atime and mtime to `days` days before now.
pub fn age_by_days(path: &Path, days: i64) {
    let now = chrono::Utc::now().timestamp();
    let t = FileTime::from_unix_time(now - days * 86_400, 0);
    filetime::set_file_times(path, t, t).expect("age fixture");
}

/// Split one CSV line into unquoted fields ("" collapses to a quote).
pub fn csv_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

/// Find the record whose path field (index `path_idx`) equals `path`.
pub fn record_for<'a>(lines: &'a [String], path_idx: usize, path: &Path) -> Option<Vec<String>> {
    let want = path.to_string_lossy();
    lines
        .iter()
        .map(|l| csv_fields(l))
        .find(|f| f.get(path_idx).map(String::as_str) == Some(want.as_ref()))
}

fn run_bin(exe: &str, args: &[&str], cwd: &Path) -> Output {
    Command::new(exe)
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("execute tool binary")
}

pub fn run_pwalk(args: &[&str], cwd: &Path) -> Output {
    run_bin(env!("CARGO_BIN_EXE_pwalk"), args, cwd)
}

pub fn run_ppurge(args: &[&str], cwd: &Path) -> Output {
    run_bin(env!("CARGO_BIN_EXE_ppurge"), args, cwd)
}

pub fn run_repairshr(args: &[&str], cwd: &Path) -> Output {
    run_bin(env!("CARGO_BIN_EXE_repairshr"), args, cwd)
}

pub fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

pub fn stderr_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}
