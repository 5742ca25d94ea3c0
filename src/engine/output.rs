//! Output sinks: one serialized record stream, one unserialized diagnostic
//! stream.
//!
//! Every structured record (CSV lines, change reports) goes through
//! [`OutputSink`], a single mutual-exclusion region around the process-wide
//! output stream; an action holding the region is the only action running,
//! so its bytes land contiguously. Diagnostics go through [`DiagSink`]
//! without a lock; they are short single writes and the OS-level write
//! atomicity is enough for them.

use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Serialized process-wide record stream. Cheap to clone; all clones share
/// the one lock and writer.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    /// Wrap any writer (tests pass shared buffers).
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Records go to stdout; this is the tools' normal configuration.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Run `f` while holding the output region. Everything `f` writes is one
    /// atomic emission as far as other workers are concerned.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Write) -> R) -> R {
        let mut guard = self.inner.lock();
        f(guard.as_mut())
    }

    /// Emit one complete record. Write failures on the record stream are
    /// deliberately not propagated: a broken pipe late in a multi-hour walk
    /// must not look like a walk failure.
    pub fn emit(&self, record: &[u8]) {
        let _ = self.inner.lock().write_all(record);
    }

    /// Flush buffered records; entry points call this after the last worker
    /// exits.
    pub fn flush(&self) {
        let _ = self.inner.lock().flush();
    }
}

/// Unserialized diagnostic stream: stderr, or ppurge's per-run log file.
#[derive(Clone)]
pub enum DiagSink {
    /// Per-entry errors and notices to standard error.
    Stderr,
    /// ppurge writes its diagnostics to a timestamped log file instead.
    LogFile(Arc<File>),
}

impl DiagSink {
    /// Diagnostics to standard error (pwalk, repairshr).
    #[must_use]
    pub fn stderr() -> Self {
        Self::Stderr
    }

    /// Diagnostics to an already-opened log file (ppurge).
    #[must_use]
    pub fn log_file(file: File) -> Self {
        Self::LogFile(Arc::new(file))
    }

    /// Write one diagnostic line (newline appended) as a single write.
    pub fn note(&self, line: &str) {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        match self {
            Self::Stderr => {
                let _ = io::stderr().write_all(&buf);
            }
            Self::LogFile(file) => {
                let mut f: &File = file;
                let _ = f.write_all(&buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Test writer sharing its buffer with the asserting test.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn emissions_are_not_interleaved() {
        let buf = SharedBuf::default();
        let sink = OutputSink::new(Box::new(buf.clone()));

        let mut workers = Vec::new();
        for n in 0..8u8 {
            let sink = sink.clone();
            workers.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    // Two writes under one region must stay contiguous.
                    sink.with(|w| {
                        w.write_all(&[b'a' + n; 16]).unwrap();
                        w.write_all(b"\n").unwrap();
                    });
                }
            }));
        }
        for w in workers {
            w.join().unwrap();
        }

        let data = buf.0.lock();
        for line in data.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
            assert_eq!(line.len(), 16);
            assert!(line.iter().all(|&b| b == line[0]), "interleaved record");
        }
    }

    #[test]
    fn diag_log_file_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diag.log");
        let diag = DiagSink::log_file(File::create(&path).unwrap());
        diag.note("first notice");
        diag.note("second notice");
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "first notice\nsecond notice\n");
    }
}
