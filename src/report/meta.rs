//! The meta-report action: one CSV line of inode metadata per invocation.
//!
//! Field order is fixed for database ingestion:
//!
//! ```text
//! inode, parent_inode, depth, "path", "extension",
//! uid, gid, size, device, block_count,
//! link_count, "mode_octal_7",
//! atime, mtime, ctime,
//! file_count, dir_size
//! ```
//!
//! Only path, extension, and mode are quoted. `file_count` is `-1` on file
//! records; on directory summaries it is the number of direct children and
//! `dir_size` the sum of their no-follow sizes (non-recursive; a
//! subdirectory contributes the directory file's own size).

use std::io::Write;
use std::os::unix::fs::MetadataExt;

use crate::engine::output::DiagSink;
use crate::report::csv::csv_escape;
use crate::report::walker::{Action, EntryRecord};

/// CSV header row matching the record schema.
pub const CSV_HEADER: &str = "inode,parent_inode,depth,\"path\",\"extension\",\
uid,gid,size,device,block_count,link_count,\"mode\",atime,mtime,ctime,\
file_count,dir_size\n";

/// Emits the inode-metadata CSV stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaReport {
    /// Emit the header row before any record.
    pub header: bool,
}

impl Action for MetaReport {
    fn preamble(&self, out: &mut dyn Write) {
        if self.header {
            let _ = out.write_all(CSV_HEADER.as_bytes());
        }
    }

    fn emit(&self, e: &EntryRecord<'_>, out: &mut dyn Write, diag: &DiagSink) {
        let s = e.stat;
        let mut rec = Vec::with_capacity(e.path.len() + 96);
        let _ = write!(rec, "{},{},{},\"", s.ino(), e.parent_inode, e.depth);
        let dropped = csv_escape(e.path, &mut rec);
        rec.extend_from_slice(b"\",\"");
        let dropped = dropped + csv_escape(e.extension.unwrap_or_default(), &mut rec);
        let _ = writeln!(
            rec,
            "\",{},{},{},{},{},{},\"{:07o}\",{},{},{},{},{}",
            s.uid(),
            s.gid(),
            s.size(),
            s.dev(),
            s.blocks(),
            s.nlink(),
            s.mode(),
            s.atime(),
            s.mtime(),
            s.ctime(),
            e.file_count,
            e.dir_size,
        );
        if dropped > 0 {
            diag.note(&format!(
                "bad file name: {}",
                String::from_utf8_lossy(e.path)
            ));
        }
        let _ = out.write_all(&rec);
    }
}
