//! PWK-prefixed error types with structured error codes.
//!
//! Only start-up failures are represented here: bad configuration and root
//! setup. Per-entry failures during a walk are diagnostics, not errors;
//! they are logged with entry-local context and never terminate the walk.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PwalkError>;

/// Top-level error type for the pwalk tool family.
#[derive(Debug, Error)]
pub enum PwalkError {
    #[error("[PWK-1001] invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("[PWK-1002] unreadable exclude file {path}: {details}")]
    ExcludeFile { path: PathBuf, details: String },

    #[error("[PWK-2001] cannot stat root directory {path}: {source}")]
    RootStat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PWK-2002] cannot open root directory {path}: {source}")]
    RootOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PWK-2003] cannot acquire root privileges: {details}")]
    Privilege { details: String },

    #[error("[PWK-2004] cannot open log file {path}: {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PWK-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PwalkError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "PWK-1001",
            Self::ExcludeFile { .. } => "PWK-1002",
            Self::RootStat { .. } => "PWK-2001",
            Self::RootOpen { .. } => "PWK-2002",
            Self::Privilege { .. } => "PWK-2003",
            Self::LogOpen { .. } => "PWK-2004",
            Self::Io { .. } => "PWK-3001",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_errors() -> Vec<PwalkError> {
        let ioe = || std::io::Error::new(std::io::ErrorKind::Other, "test");
        vec![
            PwalkError::InvalidArgument {
                details: String::new(),
            },
            PwalkError::ExcludeFile {
                path: PathBuf::new(),
                details: String::new(),
            },
            PwalkError::RootStat {
                path: PathBuf::new(),
                source: ioe(),
            },
            PwalkError::RootOpen {
                path: PathBuf::new(),
                source: ioe(),
            },
            PwalkError::Privilege {
                details: String::new(),
            },
            PwalkError::LogOpen {
                path: PathBuf::new(),
                source: ioe(),
            },
            PwalkError::Io {
                path: PathBuf::new(),
                source: ioe(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = sample_errors();
        let codes: Vec<&str> = errors.iter().map(PwalkError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_display_includes_code() {
        for err in sample_errors() {
            assert!(
                err.to_string().contains(err.code()),
                "display should contain error code: {err}"
            );
        }
    }

    #[test]
    fn io_convenience_constructor() {
        let err = PwalkError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "PWK-3001");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }
}
