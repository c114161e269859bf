//! Error types for transcoding
//!
//! Only the failures that abort a whole run surface here. Per-target and
//! per-asset problems are logged and counted in the run reports instead.

use std::path::PathBuf;

/// Errors returned by the disassembler, reassembler and archive codec
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed project manifest {path}: {reason}")]
    MalformedManifest { path: PathBuf, reason: String },

    #[error("Archive error on {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl TranscodeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TranscodeError> = std::result::Result<T, E>;
