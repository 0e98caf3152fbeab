//! Codec error types.
//!
//! Only file mutation can fail loudly: malformed chunk data degrades to
//! best-effort results instead of surfacing errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while writing provenance chunks.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The target file is not a valid PNG.
    #[error("not a valid png file: {path}")]
    NotPng {
        /// Path of the rejected file.
        path: PathBuf,
    },

    /// The safety backup could not be created or verified.
    #[error("backup failed for {path}: {message}")]
    BackupFailed {
        /// Path of the file being protected.
        path: PathBuf,
        /// Why the backup was rejected.
        message: String,
    },

    /// The rewritten file failed the post-write size check.
    #[error("write verification failed for {path}")]
    WriteVerification {
        /// Path of the file that failed verification.
        path: PathBuf,
    },

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
