// error.rs — Error types for the audit archive.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or reading the archive.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the archive file.
    #[error("failed to open audit archive at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a record.
    #[error("failed to append record: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// A record could not be serialized, or a line is not valid JSON.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The archive has been tampered with: the hash chain or the sequence
    /// numbering is broken.
    #[error("integrity check failed at line {line}: expected {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
