// error.rs — Error types for the policy subsystem.
//
// Rule violations are never errors: they come back as data inside a
// ValidationResult. These variants cover loading, configuration and
// caller misuse (e.g. asking for an export format we don't speak).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Failed to read a policy file or directory.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A policy definition could not be parsed.
    #[error("malformed policy definition '{name}': {reason}")]
    MalformedDefinition { name: String, reason: String },

    /// The caller asked for an export format that is not supported.
    #[error("unsupported export format '{0}' (expected 'yaml' or 'json')")]
    UnsupportedFormat(String),

    /// Serializing policies for export failed.
    #[error("failed to serialize policies: {0}")]
    ExportFailed(String),

    /// The guardrails config file is malformed.
    #[error("invalid config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// An audit sink failed to record an entry (non-fatal, logged only).
    #[error("audit sink error: {0}")]
    SinkError(String),
}
