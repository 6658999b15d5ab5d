//! # gr-audit
//!
//! Durable, tamper-evident archive for guardrail audit entries.
//!
//! Records are appended to a JSONL file, one [`ArchivedRecord`] per line.
//! Each line carries the SHA-256 of the line before it, so inserting,
//! deleting or editing a line breaks the chain and
//! [`AuditArchive::verify_chain`] reports where.
//!
//! The archive is generic over the record type; it does not depend on the
//! policy engine.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use gr_audit::AuditArchive;
//!
//! let mut archive = AuditArchive::open("/tmp/audit.jsonl").unwrap();
//! archive.append(&serde_json::json!({"action_type": "delete_cluster"})).unwrap();
//! assert!(AuditArchive::verify_chain("/tmp/audit.jsonl").is_ok());
//! ```

pub mod archive;
pub mod error;
pub mod hasher;

pub use archive::{ArchivedRecord, AuditArchive};
pub use error::AuditError;
