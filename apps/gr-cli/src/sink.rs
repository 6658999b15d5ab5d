// sink.rs — Mirrors in-memory audit entries into the durable archive.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use gr_audit::{AuditArchive, AuditError};
use gr_policy::{AuditEntry, AuditSink, PolicyError};

/// An [`AuditSink`] that appends every entry to a hash-chained JSONL file.
pub struct ArchiveSink {
    archive: Mutex<AuditArchive>,
}

impl ArchiveSink {
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        Ok(Self {
            archive: Mutex::new(AuditArchive::open(path)?),
        })
    }
}

impl AuditSink for ArchiveSink {
    fn record(&self, entry: &AuditEntry) -> Result<(), PolicyError> {
        let mut archive = self.archive.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = archive
            .append(entry)
            .map_err(|e| PolicyError::SinkError(e.to_string()))?;
        tracing::debug!(sequence, entry_id = %entry.entry_id, "audit entry archived");
        Ok(())
    }
}
