// archive.rs — Append-only, hash-chained JSONL archive.
//
// One JSON object per line:
//
//   {"sequence":1,"archived_at":"...","previous_hash":null,"record":{...}}
//
// `previous_hash` is the SHA-256 of the raw previous line, and `sequence`
// counts up from 1 without gaps. Reopening an existing archive recovers both
// from the last line, so appends continue the same chain across restarts.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::hasher;

/// One archived line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedRecord<T> {
    pub sequence: u64,
    pub archived_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub record: T,
}

/// Chain position recovered from the tail of an archive.
#[derive(Debug, Clone, Default)]
struct ChainHead {
    sequence: u64,
    last_hash: Option<String>,
}

/// An append-only archive backed by a JSONL file.
pub struct AuditArchive {
    writer: BufWriter<File>,
    path: PathBuf,
    head: ChainHead,
}

impl AuditArchive {
    /// Open (or create) an archive. Parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source| AuditError::OpenFailed {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_failed)?;
        }

        let head = if path.exists() {
            Self::read_head(&path)?
        } else {
            ChainHead::default()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_failed)?;

        tracing::debug!(path = %path.display(), sequence = head.sequence, "audit archive opened");

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            head,
        })
    }

    /// Append a record, linking it to the previous line. Flushes before
    /// returning. Returns the sequence number assigned.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<u64, AuditError> {
        let archived = ArchivedRecord {
            sequence: self.head.sequence + 1,
            archived_at: Utc::now(),
            previous_hash: self.head.last_hash.clone(),
            record,
        };
        let line = serde_json::to_string(&archived)?;

        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;

        self.head = ChainHead {
            sequence: archived.sequence,
            last_hash: Some(hasher::hash_str(&line)),
        };
        Ok(archived.sequence)
    }

    /// Read every record, oldest first. Blank lines are skipped.
    pub fn read_all<T: DeserializeOwned>(
        path: impl AsRef<Path>,
    ) -> Result<Vec<ArchivedRecord<T>>, AuditError> {
        let mut records = Vec::new();
        for line in Self::lines(path.as_ref())? {
            let (_, line) = line?;
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// Check every link and sequence number. Returns the number of records
    /// verified, or the first `IntegrityViolation`.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let mut expected_hash: Option<String> = None;
        let mut expected_sequence = 1u64;
        let mut count = 0;

        for line in Self::lines(path.as_ref())? {
            let (line_num, line) = line?;
            let archived: ArchivedRecord<serde_json::Value> = serde_json::from_str(&line)?;

            if archived.previous_hash != expected_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num,
                    expected: expected_hash.unwrap_or_else(|| "None".to_string()),
                    actual: archived.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            if archived.sequence != expected_sequence {
                return Err(AuditError::IntegrityViolation {
                    line: line_num,
                    expected: format!("sequence {}", expected_sequence),
                    actual: format!("sequence {}", archived.sequence),
                });
            }

            // Hash the raw line; re-serializing could reorder fields.
            expected_hash = Some(hasher::hash_str(&line));
            expected_sequence += 1;
            count += 1;
        }

        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number of the last appended record (0 when empty).
    pub fn sequence(&self) -> u64 {
        self.head.sequence
    }

    fn read_head(path: &Path) -> Result<ChainHead, AuditError> {
        let mut last: Option<String> = None;
        for line in Self::lines(path)? {
            last = Some(line?.1);
        }

        match last {
            None => Ok(ChainHead::default()),
            Some(line) => {
                let archived: ArchivedRecord<serde_json::Value> = serde_json::from_str(&line)?;
                Ok(ChainHead {
                    sequence: archived.sequence,
                    last_hash: Some(hasher::hash_str(&line)),
                })
            }
        }
    }

    /// Non-blank lines with their 1-based line numbers.
    fn lines(
        path: &Path,
    ) -> Result<impl Iterator<Item = Result<(usize, String), AuditError>>, AuditError> {
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(BufReader::new(file)
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match line {
                Ok(l) if l.trim().is_empty() => None,
                Ok(l) => Some(Ok((index + 1, l))),
                Err(e) => Some(Err(AuditError::from(e))),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        action_type: String,
        passed: bool,
    }

    fn entry(action_type: &str, passed: bool) -> Entry {
        Entry {
            action_type: action_type.to_string(),
            passed,
        }
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let mut archive = AuditArchive::open(&path).unwrap();
            assert_eq!(archive.append(&entry("create_cluster", true)).unwrap(), 1);
            assert_eq!(archive.append(&entry("delete_cluster", false)).unwrap(), 2);
        }

        let records: Vec<ArchivedRecord<Entry>> = AuditArchive::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record, entry("create_cluster", true));
        assert!(records[0].previous_hash.is_none());
        assert!(records[1].previous_hash.is_some());
        assert_eq!(records[1].sequence, 2);
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".gr").join("audit.jsonl");
        let mut archive = AuditArchive::open(&path).unwrap();
        archive.append(&json!({"n": 1})).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn reopen_continues_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        AuditArchive::open(&path).unwrap().append(&entry("a", true)).unwrap();
        let mut reopened = AuditArchive::open(&path).unwrap();
        assert_eq!(reopened.sequence(), 1);
        reopened.append(&entry("b", true)).unwrap();

        assert_eq!(AuditArchive::verify_chain(&path).unwrap(), 2);
    }

    #[test]
    fn edited_line_breaks_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let mut archive = AuditArchive::open(&path).unwrap();
            for t in ["a", "b", "c"] {
                archive.append(&entry(t, false)).unwrap();
            }
        }

        let content = std::fs::read_to_string(&path).unwrap();
        // Flip the verdict on the first record.
        let tampered = content.replacen("\"passed\":false", "\"passed\":true", 1);
        std::fs::write(&path, tampered).unwrap();

        match AuditArchive::verify_chain(&path) {
            Err(AuditError::IntegrityViolation { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected integrity violation, got {:?}", other),
        }
    }

    #[test]
    fn deleted_line_breaks_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let mut archive = AuditArchive::open(&path).unwrap();
            for t in ["a", "b", "c"] {
                archive.append(&entry(t, true)).unwrap();
            }
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let kept: Vec<&str> = content.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
        std::fs::write(&path, kept.join("\n") + "\n").unwrap();

        assert!(matches!(
            AuditArchive::verify_chain(&path),
            Err(AuditError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn missing_archive_is_open_error() {
        let dir = tempdir().unwrap();
        let result = AuditArchive::verify_chain(dir.path().join("nope.jsonl"));
        assert!(matches!(result, Err(AuditError::OpenFailed { .. })));
    }
}
