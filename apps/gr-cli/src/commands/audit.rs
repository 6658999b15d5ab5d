// audit.rs — Audit subcommands: verify, tail.

use std::path::PathBuf;

use clap::Subcommand;
use gr_audit::{ArchivedRecord, AuditArchive, AuditError};
use gr_policy::{AuditEntry, GuardrailsConfig};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the audit archive hash chain.
    Verify {
        /// Path to the archive (defaults to .gr/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show recent audit entries.
    Tail {
        /// Path to the archive (defaults to .gr/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of entries to show.
        #[arg(short, default_value = "10")]
        n: usize,
        /// Only entries with this action type.
        #[arg(long = "type")]
        action_type: Option<String>,
    },
}

pub fn execute(cmd: &AuditCommands, config: &GuardrailsConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => {
            let Some(path) = archive_path(log, config) else {
                println!("No audit archive configured.");
                return Ok(());
            };
            if !path.exists() {
                println!("No audit archive found at {}", path.display());
                return Ok(());
            }

            match AuditArchive::verify_chain(&path) {
                Ok(count) => {
                    println!("Audit archive verified: {} entry(ies), hash chain intact.", count);
                }
                Err(AuditError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected: {}", expected);
                    println!("  Actual:   {}", actual);
                    println!();
                    println!("The audit archive may have been tampered with.");
                    anyhow::bail!("Audit archive integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }

        AuditCommands::Tail {
            log,
            n,
            action_type,
        } => {
            let Some(path) = archive_path(log, config) else {
                println!("No audit archive configured.");
                return Ok(());
            };
            if !path.exists() {
                println!("No audit archive found at {}", path.display());
                return Ok(());
            }

            let records: Vec<ArchivedRecord<AuditEntry>> = AuditArchive::read_all(&path)?;
            let recent = tail(records, action_type.as_deref(), *n);
            if recent.is_empty() {
                println!("No audit entries.");
                return Ok(());
            }

            println!(
                "{:<20} {:<18} {:<7} {:<17} SUMMARY",
                "TIMESTAMP", "TYPE", "RESULT", "OUTCOME"
            );
            println!("{}", "-".repeat(90));
            for archived in recent {
                let entry = &archived.record;
                println!(
                    "{:<20} {:<18} {:<7} {:<17} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action_type,
                    entry.outcome_label(),
                    entry.action_taken.to_string(),
                    entry.action_summary,
                );
            }
        }
    }

    Ok(())
}

fn archive_path(log: &Option<PathBuf>, config: &GuardrailsConfig) -> Option<PathBuf> {
    log.clone().or_else(|| config.audit_archive.clone())
}

/// The last `n` records, optionally restricted to one action type.
fn tail(
    records: Vec<ArchivedRecord<AuditEntry>>,
    action_type: Option<&str>,
    n: usize,
) -> Vec<ArchivedRecord<AuditEntry>> {
    let mut matching: Vec<_> = records
        .into_iter()
        .filter(|r| action_type.map_or(true, |t| r.record.action_type == t))
        .collect();
    let start = matching.len().saturating_sub(n);
    matching.split_off(start)
}
