// audit.rs — In-process, append-only audit log of validation calls.
//
// One AuditEntry per validation call. Entries are never mutated or removed
// for the life of the process. The entry list is the only mutable shared
// state in the engine, so every append and every read goes through one
// mutex; readers get a cloned snapshot and never see a half-written entry.
//
// Durable retention is not handled here. Callers that want it attach an
// AuditSink (e.g. the JSONL archive in gr-audit) and every appended entry
// is mirrored to it, in the same order it was appended. Sink failures are
// logged and never reach the caller.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::ProposedAction;
use crate::error::PolicyError;
use crate::result::ValidationResult;
use crate::rule::PolicyAction;

/// Action type recorded for prompt validations.
pub const PROMPT_ACTION_TYPE: &str = "validate_prompt";

/// Which validator produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOrigin {
    Action,
    Prompt,
}

/// One row per validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique per entry (UUID v4).
    pub entry_id: Uuid,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    pub origin: AuditOrigin,
    /// The action's declared type, `validate_prompt` for prompts, or
    /// "unknown" when the action had none.
    pub action_type: String,
    /// "<type> on <target>".
    pub action_summary: String,
    /// Mirrors `ValidationResult::is_valid`.
    pub passed: bool,
    /// Names of rules that blocked.
    pub violations: Vec<String>,
    /// Names of rules that warned or asked for approval.
    pub warnings: Vec<String>,
    /// Aggregated outcome of the call.
    pub action_taken: PolicyAction,
    pub requires_approval: bool,
}

impl AuditEntry {
    /// Build an entry for an action validation. Missing fields degrade to
    /// "unknown"; this never fails.
    pub fn for_action(action: &ProposedAction, result: &ValidationResult) -> Self {
        Self::build(
            AuditOrigin::Action,
            action.action_type().unwrap_or("unknown").to_string(),
            action.summary(),
            result,
        )
    }

    /// Build an entry for a prompt validation. Only the prompt length is
    /// recorded; the text itself may carry credentials.
    pub fn for_prompt(prompt: &str, result: &ValidationResult) -> Self {
        Self::build(
            AuditOrigin::Prompt,
            PROMPT_ACTION_TYPE.to_string(),
            format!("prompt ({} chars)", prompt.chars().count()),
            result,
        )
    }

    fn build(
        origin: AuditOrigin,
        action_type: String,
        action_summary: String,
        result: &ValidationResult,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            origin,
            action_type,
            action_summary,
            passed: result.is_valid,
            violations: result.violated_rules(),
            warnings: result.warned_rules(),
            action_taken: result.action_required,
            requires_approval: result.requires_approval,
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        if self.passed {
            "passed"
        } else {
            "failed"
        }
    }
}

/// Ordering for audit queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuditOrder {
    #[default]
    Insertion,
    MostRecentFirst,
}

/// Filter for [`AuditLog::query`]. Filters apply first, then ordering,
/// then truncation to `limit`.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Exact match on `action_type`.
    pub action_type: Option<String>,
    /// Only entries at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Only entries at or before this time.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub order: AuditOrder,
}

impl AuditQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_type(action_type: impl Into<String>) -> Self {
        Self {
            action_type: Some(action_type.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn most_recent_first(mut self) -> Self {
        self.order = AuditOrder::MostRecentFirst;
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        self.action_type
            .as_deref()
            .map_or(true, |t| entry.action_type == t)
            && self.since.map_or(true, |since| entry.timestamp >= since)
            && self.until.map_or(true, |until| entry.timestamp <= until)
    }
}

/// Receives a copy of every appended entry.
pub trait AuditSink: Send + Sync {
    /// Errors are logged but don't stop validation.
    fn record(&self, entry: &AuditEntry) -> Result<(), PolicyError>;
}

/// The append-only audit log.
#[derive(Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror every appended entry to `sink` (builder pattern).
    pub fn with_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Record an action validation.
    pub fn append(&self, action: &ProposedAction, result: &ValidationResult) -> AuditEntry {
        self.push(AuditEntry::for_action(action, result))
    }

    /// Record a prompt validation.
    pub fn append_prompt(&self, prompt: &str, result: &ValidationResult) -> AuditEntry {
        self.push(AuditEntry::for_prompt(prompt, result))
    }

    fn push(&self, entry: AuditEntry) -> AuditEntry {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push(entry.clone());

        tracing::info!(
            "audit: {} - {}",
            entry.action_type,
            entry.outcome_label()
        );

        // Sinks run under the lock so every sink sees entries in log order.
        for sink in &self.sinks {
            if let Err(e) = sink.record(&entry) {
                tracing::warn!("audit sink error: {}", e);
            }
        }
        entry
    }

    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let mut matched: Vec<AuditEntry> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        if query.order == AuditOrder::MostRecentFirst {
            matched.reverse();
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        matched
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
