//! # gr-policy
//!
//! Policy engine that sits between "an AI assistant proposed an action" and
//! "the action runs against live infrastructure".
//!
//! Declarative rules are grouped into named policy sets and loaded from YAML
//! (or the built-in `security` / `cost` / `compliance` sets). Each rule's
//! condition resolves at load time to a closed [`Predicate`]. A validation
//! call evaluates the selected rules against a [`ProposedAction`], folds the
//! fired rules into one [`ValidationResult`], and appends an [`AuditEntry`].
//!
//! ## Key invariants
//!
//! - **Block precedence is total**: any fired `block` rule makes the result
//!   invalid with `action_required == Block`, whatever else fired.
//! - **Fail-open, but visibly**: a rule that cannot be evaluated is never a
//!   violation, and is reported as [`RuleOutcome::Skipped`], not `Satisfied`.
//! - **Snapshots are immutable**: reload publishes a fresh snapshot with one
//!   `Arc` swap; in-flight evaluations keep the snapshot they started with.
//! - **Validation failure is data**: only misuse (e.g. an unsupported export
//!   format) returns an error.

pub mod action;
pub mod audit;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod prompt;
pub mod result;
pub mod rule;
pub mod store;

pub use action::{Attr, EvaluationContext, ProposedAction};
pub use audit::{AuditEntry, AuditLog, AuditOrder, AuditOrigin, AuditQuery, AuditSink};
pub use config::GuardrailsConfig;
pub use defaults::builtin_policy_sets;
pub use engine::{EvaluationTrace, PolicyEngine, RuleTrace};
pub use error::PolicyError;
pub use evaluator::{RuleOutcome, SkipReason};
pub use gate::{ActionCategories, ActionCategory, ActionValidator, ApprovalMode};
pub use prompt::PromptValidator;
pub use result::{PolicyViolation, ValidationResult};
pub use rule::{PolicyAction, PolicyRule, PolicySet, Predicate, Severity};
pub use store::{ExportFormat, LoadReport, PolicySnapshot, PolicySource, PolicyStore};
