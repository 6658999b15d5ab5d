// engine.rs — The policy engine: the single entry point validators call.
//
// Owns the policy store, the audit log, and the default evaluation context.
// Each validation takes one snapshot of the store, runs every selected rule
// through the evaluator, folds fired rules through the Aggregator, and
// (for the `validate_*` entry points) appends one audit entry.
//
// Nothing here holds a lock across evaluation: the snapshot is an `Arc`
// clone, and the audit append is the only serialized step.

use serde::Serialize;

use crate::action::{EvaluationContext, ProposedAction};
use crate::audit::{AuditEntry, AuditLog, AuditQuery, AuditSink};
use crate::config::GuardrailsConfig;
use crate::error::PolicyError;
use crate::evaluator::{self, RuleOutcome};
use crate::gate::{ActionCategories, ActionValidator};
use crate::prompt::PromptValidator;
use crate::result::{Aggregator, ValidationResult};
use crate::store::{ExportFormat, LoadReport, PolicySource, PolicyStore};

/// One rule considered during an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTrace {
    pub policy_set: String,
    pub rule: String,
    pub outcome: RuleOutcome,
}

/// A result together with the ordered per-rule outcomes that produced it.
///
/// Lets an operator tell "rule evaluated and passed" apart from "rule
/// skipped because the action lacked the attribute".
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationTrace {
    pub result: ValidationResult,
    pub steps: Vec<RuleTrace>,
}

impl EvaluationTrace {
    /// Steps that were skipped rather than evaluated.
    pub fn skipped(&self) -> impl Iterator<Item = &RuleTrace> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, RuleOutcome::Skipped(_)))
    }
}

/// The policy engine.
pub struct PolicyEngine {
    store: PolicyStore,
    audit: AuditLog,
    prompts: PromptValidator,
    default_context: EvaluationContext,
    categories: ActionCategories,
}

impl PolicyEngine {
    /// An engine over an already-built store.
    pub fn new(store: PolicyStore) -> Self {
        Self {
            store,
            audit: AuditLog::new(),
            prompts: PromptValidator::new(),
            default_context: EvaluationContext::new(),
            categories: ActionCategories::default(),
        }
    }

    /// An engine over the built-in `security` / `cost` / `compliance` sets.
    pub fn builtin() -> Self {
        Self::new(PolicyStore::builtin())
    }

    /// Build an engine from project configuration. Policy loading never
    /// fails; the report says what was skipped.
    pub fn from_config(config: &GuardrailsConfig) -> (Self, LoadReport) {
        let (store, report) =
            PolicyStore::load(&PolicySource::Directory(config.policy_dir.clone()));
        let engine = Self::new(store)
            .with_default_context(config.default_context())
            .with_categories(config.action_categories());
        (engine, report)
    }

    /// Context used when a caller passes `None`.
    pub fn with_default_context(mut self, context: EvaluationContext) -> Self {
        self.default_context = context;
        self
    }

    pub fn with_categories(mut self, categories: ActionCategories) -> Self {
        self.categories = categories;
        self
    }

    /// Mirror every audit entry into `sink`.
    pub fn with_audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = std::mem::take(&mut self.audit).with_sink(sink);
        self
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    pub fn categories(&self) -> &ActionCategories {
        &self.categories
    }

    /// The authoritative gate, with this engine's action categories.
    pub fn action_validator(&self) -> ActionValidator<'_> {
        ActionValidator::new(self, self.categories.clone())
    }

    /// Evaluate an action against the selected sets (all when empty).
    /// Pure: nothing is audited.
    pub fn evaluate<S: AsRef<str>>(
        &self,
        action: &ProposedAction,
        policy_sets: &[S],
        context: Option<&EvaluationContext>,
    ) -> ValidationResult {
        self.run(action, policy_sets, context, None)
    }

    /// Like [`evaluate`](Self::evaluate), also returning every rule's outcome.
    pub fn evaluate_with_trace<S: AsRef<str>>(
        &self,
        action: &ProposedAction,
        policy_sets: &[S],
        context: Option<&EvaluationContext>,
    ) -> EvaluationTrace {
        let mut steps = Vec::new();
        let result = self.run(action, policy_sets, context, Some(&mut steps));
        EvaluationTrace { result, steps }
    }

    /// Evaluate an action and record the verdict in the audit log.
    pub fn validate_action<S: AsRef<str>>(
        &self,
        action: &ProposedAction,
        policy_sets: &[S],
        context: Option<&EvaluationContext>,
    ) -> ValidationResult {
        let result = self.evaluate(action, policy_sets, context);
        self.audit.append(action, &result);
        result
    }

    /// Screen raw prompt text and record the verdict in the audit log.
    pub fn validate_prompt(&self, text: &str) -> ValidationResult {
        let result = self.prompts.validate(text);
        self.audit.append_prompt(text, &result);
        result
    }

    pub fn audit_log(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        self.audit.query(query)
    }

    pub(crate) fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn export_policies(&self, format: ExportFormat) -> Result<String, PolicyError> {
        self.store.export(format)
    }

    /// Atomically replace the loaded policy sets.
    pub fn reload(&self, source: &PolicySource) -> LoadReport {
        self.store.reload(source)
    }

    fn run<S: AsRef<str>>(
        &self,
        action: &ProposedAction,
        policy_sets: &[S],
        context: Option<&EvaluationContext>,
        mut trace: Option<&mut Vec<RuleTrace>>,
    ) -> ValidationResult {
        let context = context.unwrap_or(&self.default_context);
        let snapshot = self.store.snapshot();
        let mut agg = Aggregator::new();

        for selected in snapshot.select(policy_sets) {
            let outcome = evaluator::evaluate(selected.rule, action, context);
            if outcome.is_violated() {
                agg.record(selected.policy_set, selected.rule);
            }
            if let Some(steps) = trace.as_deref_mut() {
                steps.push(RuleTrace {
                    policy_set: selected.policy_set.to_string(),
                    rule: selected.rule.name.clone(),
                    outcome,
                });
            }
        }

        agg.finish()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::builtin()
    }
}
