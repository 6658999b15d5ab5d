// result.rs — Violations, validation results, and outcome aggregation.
//
// A fired rule becomes a PolicyViolation. Whether it blocks is decided by
// which list it lands in (violations vs. warnings), not by a field on the
// record. The Aggregator folds fired rules into one ValidationResult using a
// strict precedence: block > require_approval > warn > log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::{PolicyAction, PolicyRule, Severity};

/// Separator used when joining approval reasons.
pub const APPROVAL_REASON_SEPARATOR: &str = "; ";

/// Record produced when a rule fires (or a prompt pattern matches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyViolation {
    /// Name of the rule (or prompt check) that fired.
    pub policy_name: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PolicyViolation {
    pub fn new(
        policy_name: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            policy_name: policy_name.into(),
            severity,
            message: message.into(),
            remediation: None,
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Build the violation record for a fired rule.
    pub fn from_rule(policy_set: &str, rule: &PolicyRule) -> Self {
        Self {
            remediation: rule.remediation.clone(),
            details: serde_json::json!({
                "policy_set": policy_set,
                "condition": rule.condition,
                "on_violation": rule.on_violation,
            }),
            ..Self::new(&rule.name, rule.severity, &rule.description)
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Same content ignoring the timestamp.
    pub fn same_content(&self, other: &Self) -> bool {
        self.policy_name == other.policy_name
            && self.severity == other.severity
            && self.message == other.message
            && self.remediation == other.remediation
            && self.details == other.details
    }
}

/// The engine's verdict for one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub violations: Vec<PolicyViolation>,
    pub warnings: Vec<PolicyViolation>,
    pub action_required: PolicyAction,
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_reason: Option<String>,
}

impl ValidationResult {
    /// Names of rules in the violations list.
    pub fn violated_rules(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.policy_name.clone()).collect()
    }

    /// Names of rules in the warnings list.
    pub fn warned_rules(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.policy_name.clone()).collect()
    }

    /// Mark this result as needing approval, raising the outcome to at
    /// least `RequireApproval` (a `Block` outcome stays).
    pub fn escalate_to_approval(&mut self) {
        self.requires_approval = true;
        self.action_required = self.action_required.max(PolicyAction::RequireApproval);
    }

    /// Add an approval reason after any existing ones.
    pub fn append_approval_reason(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.approval_reason = Some(match self.approval_reason.take() {
            Some(existing) if !existing.is_empty() => {
                format!("{}{}{}", existing, APPROVAL_REASON_SEPARATOR, reason)
            }
            _ => reason,
        });
    }

    /// Compare two results ignoring violation timestamps.
    pub fn same_content(&self, other: &Self) -> bool {
        fn lists_match(a: &[PolicyViolation], b: &[PolicyViolation]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_content(y))
        }
        self.is_valid == other.is_valid
            && self.action_required == other.action_required
            && self.requires_approval == other.requires_approval
            && self.approval_reason == other.approval_reason
            && lists_match(&self.violations, &other.violations)
            && lists_match(&self.warnings, &other.warnings)
    }
}

/// Folds fired rules into a ValidationResult.
#[derive(Debug, Default)]
pub struct Aggregator {
    violations: Vec<PolicyViolation>,
    warnings: Vec<PolicyViolation>,
    approval_reasons: Vec<String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fired rule according to its disposition.
    pub fn record(&mut self, policy_set: &str, rule: &PolicyRule) {
        let violation = PolicyViolation::from_rule(policy_set, rule);
        match rule.on_violation {
            PolicyAction::Block => self.violations.push(violation),
            PolicyAction::RequireApproval => {
                self.approval_reasons.push(rule.description.clone());
                self.warnings.push(violation);
            }
            PolicyAction::Warn | PolicyAction::Log => self.warnings.push(violation),
        }
    }

    /// Add a blocking violation directly (used by the prompt validator).
    pub fn block(&mut self, violation: PolicyViolation) {
        self.violations.push(violation);
    }

    /// Add a non-blocking warning directly (used by the prompt validator).
    pub fn warn(&mut self, warning: PolicyViolation) {
        self.warnings.push(warning);
    }

    pub fn finish(self) -> ValidationResult {
        let requires_approval = !self.approval_reasons.is_empty();
        let (is_valid, action_required) = if !self.violations.is_empty() {
            (false, PolicyAction::Block)
        } else if requires_approval {
            (true, PolicyAction::RequireApproval)
        } else if !self.warnings.is_empty() {
            (true, PolicyAction::Warn)
        } else {
            (true, PolicyAction::Log)
        };

        ValidationResult {
            is_valid,
            violations: self.violations,
            warnings: self.warnings,
            action_required,
            requires_approval,
            approval_reason: if requires_approval {
                Some(self.approval_reasons.join(APPROVAL_REASON_SEPARATOR))
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Predicate;

    fn rule(name: &str, on_violation: PolicyAction) -> PolicyRule {
        PolicyRule {
            name: name.to_string(),
            description: format!("{} fired", name),
            severity: Severity::Warning,
            on_violation,
            predicate: Predicate::GpuEnabled,
            condition: "uses GPU".to_string(),
            remediation: None,
        }
    }

    #[test]
    fn empty_aggregation_is_log() {
        let result = Aggregator::new().finish();
        assert!(result.is_valid);
        assert!(result.violations.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.action_required, PolicyAction::Log);
        assert!(!result.requires_approval);
        assert_eq!(result.approval_reason, None);
    }

    #[test]
    fn block_wins_over_everything() {
        let mut agg = Aggregator::new();
        agg.record("s", &rule("a", PolicyAction::RequireApproval));
        agg.record("s", &rule("b", PolicyAction::Warn));
        agg.record("s", &rule("c", PolicyAction::Block));
        agg.record("s", &rule("d", PolicyAction::RequireApproval));
        let result = agg.finish();

        assert!(!result.is_valid);
        assert_eq!(result.action_required, PolicyAction::Block);
        assert_eq!(result.violated_rules(), vec!["c"]);
        assert_eq!(result.warned_rules(), vec!["a", "b", "d"]);
        // Approval flags still reflect the approval rules that fired.
        assert!(result.requires_approval);
    }

    #[test]
    fn approval_reasons_are_joined_in_order() {
        let mut agg = Aggregator::new();
        agg.record("s", &rule("first", PolicyAction::RequireApproval));
        agg.record("s", &rule("second", PolicyAction::RequireApproval));
        let result = agg.finish();

        assert!(result.is_valid);
        assert_eq!(result.action_required, PolicyAction::RequireApproval);
        assert_eq!(
            result.approval_reason.as_deref(),
            Some("first fired; second fired")
        );
    }

    #[test]
    fn log_disposition_lands_in_warnings() {
        let mut agg = Aggregator::new();
        agg.record("s", &rule("quiet", PolicyAction::Log));
        let result = agg.finish();
        assert_eq!(result.warned_rules(), vec!["quiet"]);
        assert_eq!(result.action_required, PolicyAction::Warn);
    }

    #[test]
    fn escalation_keeps_block() {
        let mut agg = Aggregator::new();
        agg.record("s", &rule("c", PolicyAction::Block));
        let mut result = agg.finish();
        result.escalate_to_approval();
        assert_eq!(result.action_required, PolicyAction::Block);
        assert!(result.requires_approval);

        let mut clean = Aggregator::new().finish();
        clean.escalate_to_approval();
        assert_eq!(clean.action_required, PolicyAction::RequireApproval);
    }

    #[test]
    fn append_reason_joins_with_separator() {
        let mut result = Aggregator::new().finish();
        result.append_approval_reason("one");
        result.append_approval_reason("two");
        assert_eq!(result.approval_reason.as_deref(), Some("one; two"));
    }
}
