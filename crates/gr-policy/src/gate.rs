// gate.rs — The action validator: the authoritative gate for one action.
//
// Runs the policy evaluation, then layers category-based approval on top:
//
//   destructive type → requires approval, reason overwritten
//   sensitive type   → requires approval, reason appended
//
// Either raises the outcome to at least `RequireApproval`; a `Block` stays a
// `Block`. `ApprovalMode::AutoApprove` skips the category step entirely and
// has to be chosen explicitly. The final verdict is audited once per call.

use std::collections::BTreeSet;

use crate::action::{EvaluationContext, ProposedAction};
use crate::engine::PolicyEngine;
use crate::result::ValidationResult;

/// Action types that always need explicit sign-off.
pub const DESTRUCTIVE_ACTIONS: &[&str] = &[
    "delete_cluster",
    "delete_profile",
    "scale_down",
    "terminate_node",
    "remove_pack",
];

/// Action types that need approval per policy.
pub const SENSITIVE_ACTIONS: &[&str] = &[
    "create_cluster",
    "upgrade_cluster",
    "modify_production",
    "change_network",
];

/// Whether category-based approval applies to a call.
///
/// No `Default`; callers always name the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    RequireApproval,
    /// Skip category approval (automated pipelines). Policy rules still apply.
    AutoApprove,
}

/// Category membership for declared action types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCategories {
    destructive: BTreeSet<String>,
    sensitive: BTreeSet<String>,
}

/// Which approval category an action type falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Destructive,
    Sensitive,
    Routine,
}

impl ActionCategories {
    pub fn new<D, S>(destructive: D, sensitive: S) -> Self
    where
        D: IntoIterator<Item = String>,
        S: IntoIterator<Item = String>,
    {
        Self {
            destructive: destructive.into_iter().collect(),
            sensitive: sensitive.into_iter().collect(),
        }
    }

    /// Destructive wins if a type is listed in both.
    pub fn classify(&self, action_type: &str) -> ActionCategory {
        if self.destructive.contains(action_type) {
            ActionCategory::Destructive
        } else if self.sensitive.contains(action_type) {
            ActionCategory::Sensitive
        } else {
            ActionCategory::Routine
        }
    }
}

impl Default for ActionCategories {
    fn default() -> Self {
        Self::new(
            DESTRUCTIVE_ACTIONS.iter().map(|s| s.to_string()),
            SENSITIVE_ACTIONS.iter().map(|s| s.to_string()),
        )
    }
}

/// Validates proposed actions against policy and approval categories.
pub struct ActionValidator<'a> {
    engine: &'a PolicyEngine,
    categories: ActionCategories,
}

impl<'a> ActionValidator<'a> {
    pub fn new(engine: &'a PolicyEngine, categories: ActionCategories) -> Self {
        Self { engine, categories }
    }

    /// Validate against every loaded set with the engine's default context.
    pub fn validate(&self, action: &ProposedAction, mode: ApprovalMode) -> ValidationResult {
        self.validate_with::<&str>(action, &[], None, mode)
    }

    pub fn validate_with<S: AsRef<str>>(
        &self,
        action: &ProposedAction,
        policy_sets: &[S],
        context: Option<&EvaluationContext>,
        mode: ApprovalMode,
    ) -> ValidationResult {
        let mut result = self.engine.evaluate(action, policy_sets, context);

        if mode == ApprovalMode::AutoApprove {
            tracing::debug!(action = %action.summary(), "auto-approve: category approval skipped");
        } else {
            self.apply_categories(action, &mut result);
        }

        self.engine.audit().append(action, &result);
        result
    }

    fn apply_categories(&self, action: &ProposedAction, result: &mut ValidationResult) {
        let action_type = action.action_type().unwrap_or("unknown");
        match self.categories.classify(action_type) {
            ActionCategory::Destructive => {
                result.escalate_to_approval();
                result.approval_reason = Some(format!(
                    "Destructive action '{}' requires explicit approval",
                    action_type
                ));
            }
            ActionCategory::Sensitive => {
                result.escalate_to_approval();
                result.append_approval_reason(format!(
                    "Action '{}' requires approval per policy",
                    action_type
                ));
            }
            ActionCategory::Routine => {}
        }
    }
}
