// evaluator.rs — Rule evaluation.
//
// Decides, for one rule and one action, whether the rule's predicate is
// violated. Evaluation never fails: anything that can't be evaluated
// (unknown predicate, missing or mistyped attribute, missing context) is
// reported as `Skipped` with a reason, which the caller treats as "not
// violated". `Skipped` stays distinct from `Satisfied` so logs and traces
// can tell a policy authoring mistake apart from a clean pass.

use serde::{Deserialize, Serialize};

use crate::action::{Attr, EvaluationContext, ProposedAction};
use crate::rule::{PolicyRule, Predicate};

/// Instance sizes that trip the restricted-size predicate.
pub const RESTRICTED_INSTANCE_SIZES: &[&str] = &["xlarge", "2xlarge", "4xlarge"];

/// Why a rule could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The rule's condition didn't resolve to a known predicate.
    UnknownPredicate { condition: String },
    /// The action doesn't carry the attribute; its safe default applies.
    MissingAttribute { key: String },
    /// The attribute is present but has the wrong JSON type.
    WrongType { key: String, expected: String },
    /// A context fact the predicate needs was not supplied.
    MissingContext { key: String },
}

/// Outcome of evaluating one rule against one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    Violated,
    Satisfied,
    Skipped(SkipReason),
}

impl RuleOutcome {
    pub fn is_violated(&self) -> bool {
        matches!(self, RuleOutcome::Violated)
    }
}

/// Evaluate a rule against an action.
pub fn evaluate(
    rule: &PolicyRule,
    action: &ProposedAction,
    context: &EvaluationContext,
) -> RuleOutcome {
    let outcome = evaluate_predicate(&rule.predicate, action, context);

    if let RuleOutcome::Skipped(reason) = &outcome {
        match reason {
            SkipReason::MissingAttribute { key } => {
                tracing::debug!(rule = %rule.name, key = %key, "rule skipped: attribute absent, default applies");
            }
            SkipReason::MissingContext { key } => {
                tracing::debug!(rule = %rule.name, key = %key, "rule skipped: context not supplied");
            }
            SkipReason::UnknownPredicate { condition } => {
                tracing::warn!(rule = %rule.name, condition = %condition, "rule skipped: unknown predicate");
            }
            SkipReason::WrongType { key, expected } => {
                tracing::warn!(rule = %rule.name, key = %key, expected = %expected, "rule skipped: attribute has wrong type");
            }
        }
    }

    outcome
}

/// Evaluate a bare predicate. Pure; no logging.
pub fn evaluate_predicate(
    predicate: &Predicate,
    action: &ProposedAction,
    context: &EvaluationContext,
) -> RuleOutcome {
    match predicate {
        Predicate::PrivilegedContainer => flag_is(action, "privileged", true),
        Predicate::HostNetwork => flag_is(action, "hostNetwork", true),
        Predicate::GpuEnabled => flag_is(action, "gpuEnabled", true),
        Predicate::UnencryptedStorage => flag_is(action, "storageEncrypted", false),
        Predicate::AuditLoggingDisabled => flag_is(action, "auditLogging", false),

        Predicate::MissingResourceLimits => match action.get("resourceLimits") {
            Some(value) if !is_empty_value(value) => RuleOutcome::Satisfied,
            _ => RuleOutcome::Violated,
        },

        Predicate::PublicLoadBalancer => match action.str_attr("serviceType") {
            Attr::Present("LoadBalancer") => match action.str_attr("loadBalancerType") {
                Attr::Present(lb) => verdict(lb == "public"),
                Attr::Missing => missing("loadBalancerType"),
                Attr::WrongType => wrong_type("loadBalancerType", "string"),
            },
            Attr::Present(_) => RuleOutcome::Satisfied,
            Attr::Missing => missing("serviceType"),
            Attr::WrongType => wrong_type("serviceType", "string"),
        },

        Predicate::NodeCountAbove { threshold } => match action.number_attr("nodeCount") {
            Attr::Present(count) => verdict(count > *threshold as f64),
            Attr::Missing => missing("nodeCount"),
            Attr::WrongType => wrong_type("nodeCount", "number"),
        },

        Predicate::RestrictedInstanceSize => match action.str_attr("instanceSize") {
            Attr::Present(size) => verdict(RESTRICTED_INSTANCE_SIZES.contains(&size)),
            Attr::Missing => missing("instanceSize"),
            Attr::WrongType => wrong_type("instanceSize", "string"),
        },

        Predicate::UnapprovedRegion => {
            let region = match action.str_attr("region") {
                Attr::Present(region) => region,
                Attr::Missing => return missing("region"),
                Attr::WrongType => return wrong_type("region", "string"),
            };
            match context.string_list("approvedRegions") {
                Attr::Present(approved) => verdict(!approved.contains(&region)),
                Attr::Missing => RuleOutcome::Skipped(SkipReason::MissingContext {
                    key: "approvedRegions".to_string(),
                }),
                Attr::WrongType => wrong_type("approvedRegions", "array of strings"),
            }
        }

        Predicate::Unknown(condition) => RuleOutcome::Skipped(SkipReason::UnknownPredicate {
            condition: condition.clone(),
        }),
    }
}

/// Violated when the boolean attribute equals `fires_on`.
fn flag_is(action: &ProposedAction, key: &str, fires_on: bool) -> RuleOutcome {
    match action.bool_attr(key) {
        Attr::Present(value) => verdict(value == fires_on),
        Attr::Missing => missing(key),
        Attr::WrongType => wrong_type(key, "bool"),
    }
}

fn verdict(violated: bool) -> RuleOutcome {
    if violated {
        RuleOutcome::Violated
    } else {
        RuleOutcome::Satisfied
    }
}

fn missing(key: &str) -> RuleOutcome {
    RuleOutcome::Skipped(SkipReason::MissingAttribute {
        key: key.to_string(),
    })
}

fn wrong_type(key: &str, expected: &str) -> RuleOutcome {
    RuleOutcome::Skipped(SkipReason::WrongType {
        key: key.to_string(),
        expected: expected.to_string(),
    })
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(value: serde_json::Value) -> ProposedAction {
        ProposedAction::from_value(value)
    }

    fn check(predicate: Predicate, value: serde_json::Value) -> RuleOutcome {
        evaluate_predicate(&predicate, &action(value), &EvaluationContext::new())
    }

    #[test]
    fn privileged_and_host_network() {
        assert!(check(Predicate::PrivilegedContainer, json!({"privileged": true})).is_violated());
        assert_eq!(
            check(Predicate::PrivilegedContainer, json!({"privileged": false})),
            RuleOutcome::Satisfied
        );
        assert!(check(Predicate::HostNetwork, json!({"hostNetwork": true})).is_violated());
    }

    #[test]
    fn absent_flag_is_skipped_not_violated() {
        let outcome = check(Predicate::PrivilegedContainer, json!({"type": "create_deployment"}));
        assert_eq!(
            outcome,
            RuleOutcome::Skipped(SkipReason::MissingAttribute {
                key: "privileged".to_string()
            })
        );
        assert!(!outcome.is_violated());
    }

    #[test]
    fn mistyped_flag_is_skipped() {
        let outcome = check(Predicate::GpuEnabled, json!({"gpuEnabled": "true"}));
        assert!(matches!(
            outcome,
            RuleOutcome::Skipped(SkipReason::WrongType { .. })
        ));
    }

    #[test]
    fn resource_limits_absent_or_empty_is_violation() {
        assert!(check(Predicate::MissingResourceLimits, json!({})).is_violated());
        assert!(check(Predicate::MissingResourceLimits, json!({"resourceLimits": {}})).is_violated());
        assert!(check(Predicate::MissingResourceLimits, json!({"resourceLimits": null})).is_violated());
        assert_eq!(
            check(
                Predicate::MissingResourceLimits,
                json!({"resourceLimits": {"cpu": "1", "memory": "1Gi"}})
            ),
            RuleOutcome::Satisfied
        );
    }

    #[test]
    fn public_load_balancer_needs_both_markers() {
        assert!(check(
            Predicate::PublicLoadBalancer,
            json!({"serviceType": "LoadBalancer", "loadBalancerType": "public"})
        )
        .is_violated());
        assert!(!check(
            Predicate::PublicLoadBalancer,
            json!({"serviceType": "LoadBalancer", "loadBalancerType": "internal"})
        )
        .is_violated());
        assert!(!check(
            Predicate::PublicLoadBalancer,
            json!({"serviceType": "LoadBalancer"})
        )
        .is_violated());
        assert_eq!(
            check(
                Predicate::PublicLoadBalancer,
                json!({"serviceType": "ClusterIP", "loadBalancerType": "public"})
            ),
            RuleOutcome::Satisfied
        );
    }

    #[test]
    fn node_count_is_strictly_greater_than() {
        let p = Predicate::NodeCountAbove { threshold: 10 };
        assert!(check(p.clone(), json!({"nodeCount": 11})).is_violated());
        assert_eq!(check(p.clone(), json!({"nodeCount": 10})), RuleOutcome::Satisfied);
        assert_eq!(check(p, json!({"nodeCount": 3})), RuleOutcome::Satisfied);
    }

    #[test]
    fn restricted_instance_sizes() {
        for size in RESTRICTED_INSTANCE_SIZES {
            assert!(check(Predicate::RestrictedInstanceSize, json!({"instanceSize": size})).is_violated());
        }
        assert!(!check(Predicate::RestrictedInstanceSize, json!({"instanceSize": "large"})).is_violated());
    }

    #[test]
    fn storage_encrypted_defaults_to_true() {
        assert!(check(Predicate::UnencryptedStorage, json!({"storageEncrypted": false})).is_violated());
        assert!(!check(Predicate::UnencryptedStorage, json!({"storageEncrypted": true})).is_violated());
        assert!(!check(Predicate::UnencryptedStorage, json!({})).is_violated());
    }

    #[test]
    fn audit_logging_disabled() {
        assert!(check(Predicate::AuditLoggingDisabled, json!({"auditLogging": false})).is_violated());
        assert!(!check(Predicate::AuditLoggingDisabled, json!({"auditLogging": true})).is_violated());
    }

    #[test]
    fn region_checked_against_context() {
        let ctx = EvaluationContext::new().with_approved_regions(["us-east-1"]);
        let outside = action(json!({"region": "ap-south-1"}));
        let inside = action(json!({"region": "us-east-1"}));

        assert!(evaluate_predicate(&Predicate::UnapprovedRegion, &outside, &ctx).is_violated());
        assert_eq!(
            evaluate_predicate(&Predicate::UnapprovedRegion, &inside, &ctx),
            RuleOutcome::Satisfied
        );
        assert_eq!(
            evaluate_predicate(&Predicate::UnapprovedRegion, &outside, &EvaluationContext::new()),
            RuleOutcome::Skipped(SkipReason::MissingContext {
                key: "approvedRegions".to_string()
            })
        );
    }

    #[test]
    fn unknown_predicate_never_violates() {
        let outcome = check(Predicate::Unknown("action.foo == 1".to_string()), json!({"foo": 1}));
        assert!(matches!(
            outcome,
            RuleOutcome::Skipped(SkipReason::UnknownPredicate { .. })
        ));
    }
}
