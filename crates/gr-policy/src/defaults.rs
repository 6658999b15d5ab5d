// defaults.rs — Built-in policy sets.
//
// Used whenever no external policy definitions load, so the engine is never
// empty. These three sets are also the reference fixture for tests.

use crate::rule::{PolicyAction, PolicyRule, PolicySet, Predicate, Severity};

/// The `security`, `cost` and `compliance` sets, in that order.
pub fn builtin_policy_sets() -> Vec<PolicySet> {
    vec![security(), cost(), compliance()]
}

fn security() -> PolicySet {
    PolicySet {
        name: "security".to_string(),
        description: "Security-related policies".to_string(),
        rules: vec![
            rule(
                "no_privileged_containers",
                "Prevent creation of privileged containers",
                Severity::Critical,
                PolicyAction::Block,
                "action.creates_privileged_container == true",
                None,
            ),
            rule(
                "no_host_network",
                "Prevent use of host network",
                Severity::Critical,
                PolicyAction::Block,
                "action.uses_host_network == true",
                None,
            ),
            rule(
                "require_resource_limits",
                "All containers must have resource limits",
                Severity::Warning,
                PolicyAction::Warn,
                "action.has_resource_limits == false",
                None,
            ),
            rule(
                "no_public_load_balancer",
                "Require approval for public load balancers",
                Severity::Warning,
                PolicyAction::RequireApproval,
                "action.creates_public_lb == true",
                None,
            ),
        ],
    }
}

fn cost() -> PolicySet {
    PolicySet {
        name: "cost".to_string(),
        description: "Cost governance policies".to_string(),
        rules: vec![
            rule(
                "max_node_count",
                "Limit maximum nodes per cluster",
                Severity::Warning,
                PolicyAction::RequireApproval,
                "action.node_count > 10",
                Some(10),
            ),
            rule(
                "no_gpu_without_approval",
                "GPU instances require approval",
                Severity::Warning,
                PolicyAction::RequireApproval,
                "action.uses_gpu == true",
                None,
            ),
            rule(
                "max_instance_size",
                "Limit instance sizes",
                Severity::Info,
                PolicyAction::Warn,
                "action.instance_size in ['xlarge', '2xlarge', '4xlarge']",
                None,
            ),
        ],
    }
}

fn compliance() -> PolicySet {
    PolicySet {
        name: "compliance".to_string(),
        description: "Compliance framework policies".to_string(),
        rules: vec![
            rule(
                "encryption_at_rest",
                "Storage must be encrypted",
                Severity::Critical,
                PolicyAction::Block,
                "action.storage_encrypted == false",
                None,
            ),
            rule(
                "audit_logging",
                "Audit logging must be enabled",
                Severity::Warning,
                PolicyAction::Warn,
                "action.audit_logging == false",
                None,
            ),
            rule(
                "approved_regions_only",
                "Deploy only to approved regions",
                Severity::Critical,
                PolicyAction::Block,
                "action.region not in approved_regions",
                None,
            ),
        ],
    }
}

fn rule(
    name: &str,
    description: &str,
    severity: Severity,
    on_violation: PolicyAction,
    condition: &str,
    threshold: Option<u64>,
) -> PolicyRule {
    PolicyRule {
        name: name.to_string(),
        description: description.to_string(),
        severity,
        on_violation,
        predicate: Predicate::resolve(condition, threshold),
        condition: condition.to_string(),
        remediation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sets_are_named() {
        let names: Vec<String> = builtin_policy_sets().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["security", "cost", "compliance"]);
    }

    #[test]
    fn every_builtin_rule_resolves() {
        for set in builtin_policy_sets() {
            assert!(set.inert_rules().is_empty(), "inert rule in {}", set.name);
        }
    }

    #[test]
    fn builtin_predicates_match_table() {
        let sets = builtin_policy_sets();
        let predicates: Vec<&Predicate> = sets
            .iter()
            .flat_map(|s| s.rules.iter().map(|r| &r.predicate))
            .collect();
        assert_eq!(
            predicates,
            vec![
                &Predicate::PrivilegedContainer,
                &Predicate::HostNetwork,
                &Predicate::MissingResourceLimits,
                &Predicate::PublicLoadBalancer,
                &Predicate::NodeCountAbove { threshold: 10 },
                &Predicate::GpuEnabled,
                &Predicate::RestrictedInstanceSize,
                &Predicate::UnencryptedStorage,
                &Predicate::AuditLoggingDisabled,
                &Predicate::UnapprovedRegion,
            ]
        );
    }
}
