// rule.rs — Policy rule and policy set definitions.
//
// Rules are declared in YAML as loose records ({name, description,
// severity, action, condition, threshold?}). At load time each record is
// checked against the closed Severity / PolicyAction enumerations and its
// condition string is resolved once into a typed Predicate. After that the
// rule is immutable; evaluation never looks at the raw condition text again.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Default node-count threshold when a rule doesn't set one.
pub const DEFAULT_NODE_THRESHOLD: u64 = 10;

/// Severity of a policy violation, ordered by escalation weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Blocking,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
            Severity::Blocking => write!(f, "blocking"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            "blocking" => Ok(Severity::Blocking),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// What happens when a rule is violated. Also used as the aggregated
/// outcome of a whole validation.
///
/// Variants are declared in precedence order, so `Ord` gives
/// `Log < Warn < RequireApproval < Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Log,
    Warn,
    RequireApproval,
    Block,
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyAction::Log => write!(f, "log"),
            PolicyAction::Warn => write!(f, "warn"),
            PolicyAction::RequireApproval => write!(f, "require_approval"),
            PolicyAction::Block => write!(f, "block"),
        }
    }
}

impl FromStr for PolicyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(PolicyAction::Log),
            "warn" => Ok(PolicyAction::Warn),
            "block" => Ok(PolicyAction::Block),
            "require_approval" | "requireapproval" | "require-approval" => {
                Ok(PolicyAction::RequireApproval)
            }
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// The closed vocabulary of conditions a rule can check.
///
/// Each variant names what makes the rule fire, e.g. `PrivilegedContainer`
/// fires when the action asks for a privileged container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    PrivilegedContainer,
    HostNetwork,
    MissingResourceLimits,
    PublicLoadBalancer,
    NodeCountAbove { threshold: u64 },
    GpuEnabled,
    RestrictedInstanceSize,
    UnencryptedStorage,
    AuditLoggingDisabled,
    UnapprovedRegion,
    /// The condition text matched nothing in the vocabulary. Never fires.
    Unknown(String),
}

/// Keyword aliases per predicate, matched on `_` word boundaries of the
/// normalized condition.
const KEYWORDS: &[(&str, &[&str])] = &[
    (
        "privileged",
        &["creates_privileged_container", "privileged_container", "privileged"],
    ),
    (
        "host_network",
        &["uses_host_network", "host_network", "hostnetwork"],
    ),
    (
        "resource_limits",
        &["has_resource_limits", "resource_limits", "resourcelimits"],
    ),
    (
        "public_lb",
        &[
            "creates_public_lb",
            "creates_public_load_balancer",
            "public_load_balancer",
            "public_lb",
            "loadbalancertype",
        ],
    ),
    ("node_count", &["node_count", "nodecount"]),
    ("gpu", &["uses_gpu", "gpu_enabled", "gpuenabled", "gpu"]),
    (
        "instance_size",
        &["instance_size_restricted", "instance_size", "instancesize"],
    ),
    (
        "storage_encrypted",
        &["storage_encrypted", "storageencrypted"],
    ),
    (
        "audit_logging",
        &["audit_logging_enabled", "audit_logging", "auditlogging"],
    ),
    (
        "region",
        &["approved_regions", "approvedregions", "approved_region", "region"],
    ),
];

impl Predicate {
    /// Resolve a free-text condition into a predicate.
    ///
    /// Accepts the expression form (`action.node_count > 10`), the camelCase
    /// attribute form (`action.hostNetwork == true`) and the plain phrase
    /// form (`uses host network`).
    ///
    /// When aliases of several predicates appear, the predicate with the
    /// longest matching alias wins (`instance_size` over `gpu` in
    /// `action.instance_size in ['gpu-xlarge']`). A tie between different
    /// predicates is ambiguous and resolves to `Unknown`.
    pub fn resolve(condition: &str, threshold: Option<u64>) -> Predicate {
        let bounded = format!("_{}_", normalize(condition));

        // (kind, longest alias of that kind found in the condition)
        let mut hits: Vec<(&str, usize)> = KEYWORDS
            .iter()
            .filter_map(|(kind, aliases)| {
                aliases
                    .iter()
                    .filter(|alias| bounded.contains(&format!("_{}_", alias)))
                    .map(|alias| alias.len())
                    .max()
                    .map(|len| (*kind, len))
            })
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1));

        let kind = match hits.as_slice() {
            [] => None,
            [(kind, _)] => Some(*kind),
            [(best, len), (_, runner_up), ..] if len > runner_up => {
                tracing::debug!(
                    condition,
                    chosen = *best,
                    candidates = ?hits,
                    "condition mentions several predicates, longest alias wins"
                );
                Some(*best)
            }
            _ => {
                tracing::warn!(
                    condition,
                    candidates = ?hits,
                    "ambiguous condition: matches several predicates equally"
                );
                None
            }
        };

        match kind {
            Some("privileged") => Predicate::PrivilegedContainer,
            Some("host_network") => Predicate::HostNetwork,
            Some("resource_limits") => Predicate::MissingResourceLimits,
            Some("public_lb") => Predicate::PublicLoadBalancer,
            Some("node_count") => Predicate::NodeCountAbove {
                threshold: threshold.unwrap_or(DEFAULT_NODE_THRESHOLD),
            },
            Some("gpu") => Predicate::GpuEnabled,
            Some("instance_size") => Predicate::RestrictedInstanceSize,
            Some("storage_encrypted") => Predicate::UnencryptedStorage,
            Some("audit_logging") => Predicate::AuditLoggingDisabled,
            Some("region") => Predicate::UnapprovedRegion,
            _ => Predicate::Unknown(condition.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Predicate::Unknown(_))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::PrivilegedContainer => write!(f, "creates privileged container"),
            Predicate::HostNetwork => write!(f, "uses host network"),
            Predicate::MissingResourceLimits => write!(f, "has resource limits"),
            Predicate::PublicLoadBalancer => write!(f, "creates public load balancer"),
            Predicate::NodeCountAbove { threshold } => write!(f, "node count > {}", threshold),
            Predicate::GpuEnabled => write!(f, "uses GPU"),
            Predicate::RestrictedInstanceSize => write!(f, "instance size restricted"),
            Predicate::UnencryptedStorage => write!(f, "storage encrypted"),
            Predicate::AuditLoggingDisabled => write!(f, "audit logging enabled"),
            Predicate::UnapprovedRegion => write!(f, "approved region"),
            Predicate::Unknown(condition) => write!(f, "unknown condition '{}'", condition),
        }
    }
}

/// Lowercase and collapse every run of non-alphanumeric characters into `_`.
fn normalize(condition: &str) -> String {
    let mut out = String::with_capacity(condition.len());
    let mut last_sep = true;
    for c in condition.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        } else if !last_sep {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// First number written in a node-count condition that disagrees with the
/// threshold actually used, e.g. `5` in `action.node_count > 5` when no
/// `threshold` field was given.
fn conflicting_threshold(condition: &str, threshold: u64) -> Option<u64> {
    condition
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|digits| digits.parse::<u64>().ok())
        .find(|n| *n != threshold)
}

/// A single loaded rule. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    /// Unique within its policy set.
    pub name: String,
    /// Shown to users as the violation message.
    pub description: String,
    pub severity: Severity,
    /// Outcome contributed when the predicate fires.
    pub on_violation: PolicyAction,
    /// Resolved once at load; evaluation only ever looks at this.
    pub predicate: Predicate,
    /// The condition as written in the source definition (kept for export).
    pub condition: String,
    /// Hint for fixing the action, copied onto each violation.
    pub remediation: Option<String>,
}

/// A named, independently selectable group of rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    /// Selection key (`security`, `cost`, ...). Unique within a store.
    pub name: String,
    pub description: String,
    /// Evaluated in this order.
    pub rules: Vec<PolicyRule>,
}

// ── Serialized definition format ──

/// A policy set as written in YAML/JSON.
///
/// ```yaml
/// name: cost
/// description: Cost governance policies
/// rules:
///   - name: max_node_count
///     description: Limit maximum nodes per cluster
///     severity: warning
///     action: require_approval
///     condition: "action.node_count > 10"
///     threshold: 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// A rule as written in YAML/JSON. Validated by [`PolicySet::from_definition`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default)]
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl PolicySet {
    /// Validate a definition and build an immutable policy set.
    ///
    /// `fallback_name` is used when the definition carries no `name`.
    /// Any invalid rule rejects the whole definition. Rules whose condition
    /// doesn't resolve are kept (they never fire) and logged as inert.
    pub fn from_definition(
        fallback_name: &str,
        definition: PolicyDefinition,
    ) -> Result<Self, PolicyError> {
        let name = definition
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        let malformed = |reason: String| PolicyError::MalformedDefinition {
            name: name.clone(),
            reason,
        };

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(definition.rules.len());

        for (index, raw) in definition.rules.into_iter().enumerate() {
            let rule_name = raw
                .name
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| malformed(format!("rule #{} has no name", index + 1)))?;
            if !seen.insert(rule_name.clone()) {
                return Err(malformed(format!("duplicate rule name '{}'", rule_name)));
            }
            let description = raw
                .description
                .ok_or_else(|| malformed(format!("rule '{}' has no description", rule_name)))?;
            let severity = match raw.severity {
                Some(s) => s
                    .parse::<Severity>()
                    .map_err(|e| malformed(format!("rule '{}': {}", rule_name, e)))?,
                None => Severity::Warning,
            };
            let on_violation = match raw.action {
                Some(a) => a
                    .parse::<PolicyAction>()
                    .map_err(|e| malformed(format!("rule '{}': {}", rule_name, e)))?,
                None => PolicyAction::Warn,
            };

            let predicate = Predicate::resolve(&raw.condition, raw.threshold);
            if let Predicate::NodeCountAbove { threshold } = predicate {
                if let Some(written) = conflicting_threshold(&raw.condition, threshold) {
                    tracing::warn!(
                        policy_set = %name,
                        rule = %rule_name,
                        condition = %raw.condition,
                        threshold,
                        "condition mentions {} but the rule compares against {}; set `threshold` explicitly",
                        written,
                        threshold
                    );
                }
            }
            if !predicate.is_known() {
                tracing::warn!(
                    policy_set = %name,
                    rule = %rule_name,
                    condition = %raw.condition,
                    "inert rule: condition does not match any known predicate"
                );
            }

            rules.push(PolicyRule {
                name: rule_name,
                description,
                severity,
                on_violation,
                predicate,
                condition: raw.condition,
                remediation: raw.remediation,
            });
        }

        Ok(Self {
            name,
            description: definition.description,
            rules,
        })
    }

    /// Convert back to the serialized definition format (for export).
    pub fn to_definition(&self) -> PolicyDefinition {
        PolicyDefinition {
            name: Some(self.name.clone()),
            description: self.description.clone(),
            rules: self
                .rules
                .iter()
                .map(|rule| RuleDefinition {
                    name: Some(rule.name.clone()),
                    description: Some(rule.description.clone()),
                    severity: Some(rule.severity.to_string()),
                    action: Some(rule.on_violation.to_string()),
                    condition: rule.condition.clone(),
                    threshold: match rule.predicate {
                        Predicate::NodeCountAbove { threshold } => Some(threshold),
                        _ => None,
                    },
                    remediation: rule.remediation.clone(),
                })
                .collect(),
        }
    }

    /// Names of rules that can never fire.
    pub fn inert_rules(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| !r.predicate.is_known())
            .map(|r| r.name.as_str())
            .collect()
    }
}
