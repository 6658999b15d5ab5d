// store.rs — Policy store: loading, selection, export, and hot reload.
//
// The store owns an immutable PolicySnapshot behind an `Arc`. Readers clone
// the `Arc` and evaluate against it without holding any lock. Reload builds
// a brand-new snapshot and publishes it with a single pointer swap, so a
// concurrent evaluation sees either the old rule set or the new one, never a
// mix.
//
// Loading is forgiving per definition: a malformed file or set is skipped
// with a warning and the rest still load. Only when nothing loads at all do
// we fall back to the built-in sets.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::defaults::builtin_policy_sets;
use crate::error::PolicyError;
use crate::rule::{PolicyDefinition, PolicyRule, PolicySet};

/// Where policy definitions come from.
#[derive(Debug, Clone)]
pub enum PolicySource {
    /// A directory of `*.yaml` / `*.yml` files, one policy set per file.
    Directory(PathBuf),
    /// A YAML document mapping set name → definition (the export shape),
    /// or a single definition with a top-level `rules` list.
    Yaml(String),
    /// The built-in `security` / `cost` / `compliance` sets.
    BuiltIn,
}

/// A definition that was skipped during load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDefinition {
    /// File path or document key the definition came from.
    pub source: String,
    pub reason: String,
}

/// Summary of one load, for operator visibility.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedDefinition>,
    /// `set/rule` names whose condition resolves to no known predicate.
    pub inert_rules: Vec<String>,
    pub used_builtin: bool,
}

/// A rule together with the set it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct SelectedRule<'a> {
    pub policy_set: &'a str,
    pub rule: &'a PolicyRule,
}

/// An immutable set of loaded policy sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    sets: Vec<PolicySet>,
}

impl PolicySnapshot {
    pub fn new(sets: Vec<PolicySet>) -> Self {
        Self { sets }
    }

    pub fn sets(&self) -> &[PolicySet] {
        &self.sets
    }

    pub fn set(&self, name: &str) -> Option<&PolicySet> {
        self.sets.iter().find(|s| s.name == name)
    }

    pub fn set_names(&self) -> Vec<&str> {
        self.sets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Rules from the requested sets, in load order. An empty selection
    /// means every set; unknown names are ignored.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Vec<SelectedRule<'_>> {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        self.sets
            .iter()
            .filter(|set| wanted.is_empty() || wanted.contains(set.name.as_str()))
            .flat_map(|set| {
                set.rules.iter().map(move |rule| SelectedRule {
                    policy_set: set.name.as_str(),
                    rule,
                })
            })
            .collect()
    }
}

/// Text formats policies can be exported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Yaml,
    Json,
}

impl FromStr for ExportFormat {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            "json" => Ok(ExportFormat::Json),
            _ => Err(PolicyError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Yaml => write!(f, "yaml"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

/// Holds the current policy snapshot.
pub struct PolicyStore {
    current: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyStore {
    /// Load from a source. Never fails: see [`LoadReport`] for what was
    /// skipped.
    pub fn load(source: &PolicySource) -> (Self, LoadReport) {
        let (snapshot, report) = build_snapshot(source);
        (
            Self {
                current: RwLock::new(Arc::new(snapshot)),
            },
            report,
        )
    }

    /// A store holding only the built-in sets.
    pub fn builtin() -> Self {
        Self::from_sets(builtin_policy_sets())
    }

    /// A store holding exactly the given sets (no fallback).
    pub fn from_sets(sets: Vec<PolicySet>) -> Self {
        Self {
            current: RwLock::new(Arc::new(PolicySnapshot::new(sets))),
        }
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace every loaded set with a freshly loaded snapshot.
    pub fn reload(&self, source: &PolicySource) -> LoadReport {
        let (snapshot, report) = build_snapshot(source);
        let next = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
        tracing::info!(sets = ?report.loaded, "policy snapshot reloaded");
        report
    }

    /// Union of rules across the named sets (all sets when empty).
    pub fn get<S: AsRef<str>>(&self, names: &[S]) -> Vec<PolicyRule> {
        self.snapshot()
            .select(names)
            .into_iter()
            .map(|selected| selected.rule.clone())
            .collect()
    }

    pub fn set_names(&self) -> Vec<String> {
        self.snapshot()
            .set_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Serialize all loaded sets as a mapping of set name → definition.
    pub fn export(&self, format: ExportFormat) -> Result<String, PolicyError> {
        let snapshot = self.snapshot();
        let definitions: BTreeMap<&str, PolicyDefinition> = snapshot
            .sets()
            .iter()
            .map(|set| (set.name.as_str(), set.to_definition()))
            .collect();

        match format {
            ExportFormat::Yaml => serde_yaml::to_string(&definitions)
                .map_err(|e| PolicyError::ExportFailed(e.to_string())),
            ExportFormat::Json => serde_json::to_string_pretty(&definitions)
                .map_err(|e| PolicyError::ExportFailed(e.to_string())),
        }
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Loading ──

fn build_snapshot(source: &PolicySource) -> (PolicySnapshot, LoadReport) {
    let mut report = LoadReport::default();
    let candidates = match source {
        PolicySource::Directory(dir) => read_directory(dir, &mut report),
        PolicySource::Yaml(text) => read_document(text, &mut report),
        PolicySource::BuiltIn => Vec::new(),
    };

    let mut sets: Vec<PolicySet> = Vec::new();
    for (origin, fallback_name, definition) in candidates {
        match PolicySet::from_definition(&fallback_name, definition) {
            Ok(set) if sets.iter().any(|s| s.name == set.name) => {
                let reason = format!("duplicate policy set name '{}'", set.name);
                tracing::warn!(source = %origin, "skipping policy definition: {}", reason);
                report.skipped.push(SkippedDefinition {
                    source: origin,
                    reason,
                });
            }
            Ok(set) => {
                tracing::info!(source = %origin, rules = set.rules.len(), "loaded policy set: {}", set.name);
                sets.push(set);
            }
            Err(e) => {
                tracing::warn!(source = %origin, "skipping policy definition: {}", e);
                report.skipped.push(SkippedDefinition {
                    source: origin,
                    reason: e.to_string(),
                });
            }
        }
    }

    if sets.is_empty() {
        if !matches!(source, PolicySource::BuiltIn) {
            tracing::warn!("no policy definitions loaded, using built-in defaults");
        }
        sets = builtin_policy_sets();
        report.used_builtin = true;
    }

    for set in &sets {
        report.loaded.push(set.name.clone());
        report.inert_rules.extend(
            set.inert_rules()
                .into_iter()
                .map(|rule| format!("{}/{}", set.name, rule)),
        );
    }

    (PolicySnapshot::new(sets), report)
}

type Candidate = (String, String, PolicyDefinition);

fn read_directory(dir: &Path, report: &mut LoadReport) -> Vec<Candidate> {
    if !dir.exists() {
        tracing::warn!("policy path {} does not exist", dir.display());
        return Vec::new();
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(source) => {
            let err = PolicyError::IoError {
                path: dir.to_path_buf(),
                source,
            };
            tracing::warn!("cannot read policy directory: {}", err);
            report.skipped.push(SkippedDefinition {
                source: dir.display().to_string(),
                reason: err.to_string(),
            });
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    // Deterministic load order regardless of directory iteration order.
    paths.sort();

    let mut candidates = Vec::new();
    for path in paths {
        let origin = path.display().to_string();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();

        let parsed = fs::read_to_string(&path)
            .map_err(|source| PolicyError::IoError {
                path: path.clone(),
                source,
            })
            .and_then(|text| {
                serde_yaml::from_str::<PolicyDefinition>(&text).map_err(|e| {
                    PolicyError::MalformedDefinition {
                        name: stem.clone(),
                        reason: e.to_string(),
                    }
                })
            });

        match parsed {
            Ok(definition) => candidates.push((origin, stem, definition)),
            Err(e) => {
                tracing::warn!(source = %origin, "failed to load policy file: {}", e);
                report.skipped.push(SkippedDefinition {
                    source: origin,
                    reason: e.to_string(),
                });
            }
        }
    }
    candidates
}

fn read_document(text: &str, report: &mut LoadReport) -> Vec<Candidate> {
    let root: serde_yaml::Value = match serde_yaml::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("policy document is not valid YAML: {}", e);
            report.skipped.push(SkippedDefinition {
                source: "<document>".to_string(),
                reason: e.to_string(),
            });
            return Vec::new();
        }
    };

    let mapping = match root {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => return Vec::new(),
        _ => {
            report.skipped.push(SkippedDefinition {
                source: "<document>".to_string(),
                reason: "expected a mapping of policy set name to definition".to_string(),
            });
            return Vec::new();
        }
    };

    // A single definition rather than a name → definition mapping. A set
    // that happens to be named `rules` has a mapping value, not a list.
    let single = mapping
        .get("rules")
        .map_or(false, |rules| !rules.is_mapping());
    if single {
        let value = serde_yaml::Value::Mapping(mapping);
        return parse_entry("<document>", "default", value, report)
            .into_iter()
            .collect();
    }

    mapping
        .into_iter()
        .filter_map(|(key, value)| {
            let key = match key.as_str() {
                Some(k) => k.to_string(),
                None => {
                    report.skipped.push(SkippedDefinition {
                        source: format!("{:?}", key),
                        reason: "policy set key must be a string".to_string(),
                    });
                    return None;
                }
            };
            parse_entry(&key, &key, value, report)
        })
        .collect()
}

fn parse_entry(
    origin: &str,
    fallback_name: &str,
    value: serde_yaml::Value,
    report: &mut LoadReport,
) -> Option<Candidate> {
    match serde_yaml::from_value::<PolicyDefinition>(value) {
        Ok(definition) => Some((origin.to_string(), fallback_name.to_string(), definition)),
        Err(e) => {
            tracing::warn!(source = %origin, "failed to parse policy definition: {}", e);
            report.skipped.push(SkippedDefinition {
                source: origin.to_string(),
                reason: e.to_string(),
            });
            None
        }
    }
}
