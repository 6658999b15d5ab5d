// config.rs — Guardrails configuration.
//
// GuardrailsConfig determines where policies are read from, where the
// durable audit archive lives, and which action types fall into the
// destructive/sensitive approval categories. `for_project()` gives the
// standard `.gr/` layout; `load()` overlays `.gr/config.toml` on top of it.
//
// Relative paths in the config file are resolved against the project root.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::action::EvaluationContext;
use crate::error::PolicyError;
use crate::gate::{ActionCategories, DESTRUCTIVE_ACTIONS, SENSITIVE_ACTIONS};

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".gr";

/// Config file name inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration for the guardrails engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailsConfig {
    /// Directory of `*.yaml` policy definitions.
    pub policy_dir: PathBuf,

    /// JSONL archive that audit entries are mirrored into. `None` keeps the
    /// audit trail in memory only.
    pub audit_archive: Option<PathBuf>,

    /// Regions actions may deploy to. Empty means "not configured", in
    /// which case the approved-regions rule is skipped.
    pub approved_regions: Vec<String>,

    /// Action types that always need approval (reason overwritten).
    pub destructive_actions: Vec<String>,

    /// Action types that need approval (reason appended).
    pub sensitive_actions: Vec<String>,
}

/// On-disk shape of `.gr/config.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    policy_dir: Option<PathBuf>,
    audit_archive: Option<PathBuf>,
    approved_regions: Option<Vec<String>>,
    destructive_actions: Option<Vec<String>>,
    sensitive_actions: Option<Vec<String>>,
}

impl GuardrailsConfig {
    /// Create a config with the standard `.gr/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let state_dir = project_root.as_ref().join(STATE_DIR);
        Self {
            policy_dir: state_dir.join("policies"),
            audit_archive: Some(state_dir.join("audit.jsonl")),
            approved_regions: Vec::new(),
            destructive_actions: default_destructive(),
            sensitive_actions: default_sensitive(),
        }
    }

    /// Path of the config file for a project.
    pub fn config_path(project_root: impl AsRef<Path>) -> PathBuf {
        project_root.as_ref().join(STATE_DIR).join(CONFIG_FILE)
    }

    /// Load `.gr/config.toml` if present, falling back to
    /// [`for_project`](Self::for_project) defaults for anything it omits.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let root = project_root.as_ref();
        let mut config = Self::for_project(root);
        let path = Self::config_path(root);

        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| PolicyError::IoError {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| PolicyError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        if let Some(dir) = file.policy_dir {
            config.policy_dir = root.join(dir);
        }
        if let Some(archive) = file.audit_archive {
            config.audit_archive = Some(root.join(archive));
        }
        if let Some(regions) = file.approved_regions {
            config.approved_regions = regions;
        }
        if let Some(destructive) = file.destructive_actions {
            config.destructive_actions = destructive;
        }
        if let Some(sensitive) = file.sensitive_actions {
            config.sensitive_actions = sensitive;
        }

        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Context applied when a caller supplies none.
    pub fn default_context(&self) -> EvaluationContext {
        if self.approved_regions.is_empty() {
            EvaluationContext::new()
        } else {
            EvaluationContext::new().with_approved_regions(self.approved_regions.iter().cloned())
        }
    }

    pub fn action_categories(&self) -> ActionCategories {
        ActionCategories::new(
            self.destructive_actions.iter().cloned(),
            self.sensitive_actions.iter().cloned(),
        )
    }
}

fn default_destructive() -> Vec<String> {
    DESTRUCTIVE_ACTIONS.iter().map(|s| s.to_string()).collect()
}

fn default_sensitive() -> Vec<String> {
    SENSITIVE_ACTIONS.iter().map(|s| s.to_string()).collect()
}
