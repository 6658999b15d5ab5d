// mod.rs — CLI subcommands and the shared engine bootstrap.

pub mod audit;
pub mod check;
pub mod policy;

use gr_policy::{GuardrailsConfig, LoadReport, PolicyEngine};

use crate::sink::ArchiveSink;

/// Build the engine for a project, mirroring audit entries into the
/// configured archive.
pub fn build_engine(config: &GuardrailsConfig) -> anyhow::Result<(PolicyEngine, LoadReport)> {
    let (mut engine, report) = PolicyEngine::from_config(config);
    if let Some(path) = &config.audit_archive {
        engine = engine.with_audit_sink(Box::new(ArchiveSink::open(path)?));
    }
    Ok((engine, report))
}
