//! # gr-cli
//!
//! Command-line interface for the guardrails policy engine.
//!
//! - `gr check action|prompt` — validate a proposed action or a raw prompt
//! - `gr policy list|export` — inspect the loaded policy sets
//! - `gr audit verify|tail` — inspect the durable audit archive
//!
//! Command output goes to stdout; logs go to stderr (`RUST_LOG` overrides
//! the default filter).

mod commands;
mod sink;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gr_policy::GuardrailsConfig;
use tracing_subscriber::EnvFilter;

/// Guardrails CLI — gate AI-proposed infrastructure actions.
#[derive(Parser)]
#[command(name = "gr", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an action or a prompt.
    Check {
        #[command(subcommand)]
        command: commands::check::CheckCommands,
    },
    /// Inspect loaded policies.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Inspect the audit archive.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gr_policy=info".parse()?)
                .add_directive("gr_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = GuardrailsConfig::load(&project_root)?;

    match &cli.command {
        Commands::Check { command } => commands::check::execute(command, &config),
        Commands::Policy { command } => commands::policy::execute(command, &config),
        Commands::Audit { command } => commands::audit::execute(command, &config),
    }
}
