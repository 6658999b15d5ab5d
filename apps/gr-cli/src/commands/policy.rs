// policy.rs — Policy subcommands: list, export.

use clap::Subcommand;
use gr_policy::{ExportFormat, GuardrailsConfig, PolicyEngine};

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// List loaded policy sets and their rules.
    List,
    /// Print every loaded set as YAML or JSON.
    Export {
        /// Output format: yaml or json.
        #[arg(long, default_value = "yaml")]
        format: String,
    },
}

pub fn execute(cmd: &PolicyCommands, config: &GuardrailsConfig) -> anyhow::Result<()> {
    // Read-only: no audit sink.
    let (engine, report) = PolicyEngine::from_config(config);

    match cmd {
        PolicyCommands::List => {
            if report.used_builtin {
                println!(
                    "No policies loaded from {}; showing built-in defaults.",
                    config.policy_dir.display()
                );
                println!();
            }

            let snapshot = engine.store().snapshot();
            println!("{:<14} {:<28} {:<18} {:<10} CONDITION", "SET", "RULE", "ON VIOLATION", "SEVERITY");
            println!("{}", "-".repeat(96));
            for set in snapshot.sets() {
                for rule in &set.rules {
                    println!(
                        "{:<14} {:<28} {:<18} {:<10} {}",
                        set.name,
                        rule.name,
                        rule.on_violation.to_string(),
                        rule.severity.to_string(),
                        rule.predicate,
                    );
                }
            }

            for skipped in &report.skipped {
                println!("skipped {}: {}", skipped.source, skipped.reason);
            }
            for inert in &report.inert_rules {
                println!("inert rule {} (condition matches no known check)", inert);
            }
        }

        PolicyCommands::Export { format } => {
            let format: ExportFormat = format.parse()?;
            print!("{}", engine.export_policies(format)?);
        }
    }

    Ok(())
}
