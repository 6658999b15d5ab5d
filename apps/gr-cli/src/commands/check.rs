// check.rs — Check subcommands: action, prompt.
//
// Both print the ValidationResult as JSON on stdout and exit non-zero when
// the result is invalid, so scripts can gate on the exit code.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use gr_policy::{
    ApprovalMode, EvaluationContext, GuardrailsConfig, ProposedAction, RuleOutcome,
    ValidationResult,
};

use super::build_engine;

#[derive(Subcommand)]
pub enum CheckCommands {
    /// Validate a proposed action (JSON object) against policy.
    Action {
        /// Path to the action JSON file.
        file: PathBuf,
        /// Restrict to these policy sets (repeatable; default: all).
        #[arg(long = "policy-set")]
        policy_sets: Vec<String>,
        /// JSON file with evaluation context, e.g. {"approvedRegions": [...]}.
        #[arg(long)]
        context: Option<PathBuf>,
        /// Skip destructive/sensitive category approval.
        #[arg(long)]
        auto_approve: bool,
        /// Print every rule's outcome to stderr.
        #[arg(long)]
        trace: bool,
    },
    /// Screen a natural-language prompt.
    Prompt {
        /// The prompt text.
        text: String,
    },
}

pub fn execute(cmd: &CheckCommands, config: &GuardrailsConfig) -> anyhow::Result<()> {
    let (engine, _) = build_engine(config)?;

    match cmd {
        CheckCommands::Action {
            file,
            policy_sets,
            context,
            auto_approve,
            trace,
        } => {
            let action = ProposedAction::from_value(read_object(file)?);
            let context = context
                .as_deref()
                .map(|path| read_object(path).map(EvaluationContext::from_value))
                .transpose()?;
            let mode = if *auto_approve {
                ApprovalMode::AutoApprove
            } else {
                ApprovalMode::RequireApproval
            };

            if *trace {
                let evaluation =
                    engine.evaluate_with_trace(&action, policy_sets.as_slice(), context.as_ref());
                for step in &evaluation.steps {
                    eprintln!(
                        "{:<12} {:<28} {}",
                        step.policy_set,
                        step.rule,
                        describe(&step.outcome)
                    );
                }
            }

            let result = engine.action_validator().validate_with(
                &action,
                policy_sets.as_slice(),
                context.as_ref(),
                mode,
            );
            report(&result, &action.summary())
        }

        CheckCommands::Prompt { text } => {
            let result = engine.validate_prompt(text);
            report(&result, "prompt")
        }
    }
}

fn report(result: &ValidationResult, subject: &str) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if !result.is_valid {
        anyhow::bail!(
            "{} rejected: {}",
            subject,
            result.violated_rules().join(", ")
        );
    }
    Ok(())
}

/// Read a JSON file that must hold an object.
fn read_object(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !value.is_object() {
        anyhow::bail!("{} must contain a JSON object", path.display());
    }
    Ok(value)
}

fn describe(outcome: &RuleOutcome) -> String {
    match outcome {
        RuleOutcome::Violated => "violated".to_string(),
        RuleOutcome::Satisfied => "satisfied".to_string(),
        RuleOutcome::Skipped(reason) => format!(
            "skipped ({})",
            serde_json::to_value(reason)
                .ok()
                .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string())
        ),
    }
}
