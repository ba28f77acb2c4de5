//! Check command - evaluate one request against a rule file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use tlsm_approval::ChannelNotifier;
use tlsm_config::Config;
use tlsm_core::{AccessRequest, Operation};
use tlsm_engine::{Decision, DecisionEngine};

use crate::config_bridge::to_engine_settings;
use crate::identity::{CLI_TASK, FixedIdentity, current_uid};
use crate::theme::Theme;

/// Arguments of `tlsm check`.
#[derive(Debug, Clone)]
pub(crate) struct CheckArgs {
    pub(crate) rules: PathBuf,
    pub(crate) subject: String,
    pub(crate) op: String,
    pub(crate) object: String,
    pub(crate) uid: Option<u32>,
    pub(crate) timeout: Option<u64>,
    pub(crate) json: bool,
}

/// Evaluate the request and print the decision.
///
/// Exits 0 on allow and 1 on deny.
pub(crate) async fn run_check(config: &Config, args: CheckArgs) -> anyhow::Result<ExitCode> {
    let decision = evaluate(config, &args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print_decision(&decision);
    }

    Ok(if decision.verdict.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn evaluate(config: &Config, args: &CheckArgs) -> anyhow::Result<Decision> {
    let operation: Operation = args
        .op
        .parse()
        .with_context(|| format!("invalid operation '{}'", args.op))?;
    let policies = tlsm_policy::load_policy_file(&args.rules)
        .with_context(|| format!("failed to load {}", args.rules.display()))?;

    let mut settings = to_engine_settings(config);
    if let Some(secs) = args.timeout {
        settings.approval_timeout = Duration::from_secs(secs);
    }
    let uid = args.uid.unwrap_or_else(current_uid);

    let engine = DecisionEngine::new(
        Arc::new(FixedIdentity::new(args.subject.clone(), uid)),
        Arc::new(ChannelNotifier::new()),
        settings,
    );
    engine.rules().apply(policies)?;

    let request = AccessRequest::new(operation, args.object.clone());
    let probe = request.clone().with_subject(args.subject.clone());
    if let Some(matched) = engine.rules().find_match(&probe)
        && matched.policy.category.is_interactive()
        && !engine.identity().is_privileged(uid)
    {
        eprintln!(
            "{}",
            Theme::info(&format!(
                "rule #{} needs an approver, waiting up to {}s",
                matched.index,
                engine.settings().approval_timeout.as_secs()
            ))
        );
    }

    Ok(engine.evaluate(CLI_TASK, request).await)
}

fn print_decision(decision: &Decision) {
    println!("\n{}", Theme::header("Decision"));
    println!("{}", Theme::separator());
    println!("  {:<10} {}", "verdict".dimmed(), Theme::verdict(decision.verdict));
    println!("  {:<10} {}", "reason".dimmed(), decision.reason);
    match &decision.matched {
        Some(rule) => println!("  {:<10} #{} {}", "rule".dimmed(), rule.index, rule.rule),
        None => println!("  {:<10} {}", "rule".dimmed(), Theme::dimmed("none")),
    }
    println!("  {:<10} {}", "subject".dimmed(), decision.subject);
    println!(
        "  {:<10} {} ({:+})",
        "score".dimmed(),
        decision.score,
        decision.score_delta
    );
    if let Some(id) = decision.request_id {
        println!("  {:<10} request_{id}", "request".dimmed());
    }
    println!();
}
