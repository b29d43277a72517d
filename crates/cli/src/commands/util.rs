use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use triage_core::db::TriageConfig;
use triage_core::services::process::TargetCommand;
use triage_core::services::verify::VerifyOptions;

/// Load the config file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<TriageConfig> {
    TriageConfig::load_or_default(path)
}

/// Parse the argv given after `--` into a target command.
pub fn parse_target(argv: &[String]) -> Result<Option<TargetCommand>> {
    if argv.is_empty() {
        return Ok(None);
    }
    let target =
        TargetCommand::from_args(argv.iter().cloned()).context("Failed to parse target command")?;
    Ok(Some(target))
}

/// Verification options from config, with CLI overrides applied.
pub fn verify_options(
    config: &TriageConfig,
    threads: Option<usize>,
    timeout_secs: Option<u64>,
) -> VerifyOptions {
    VerifyOptions {
        workers: threads.unwrap_or(config.threads).max(1),
        timeout: Duration::from_secs(timeout_secs.unwrap_or(config.verify_timeout_secs)),
        uninteresting_signals: config.uninteresting_signals.iter().copied().collect::<BTreeSet<_>>(),
    }
}
