use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use triage_core::services::triage::TriageRunner;

use crate::commands::{load_config, parse_target, verify_options};

/// Arguments of `crash-triage vcrash`.
#[derive(Args, Debug, Clone)]
pub struct VcrashArgs {
    /// Collection directory whose samples are replayed.
    pub collection_dir: PathBuf,

    /// Target command. `@@` is replaced by the sample path; without it the sample is fed on stdin.
    #[arg(last = true, required = true)]
    pub target: Vec<String>,

    /// JSON or YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Delete samples that do not crash or time out.
    #[arg(short = 'r', long = "remove", default_value_t = false)]
    pub remove: bool,

    /// Write the paths of invalid and timed out samples to this file.
    #[arg(short = 'f', long = "filelist")]
    pub filelist: Option<PathBuf>,

    /// Worker threads.
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Per-sample timeout in seconds.
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Do not list rejected samples.
    #[arg(short = 'q', long, default_value_t = false)]
    pub quiet: bool,

    /// Emit JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Replay every sample of an existing collection and report the ones that do not crash.
pub fn vcrash_command(args: &VcrashArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let target = parse_target(&args.target)?.ok_or_else(|| anyhow!("A target command is required"))?;
    let opts = verify_options(&config, args.threads, args.timeout);

    let check = TriageRunner::new(None)
        .verify_collection(
            &args.collection_dir,
            &target,
            &opts,
            &config.exclude_files,
            args.remove,
            args.filelist.as_deref(),
        )
        .with_context(|| format!("Failed to verify {}", args.collection_dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&check)?);
        return Ok(());
    }

    if !args.quiet {
        for sample in &check.invalid {
            println!("Invalid: {}", sample.display());
        }
        for sample in &check.timeout {
            println!("Timeout: {}", sample.display());
        }
        for sample in &check.errors {
            println!("Error: {}", sample.display());
        }
    }
    println!(
        "Checked {} sample(s): {} valid, {} invalid, {} timed out, {} error(s).",
        check.checked,
        check.valid,
        check.invalid.len(),
        check.timeout.len(),
        check.errors.len()
    );
    if args.remove {
        println!("Removed {} sample(s).", check.removed);
    }
    if let Some(list) = &check.list {
        println!("File list: {}", list.display());
    }
    Ok(())
}
