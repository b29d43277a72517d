use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;
use triage_core::db::{open_triage_db, CollectionLayout, PersistenceGateway, TriageDb};
use triage_core::discovery::{DiscoveryError, DiscoveryOptions, SampleKind};
use triage_core::index::NamingOptions;
use triage_core::services::classify::{ClassifyOptions, ScriptOptions};
use triage_core::services::triage::{CollectRequest, TriageRunner, TriageSummary};

use crate::commands::{load_config, parse_target, verify_options};

/// Arguments of `crash-triage collect`.
#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Fuzzer synchronisation directory samples are collected from.
    pub sync_dir: PathBuf,

    /// Directory that receives the collected samples and generated files.
    pub collection_dir: PathBuf,

    /// Target command. `@@` is replaced by the sample path; without it the sample is fed on stdin.
    #[arg(last = true)]
    pub target: Vec<String>,

    /// JSON or YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SQLite database: skip already classified samples and store new verdicts.
    #[arg(short = 'd', long)]
    pub database: Option<PathBuf>,

    /// Classify samples by running sharded debugger scripts named `<NAME>.<shard>`.
    #[arg(short = 'e', long = "execute-gdb-script", value_name = "NAME")]
    pub execute_script: Option<String>,

    /// Write one debugger script for all samples into the collection without running it.
    #[arg(short = 'g', long = "generate-gdb-script", value_name = "NAME")]
    pub generate_script: Option<String>,

    /// Write the collected sample paths to this file inside the collection.
    #[arg(short = 'f', long = "filelist", value_name = "NAME")]
    pub filelist: Option<String>,

    /// Replay samples and drop the ones that do not crash or time out.
    #[arg(short = 'r', long = "remove-invalid", default_value_t = false)]
    pub remove_invalid: bool,

    /// Drop samples whose classification is configured as uninteresting (used with `-e`).
    #[arg(long = "remove-unexploitable", visible_alias = "rr", default_value_t = false)]
    pub remove_unexploitable: bool,

    /// Worker threads for verification and debugger shards.
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Per-sample verification timeout in seconds.
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Wall-clock limit in seconds for one debugger shard (overrides config).
    #[arg(long = "classify-timeout", value_name = "SECS")]
    pub classify_timeout: Option<u64>,

    /// Shorten `id:000001,sig:11,...` sample names to the bare id.
    #[arg(short = 'm', long = "minimize-filenames", default_value_t = false)]
    pub minimize_filenames: bool,

    /// Do not prefix collected sample names with the fuzzer instance name.
    #[arg(long, default_value_t = false)]
    pub omit_fuzzer_name: bool,

    /// Collect queue samples instead of crashes.
    #[arg(long, default_value_t = false)]
    pub queue: bool,

    /// Debugger executable (overrides config).
    #[arg(long)]
    pub gdb: Option<PathBuf>,

    /// Exploitability extension sourced by the debugger scripts (overrides config).
    #[arg(long)]
    pub exploitable: Option<PathBuf>,

    /// Keep the per-shard debugger scripts after classification.
    #[arg(long, default_value_t = false)]
    pub keep_scripts: bool,

    /// Emit JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Collect, verify, classify and deduplicate samples from a sync directory.
pub fn collect_command(args: &CollectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let target = parse_target(&args.target)?;
    let layout = CollectionLayout::new(&args.collection_dir);

    if !args.sync_dir.is_dir() {
        return Err(DiscoveryError::MissingDirectory(args.sync_dir.clone()))
            .with_context(|| format!("Failed to collect samples from {}", args.sync_dir.display()));
    }

    let db: Option<TriageDb> = match &args.database {
        Some(path) => Some(open_triage_db(&layout, Some(path.as_path()))?),
        None => None,
    };

    let threads = args.threads.unwrap_or(config.threads).max(1);
    let script = ScriptOptions {
        exploitable: args.exploitable.clone().or_else(|| config.exploitable_path.clone()),
        exit_handler: config.exit_handler_path.clone(),
    };

    let mut request = CollectRequest::new(&args.sync_dir, &args.collection_dir);
    request.target = target;
    request.discovery = DiscoveryOptions {
        kind: if args.queue { SampleKind::Queue } else { SampleKind::Crashes },
        naming: NamingOptions {
            min_filename: args.minimize_filenames,
            omit_origin: args.omit_fuzzer_name,
        },
        exclude: config.exclude_files.clone(),
        stats_file: config.stats_file.clone(),
    };
    if args.remove_invalid {
        request.verify = Some(verify_options(&config, args.threads, args.timeout));
    }
    if let Some(stem) = &args.execute_script {
        request.classify = Some(ClassifyOptions {
            gdb: args.gdb.clone().unwrap_or_else(|| config.gdb_binary.clone()),
            script: script.clone(),
            shards: threads,
            timeout: args
                .classify_timeout
                .or(config.classify_timeout_secs)
                .map(Duration::from_secs),
            script_stem: stem.clone(),
            keep_scripts: args.keep_scripts,
        });
    }
    if args.remove_unexploitable {
        request.remove_uninteresting = Some(config.uninteresting_classifications.clone());
    }
    if let Some(name) = &args.generate_script {
        request.generate_script = Some((name.clone(), script));
    }
    request.manifest = args.filelist.clone();

    debug!(
        sync_dir = %args.sync_dir.display(),
        collection = %args.collection_dir.display(),
        verify = request.verify.is_some(),
        classify = request.classify.is_some(),
        "starting collection"
    );
    let gateway = db.as_ref().map(|d| d as &dyn PersistenceGateway);
    let summary = TriageRunner::new(gateway)
        .collect(&request)
        .with_context(|| format!("Failed to collect samples from {}", args.sync_dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &TriageSummary) {
    println!("Collection summary:");
    println!("  Fuzzers: {}", summary.fuzzers);
    println!("  Samples discovered: {}", summary.discovered);
    if summary.invalid + summary.timed_out + summary.verify_errors > 0 {
        println!("  Invalid (removed): {}", summary.invalid);
        println!("  Timed out (removed): {}", summary.timed_out);
        println!("  Verification errors: {}", summary.verify_errors);
    }
    if summary.classified > 0 || !summary.unclassified.is_empty() {
        println!("  Classified: {}", summary.classified);
        println!("  Duplicates (removed): {}", summary.duplicates);
        println!("  Uninteresting (removed): {}", summary.uninteresting);
    }
    if !summary.unclassified.is_empty() {
        println!(
            "  Warning: {} sample(s) were not classified (debugger output truncated):",
            summary.unclassified.len()
        );
        for name in &summary.unclassified {
            println!("    - {name}");
        }
    }
    if summary.failed_shards > 0 {
        println!("  Failed debugger shards: {}", summary.failed_shards);
    }
    println!("  Copied: {}", summary.copied);
    if let Some(script) = &summary.script {
        println!("  Debugger script: {}", script.display());
    }
    if let Some(manifest) = &summary.manifest {
        println!("  File list: {}", manifest.display());
    }

    for result in &summary.results {
        println!(
            "- {} [{}] {} ({})",
            result.sample_output_name, result.classification, result.description, result.fault_hash
        );
    }
}
