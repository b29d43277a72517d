use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crash_triage::commands::{
    collect_command, results_command, vcrash_command, CollectArgs, VcrashArgs,
};
use crash_triage::init_tracing;

/// Crash sample triage for parallel fuzzing campaigns.
///
/// This CLI is a thin wrapper around `triage-core` (exposed in code as `triage_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "crash-triage",
    version,
    about = "Collect, verify, classify and deduplicate fuzzer crash samples",
    long_about = None
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides).
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect samples from all fuzzer instances of a sync directory.
    ///
    /// Optionally:
    /// - Replay them and drop the ones that do not crash (`-r`).
    /// - Classify them with sharded debugger scripts and drop duplicates (`-e`).
    /// - Write a debugger script (`-g`) or a sample list (`-f`).
    Collect(CollectArgs),

    /// Replay the samples of an existing collection and report the ones that do not crash.
    Vcrash(VcrashArgs),

    /// List classification verdicts stored in the triage database.
    Results {
        /// Collection directory (its `triage.db` is used unless `--database` is given).
        #[arg(long, default_value = ".")]
        collection_dir: PathBuf,

        /// Explicit database path.
        #[arg(short = 'd', long)]
        database: Option<PathBuf>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Collect(args) => collect_command(&args)?,
        Command::Vcrash(args) => vcrash_command(&args)?,
        Command::Results { collection_dir, database, json } => {
            results_command(&collection_dir, database, json)?
        }
    }

    Ok(())
}
