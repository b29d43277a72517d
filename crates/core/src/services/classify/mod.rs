//! Sharded debugger-driven classification.
//!
//! The index is split round-robin into shards; every shard gets its own script and
//! its own debugger process on a worker thread. Workers push their parsed groups
//! into a shared collector, and the orchestrator merges them once all workers have
//! joined. Missing verdicts are reported by name, never fabricated.

pub mod parse;
pub mod script;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

pub use parse::{parse_debugger_output, ParsedOutput};
pub use script::{render_script, write_script, ScriptOptions};

use crate::db::CollectionLayout;
use crate::index::SampleIndex;
use crate::model::ClassificationResult;
use crate::services::process::{find_executable, run_with_timeout, TargetCommand};
use crate::services::TriageError;

#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub gdb: PathBuf,
    pub script: ScriptOptions,
    /// Number of shards (and debugger processes).
    pub shards: usize,
    /// Wall-clock limit for one debugger process.
    pub timeout: Option<Duration>,
    /// File name stem of the per-shard scripts, written as `<stem>.<shard>`.
    pub script_stem: String,
    pub keep_scripts: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            gdb: PathBuf::from("gdb"),
            script: ScriptOptions::default(),
            shards: 1,
            timeout: None,
            script_stem: "triage_script".to_string(),
            keep_scripts: false,
        }
    }
}

/// Fewer verdicts were parsed than samples were submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TruncationWarning {
    pub submitted: usize,
    pub classified: usize,
    /// Output names of the samples without a verdict, in index order.
    pub missing: Vec<String>,
}

/// A shard that could not be run; the other shards are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardFailure {
    pub shard: usize,
    pub script: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationOutcome {
    /// One verdict per classified sample, in index order.
    pub results: Vec<ClassificationResult>,
    pub truncation: Option<TruncationWarning>,
    pub failed_shards: Vec<ShardFailure>,
}

/// Classify every sample of `index` with the debugger.
///
/// Fails up front when the debugger or target cannot be found. Everything after that
/// is recovered per shard and reported in the outcome.
pub fn classify_index(
    index: &SampleIndex,
    target: &TargetCommand,
    layout: &CollectionLayout,
    opts: &ClassifyOptions,
) -> Result<ClassificationOutcome, TriageError> {
    let gdb = find_executable(&opts.gdb).ok_or_else(|| TriageError::MissingDebugger(opts.gdb.clone()))?;
    let target_program = target.resolve()?;

    if index.is_empty() {
        return Ok(ClassificationOutcome::default());
    }

    let collector: Arc<Mutex<Vec<ClassificationResult>>> = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();

    for (shard_id, shard) in index.divide(opts.shards).into_iter().enumerate() {
        if shard.is_empty() {
            continue;
        }
        let script_path = layout.script_path(&opts.script_stem, shard_id);
        let worker_script = script_path.clone();
        let collector = Arc::clone(&collector);
        let gdb = gdb.clone();
        let target_program = target_program.clone();
        let target = target.clone();
        let shard_opts = opts.clone();
        let handle = thread::spawn(move || {
            run_shard(
                shard_id,
                &shard,
                &worker_script,
                &gdb,
                &target_program,
                &target,
                &shard_opts,
                &collector,
            )
        });
        handles.push((shard_id, script_path, handle));
    }

    let mut failed_shards = Vec::new();
    for (shard_id, script, handle) in handles {
        let failure = match handle.join() {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some("classification worker panicked".to_string()),
        };
        if let Some(error) = failure {
            warn!(shard = shard_id, script = %script.display(), error = %error, "shard failed");
            failed_shards.push(ShardFailure { shard: shard_id, script, error });
        }
    }

    let collected = match collector.lock() {
        Ok(mut guard) => std::mem::take(&mut *guard),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    let (results, truncation) = merge_results(index, collected);
    if let Some(t) = &truncation {
        warn!(
            submitted = t.submitted,
            classified = t.classified,
            missing = ?t.missing,
            "debugger output truncated; some samples were not classified"
        );
    }

    Ok(ClassificationOutcome { results, truncation, failed_shards })
}

/// Order collected verdicts by index position, drop repeats and unknown names, and
/// work out which samples never got a verdict.
pub fn merge_results(
    index: &SampleIndex,
    collected: Vec<ClassificationResult>,
) -> (Vec<ClassificationResult>, Option<TruncationWarning>) {
    let mut seen = HashSet::new();
    let mut positioned: Vec<(usize, ClassificationResult)> = collected
        .into_iter()
        .filter_map(|r| {
            let position = index.position_of(&r.sample_output_name)?;
            seen.insert(r.sample_output_name.clone()).then_some((position, r))
        })
        .collect();
    positioned.sort_by_key(|(position, _)| *position);
    let results: Vec<ClassificationResult> = positioned.into_iter().map(|(_, r)| r).collect();

    let missing: Vec<String> = index
        .records()
        .iter()
        .filter(|r| !seen.contains(&r.output_name))
        .map(|r| r.output_name.clone())
        .collect();
    let truncation = (!missing.is_empty()).then(|| TruncationWarning {
        submitted: index.size(),
        classified: results.len(),
        missing,
    });
    (results, truncation)
}

#[allow(clippy::too_many_arguments)]
fn run_shard(
    shard_id: usize,
    shard: &SampleIndex,
    script_path: &Path,
    gdb: &Path,
    target_program: &Path,
    target: &TargetCommand,
    opts: &ClassifyOptions,
    collector: &Mutex<Vec<ClassificationResult>>,
) -> Result<(), TriageError> {
    write_script(script_path, shard, target_program, target, &opts.script)?;
    debug!(shard = shard_id, samples = shard.size(), script = %script_path.display(), "running debugger");

    let mut cmd = Command::new(gdb);
    cmd.arg("-q").arg("-x").arg(script_path).stdin(Stdio::null()).stderr(Stdio::null());
    let run = run_with_timeout(&mut cmd, opts.timeout, true);

    if !opts.keep_scripts {
        if let Err(err) = fs::remove_file(script_path) {
            debug!(script = %script_path.display(), error = %err, "failed to remove script");
        }
    }

    let output = run.map_err(|source| TriageError::ScriptIo { path: script_path.to_path_buf(), source })?;
    if output.timed_out {
        warn!(shard = shard_id, "debugger timed out; keeping partial output");
    }

    let parsed = parse_debugger_output(&output.stdout);
    if !parsed.incomplete.is_empty() {
        debug!(shard = shard_id, incomplete = ?parsed.incomplete, "discarded incomplete groups");
    }
    match collector.lock() {
        Ok(mut guard) => guard.extend(parsed.results),
        Err(poisoned) => poisoned.into_inner().extend(parsed.results),
    }
    Ok(())
}

/// Write one unsharded script for the whole index without running it.
pub fn generate_script(
    index: &SampleIndex,
    target: &TargetCommand,
    path: &Path,
    opts: &ScriptOptions,
) -> Result<PathBuf, TriageError> {
    let target_program = target.resolve()?;
    write_script(path, index, &target_program, target, opts)?;
    Ok(path.to_path_buf())
}
