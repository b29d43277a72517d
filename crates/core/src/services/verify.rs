//! Replays samples against the target and sorts out the ones that do not crash.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::services::process::{run_with_timeout, terminating_signal, TargetCommand};

/// Final state of one replayed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Terminated by an interesting signal.
    Valid,
    /// Exited normally, or by an uninteresting signal.
    Invalid,
    /// Still running when the timeout hit; the process group was killed.
    Timeout,
}

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub workers: usize,
    pub timeout: Duration,
    pub uninteresting_signals: BTreeSet<i32>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            timeout: Duration::from_secs(60),
            uninteresting_signals: BTreeSet::from([1]),
        }
    }
}

/// Aggregated verification results. `invalid` and `timeout` keep the submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub valid: usize,
    pub invalid: Vec<PathBuf>,
    pub timeout: Vec<PathBuf>,
    /// Samples that could not be replayed at all (unreadable, spawn failure).
    pub errors: Vec<PathBuf>,
}

impl VerificationOutcome {
    /// Samples that should be dropped from the index: invalid first, then timed out.
    pub fn rejected(&self) -> Vec<PathBuf> {
        self.invalid.iter().chain(self.timeout.iter()).cloned().collect()
    }
}

/// Map an exit status to a verdict (timeouts are decided by the caller).
pub fn classify_exit(status: &ExitStatus, uninteresting_signals: &BTreeSet<i32>) -> Verdict {
    match terminating_signal(status) {
        Some(sig) if !uninteresting_signals.contains(&sig) => Verdict::Valid,
        _ => Verdict::Invalid,
    }
}

/// Replay a single sample.
pub fn verify_sample(
    target: &TargetCommand,
    sample: &Path,
    opts: &VerifyOptions,
) -> std::io::Result<Verdict> {
    let mut cmd = target.command_for(sample)?;
    let out = run_with_timeout(&mut cmd, Some(opts.timeout), false)?;
    if out.timed_out {
        return Ok(Verdict::Timeout);
    }
    Ok(classify_exit(&out.status, &opts.uninteresting_signals))
}

/// Replay every sample on a fixed pool of worker threads.
///
/// The work queue is filled and closed before the workers start; a worker exits once
/// the queue reports closed-and-empty. A failure on one sample is logged and counted
/// in `errors`; it never stops the batch.
pub fn verify_samples(
    target: &TargetCommand,
    samples: &[PathBuf],
    opts: &VerifyOptions,
) -> VerificationOutcome {
    let total = samples.len();
    if total == 0 {
        return VerificationOutcome::default();
    }

    let (task_tx, task_rx) = mpsc::sync_channel::<(usize, PathBuf)>(total);
    for (position, sample) in samples.iter().enumerate() {
        if task_tx.send((position, sample.clone())).is_err() {
            break;
        }
    }
    drop(task_tx);

    let worker_count = opts.workers.max(1).min(total);
    let (result_tx, result_rx) = mpsc::channel::<(usize, PathBuf, std::io::Result<Verdict>)>();
    let task_rx = Arc::new(Mutex::new(task_rx));
    let target = Arc::new(target.clone());
    let opts = Arc::new(opts.clone());
    let mut handles = Vec::with_capacity(worker_count);

    for _ in 0..worker_count {
        let task_rx = Arc::clone(&task_rx);
        let result_tx = result_tx.clone();
        let target = Arc::clone(&target);
        let opts = Arc::clone(&opts);
        handles.push(thread::spawn(move || loop {
            let task = {
                let guard = task_rx.lock().ok();
                match guard {
                    Some(rx) => rx.recv(),
                    None => return,
                }
            };
            let (position, sample) = match task {
                Ok(task) => task,
                Err(_) => break,
            };
            let verdict = verify_sample(&target, &sample, &opts);
            if result_tx.send((position, sample, verdict)).is_err() {
                break;
            }
        }));
    }
    drop(result_tx);

    for handle in handles {
        if handle.join().is_err() {
            warn!("verification worker panicked");
        }
    }

    let mut results: Vec<_> = result_rx.into_iter().collect();
    results.sort_by_key(|(position, _, _)| *position);

    let mut outcome = VerificationOutcome::default();
    for (_, sample, verdict) in results {
        match verdict {
            Ok(Verdict::Valid) => outcome.valid += 1,
            Ok(Verdict::Invalid) => {
                debug!(sample = %sample.display(), "sample does not reproduce");
                outcome.invalid.push(sample);
            }
            Ok(Verdict::Timeout) => {
                debug!(sample = %sample.display(), "sample timed out");
                outcome.timeout.push(sample);
            }
            Err(err) => {
                warn!(sample = %sample.display(), error = %err, "failed to replay sample");
                outcome.errors.push(sample);
            }
        }
    }
    outcome
}
