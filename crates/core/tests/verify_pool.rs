use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::tempdir;
use triage_core::services::process::TargetCommand;
use triage_core::services::verify::{verify_sample, verify_samples, Verdict, VerifyOptions};

const BY_ARGUMENT: &str = r#"
case "$(cat "$1")" in
  crash) kill -SEGV $$ ;;
  hup) kill -HUP $$ ;;
  hang) sleep 5 ;;
  *) exit 0 ;;
esac
"#;

const BY_STDIN: &str = r#"
case "$(cat)" in
  crash) kill -SEGV $$ ;;
  *) exit 0 ;;
esac
"#;

fn write_sample(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write sample");
    path
}

fn sh_target(script: &Path, with_placeholder: bool) -> TargetCommand {
    let mut argv = vec!["/bin/sh".to_string(), script.display().to_string()];
    if with_placeholder {
        argv.push("@@".to_string());
    }
    TargetCommand::from_args(argv).expect("target command")
}

fn opts(timeout: Duration) -> VerifyOptions {
    VerifyOptions { workers: 4, timeout, uninteresting_signals: BTreeSet::from([1]) }
}

#[test]
fn exit_status_maps_to_verdicts() {
    let tmp = tempdir().expect("tempdir");
    let script = write_sample(tmp.path(), "target.sh", BY_ARGUMENT);
    let target = sh_target(&script, true);
    let opts = opts(Duration::from_secs(10));

    let crash = write_sample(tmp.path(), "crash", "crash");
    let clean = write_sample(tmp.path(), "clean", "clean");
    let hup = write_sample(tmp.path(), "hup", "hup");

    assert_eq!(verify_sample(&target, &crash, &opts).expect("run crash"), Verdict::Valid);
    assert_eq!(verify_sample(&target, &clean, &opts).expect("run clean"), Verdict::Invalid);
    assert_eq!(verify_sample(&target, &hup, &opts).expect("run hup"), Verdict::Invalid);
}

#[test]
fn hanging_sample_is_killed_and_reported_as_timeout() {
    let tmp = tempdir().expect("tempdir");
    let script = write_sample(tmp.path(), "target.sh", BY_ARGUMENT);
    let target = sh_target(&script, true);
    let hang = write_sample(tmp.path(), "hang", "hang");

    let started = Instant::now();
    let verdict = verify_sample(&target, &hang, &opts(Duration::from_secs(1))).expect("run hang");
    assert_eq!(verdict, Verdict::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4), "child was not killed at the timeout");
}

#[test]
fn pool_partitions_a_mixed_batch() {
    let tmp = tempdir().expect("tempdir");
    let script = write_sample(tmp.path(), "target.sh", BY_ARGUMENT);
    let target = sh_target(&script, true);

    let mut samples = Vec::new();
    for (i, kind) in ["crash", "clean", "hang", "crash", "hup", "crash"].iter().enumerate() {
        samples.push(write_sample(tmp.path(), &format!("s{i}"), kind));
    }

    let outcome = verify_samples(&target, &samples, &opts(Duration::from_secs(1)));
    assert_eq!(outcome.valid, 3);
    assert_eq!(outcome.invalid, vec![samples[1].clone(), samples[4].clone()]);
    assert_eq!(outcome.timeout, vec![samples[2].clone()]);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.rejected(), vec![samples[1].clone(), samples[4].clone(), samples[2].clone()]);
}

#[test]
fn stdin_mode_feeds_the_sample_on_standard_input() {
    let tmp = tempdir().expect("tempdir");
    let script = write_sample(tmp.path(), "target.sh", BY_STDIN);
    let target = sh_target(&script, false);
    assert!(target.stdin_mode());

    let crash = write_sample(tmp.path(), "crash", "crash");
    let clean = write_sample(tmp.path(), "clean", "clean");
    let outcome = verify_samples(&target, &[crash, clean.clone()], &opts(Duration::from_secs(10)));
    assert_eq!(outcome.valid, 1);
    assert_eq!(outcome.invalid, vec![clean]);
}

#[test]
fn unreadable_stdin_sample_is_counted_as_error_not_fatal() {
    let tmp = tempdir().expect("tempdir");
    let script = write_sample(tmp.path(), "target.sh", BY_STDIN);
    let target = sh_target(&script, false);
    let crash = write_sample(tmp.path(), "crash", "crash");
    let missing = tmp.path().join("missing");

    let outcome =
        verify_samples(&target, &[missing.clone(), crash], &opts(Duration::from_secs(10)));
    assert_eq!(outcome.valid, 1);
    assert_eq!(outcome.errors, vec![missing]);
}

#[test]
fn custom_uninteresting_signals_are_respected() {
    let tmp = tempdir().expect("tempdir");
    let script = write_sample(tmp.path(), "target.sh", BY_ARGUMENT);
    let target = sh_target(&script, true);
    let crash = write_sample(tmp.path(), "crash", "crash");
    let hup = write_sample(tmp.path(), "hup", "hup");

    let opts = VerifyOptions {
        workers: 1,
        timeout: Duration::from_secs(10),
        uninteresting_signals: BTreeSet::from([11]),
    };
    assert_eq!(verify_sample(&target, &crash, &opts).expect("run crash"), Verdict::Invalid);
    assert_eq!(verify_sample(&target, &hup, &opts).expect("run hup"), Verdict::Valid);
}

#[test]
fn empty_batch_returns_empty_outcome() {
    let target = TargetCommand::parse("/bin/true @@").expect("target");
    let outcome = verify_samples(&target, &[], &VerifyOptions::default());
    assert_eq!(outcome.valid, 0);
    assert!(outcome.rejected().is_empty());
}
