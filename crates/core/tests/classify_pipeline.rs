use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::tempdir;
use triage_core::db::CollectionLayout;
use triage_core::index::SampleIndex;
use triage_core::model::Classification;
use triage_core::services::classify::{classify_index, merge_results, ClassifyOptions};
use triage_core::services::dedup::{deduplicate, filter_uninteresting};
use triage_core::services::process::TargetCommand;
use triage_core::services::TriageError;

/// Stand-in debugger: reads the sample markers from the script passed last and
/// answers with one verdict per sample. The hash is the sample's file name, so the
/// same file name found by two fuzzers collapses during dedup.
const FAKE_GDB: &str = r#"#!/bin/sh
for last; do :; done
grep '^echo Crash sample: ' "$last" | sed -e 's/^echo //' -e 's/\\n$//' | while IFS= read -r line; do
  name=${line#Crash sample: \'}
  name=${name%\'}
  STOP_CASE
  echo "$line"
  echo "Program received signal SIGSEGV, Segmentation fault."
  echo "Short description: Fake fault"
  echo "Hash: hash-${name#*:}"
  case "$name" in
    *sample2) echo "Exploitability Classification: NOT_EXPLOITABLE" ;;
    *) echo "Exploitability Classification: EXPLOITABLE" ;;
  esac
done
"#;

fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write executable");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn fake_gdb(dir: &Path, stop_after: Option<&str>) -> PathBuf {
    let stop = match stop_after {
        Some(name) => format!("case \"$name\" in {name}) exit 0 ;; esac"),
        None => ":".to_string(),
    };
    write_executable(dir, "fake-gdb", &FAKE_GDB.replace("STOP_CASE", &stop))
}

fn two_fuzzer_index(out: &Path) -> SampleIndex {
    let mut index = SampleIndex::new(out);
    for fuzzer in ["fuzz000", "fuzz001"] {
        for i in 0..3 {
            index.add(fuzzer, format!("/sync/{fuzzer}/crashes/sample{i}"));
        }
    }
    index
}

fn options(gdb: PathBuf, shards: usize) -> ClassifyOptions {
    ClassifyOptions { gdb, shards, ..ClassifyOptions::default() }
}

#[test]
fn sharded_run_classifies_every_sample_in_index_order() {
    let tmp = tempdir().expect("tempdir");
    let gdb = fake_gdb(tmp.path(), None);
    let layout = CollectionLayout::new(tmp.path());
    let index = two_fuzzer_index(tmp.path());
    let target = TargetCommand::parse("/bin/sh @@").expect("target");

    let outcome = classify_index(&index, &target, &layout, &options(gdb, 3)).expect("classify");

    assert!(outcome.truncation.is_none());
    assert!(outcome.failed_shards.is_empty());
    let names: Vec<&str> =
        outcome.results.iter().map(|r| r.sample_output_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "fuzz000:sample0",
            "fuzz000:sample1",
            "fuzz000:sample2",
            "fuzz001:sample0",
            "fuzz001:sample1",
            "fuzz001:sample2",
        ]
    );
    assert_eq!(outcome.results[0].fault_hash, "hash-sample0");
    assert_eq!(outcome.results[2].classification, Classification::NotExploitable);

    // Shard scripts are cleaned up by default.
    for shard in 0..3 {
        assert!(!layout.script_path("triage_script", shard).exists());
    }
}

#[test]
fn duplicates_and_uninteresting_verdicts_are_dropped() {
    let tmp = tempdir().expect("tempdir");
    let gdb = fake_gdb(tmp.path(), None);
    let layout = CollectionLayout::new(tmp.path());
    let mut index = two_fuzzer_index(tmp.path());
    let target = TargetCommand::parse("/bin/sh @@").expect("target");

    let outcome = classify_index(&index, &target, &layout, &options(gdb, 2)).expect("classify");
    let dedup = deduplicate(outcome.results);
    assert_eq!(dedup.kept.len(), 3);
    assert_eq!(
        dedup.duplicates,
        vec!["fuzz001:sample0", "fuzz001:sample1", "fuzz001:sample2"]
    );
    index.remove_outputs(&dedup.duplicates);
    assert_eq!(index.size(), 3);

    let (kept, dropped) = filter_uninteresting(dedup.kept, &Classification::default_uninteresting());
    assert_eq!(kept.len(), 2);
    assert_eq!(dropped, vec!["fuzz000:sample2".to_string()]);
}

#[test]
fn aborted_debugger_yields_truncation_warning_with_missing_names() {
    let tmp = tempdir().expect("tempdir");
    let gdb = fake_gdb(tmp.path(), Some("fuzz000:sample2"));
    let layout = CollectionLayout::new(tmp.path());
    let mut index = SampleIndex::new(tmp.path());
    for i in 0..3 {
        index.add("fuzz000", format!("/sync/fuzz000/crashes/sample{i}"));
    }
    let target = TargetCommand::parse("/bin/sh @@").expect("target");

    let outcome = classify_index(&index, &target, &layout, &options(gdb, 1)).expect("classify");
    assert_eq!(outcome.results.len(), 2);
    let truncation = outcome.truncation.expect("truncation warning");
    assert_eq!(truncation.submitted, 3);
    assert_eq!(truncation.classified, 2);
    assert_eq!(truncation.missing, vec!["fuzz000:sample2".to_string()]);
}

#[test]
fn scripts_can_be_kept_for_inspection() {
    let tmp = tempdir().expect("tempdir");
    let gdb = fake_gdb(tmp.path(), None);
    let layout = CollectionLayout::new(tmp.path());
    let index = two_fuzzer_index(tmp.path());
    let target = TargetCommand::parse("/bin/sh @@").expect("target");

    let mut opts = options(gdb, 2);
    opts.keep_scripts = true;
    opts.script_stem = "kept".to_string();
    classify_index(&index, &target, &layout, &opts).expect("classify");

    let script = fs::read_to_string(layout.script_path("kept", 0)).expect("shard 0 script");
    assert!(script.starts_with("file /bin/sh\n"));
    assert_eq!(script.matches("exploitable\n").count(), 3);
    assert!(layout.script_path("kept", 1).exists());
}

#[test]
fn shard_with_unwritable_script_fails_alone() {
    let tmp = tempdir().expect("tempdir");
    let gdb = fake_gdb(tmp.path(), None);
    // Scripts land in a directory that does not exist.
    let layout = CollectionLayout::new(tmp.path().join("missing-dir"));
    let index = two_fuzzer_index(tmp.path());
    let target = TargetCommand::parse("/bin/sh @@").expect("target");

    let outcome = classify_index(&index, &target, &layout, &options(gdb, 2)).expect("classify");
    assert_eq!(outcome.failed_shards.len(), 2);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.truncation.expect("truncation").missing.len(), 6);
}

#[test]
fn missing_debugger_is_fatal() {
    let tmp = tempdir().expect("tempdir");
    let layout = CollectionLayout::new(tmp.path());
    let index = two_fuzzer_index(tmp.path());
    let target = TargetCommand::parse("/bin/sh @@").expect("target");

    let err = classify_index(&index, &target, &layout, &options(tmp.path().join("no-gdb"), 1))
        .expect_err("missing debugger");
    assert!(matches!(err, TriageError::MissingDebugger(_)));
}

#[test]
fn merge_drops_repeats_and_unknown_names() {
    let index = two_fuzzer_index(Path::new("/tmp/out"));
    let verdict = |name: &str| triage_core::model::ClassificationResult {
        sample_output_name: name.to_string(),
        classification: Classification::Unknown,
        description: "d".to_string(),
        fault_hash: format!("h-{name}"),
        comment: String::new(),
    };
    let collected = vec![
        verdict("fuzz001:sample1"),
        verdict("fuzz000:sample0"),
        verdict("fuzz000:sample0"),
        verdict("stranger:sample9"),
    ];
    let (results, truncation) = merge_results(&index, collected);
    let names: Vec<&str> = results.iter().map(|r| r.sample_output_name.as_str()).collect();
    assert_eq!(names, vec!["fuzz000:sample0", "fuzz001:sample1"]);
    assert_eq!(truncation.expect("truncation").missing.len(), 4);
}

#[test]
fn hanging_debugger_is_bounded_by_the_shard_timeout() {
    let tmp = tempdir().expect("tempdir");
    let gdb = write_executable(tmp.path(), "hanging-gdb", "#!/bin/sh\nsleep 30\n");
    let layout = CollectionLayout::new(tmp.path());
    let index = two_fuzzer_index(tmp.path());
    let target = TargetCommand::parse("/bin/sh @@").expect("target");

    let mut opts = options(gdb, 2);
    opts.timeout = Some(Duration::from_secs(1));
    let started = Instant::now();
    let outcome = classify_index(&index, &target, &layout, &opts).expect("classify");

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(outcome.results.is_empty());
    assert!(outcome.failed_shards.is_empty());
    assert_eq!(outcome.truncation.expect("truncation").missing.len(), 6);
}
