use std::fs;
use std::path::Path;

use predicates::prelude::*;
use tempfile::tempdir;

fn write_file(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, body).expect("write file");
}

#[test]
fn vcrash_reports_and_removes_invalid_samples() {
    let tmp = tempdir().expect("tempdir");
    let collection = tmp.path().join("collection");
    write_file(&collection.join("fuzz000:a"), "crash");
    write_file(&collection.join("fuzz000:b"), "clean");
    let script = tmp.path().join("target.sh");
    write_file(&script, "case \"$(cat)\" in\n  crash) kill -SEGV $$ ;;\n  *) exit 0 ;;\nesac\n");
    let list = tmp.path().join("invalid.txt");

    assert_cmd::cargo::cargo_bin_cmd!("crash-triage")
        .arg("vcrash")
        .arg("-r")
        .arg("-f")
        .arg(&list)
        .arg(&collection)
        .arg("--")
        .arg("/bin/sh")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid:"))
        .stdout(predicate::str::contains("Checked 2 sample(s): 1 valid, 1 invalid"))
        .stdout(predicate::str::contains("Removed 1 sample(s)."));

    assert!(collection.join("fuzz000:a").exists());
    assert!(!collection.join("fuzz000:b").exists());
    let listed = fs::read_to_string(&list).expect("list");
    assert!(listed.contains("fuzz000:b"));
}

#[test]
fn vcrash_requires_a_target() {
    let tmp = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("crash-triage")
        .arg("vcrash")
        .arg(tmp.path())
        .assert()
        .failure();
}

#[test]
fn results_on_fresh_database_lists_none() {
    let tmp = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("crash-triage")
        .arg("results")
        .arg("--collection-dir")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Classifications:"))
        .stdout(predicate::str::contains("(none)"));

    assert!(tmp.path().join("triage.db").exists());
}

#[test]
fn results_json_is_an_array() {
    let tmp = tempdir().expect("tempdir");
    let db = tmp.path().join("custom.db");

    let output = assert_cmd::cargo::cargo_bin_cmd!("crash-triage")
        .arg("results")
        .arg("-d")
        .arg(&db)
        .arg("--json")
        .output()
        .expect("run results");
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(rows, serde_json::json!([]));
}
