// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

// Allow expect/unwrap in tests - they provide clear panic messages on failure
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BUCKET: &str = "db_1652301066_1651609155_1_169641EF-FAC0-437D-AC01-A50CA18C51DC";

fn thaw_adm() -> Command {
    Command::cargo_bin("thaw-adm").expect("binary exists")
}

#[test]
fn help_lists_pipeline_stages() {
    thaw_adm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("evict"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn version_flag_works() {
    thaw_adm()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("thaw-adm"));
}

#[test]
fn scan_builds_ledger_from_source_layout() {
    let source = TempDir::new().unwrap();
    let sink = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let ledger_path = work.path().join("bucket_structure.json");

    std::fs::create_dir_all(source.path().join("main").join(BUCKET)).unwrap();

    thaw_adm()
        .arg("scan")
        .arg("--source-root")
        .arg(source.path())
        .arg("--sink-root")
        .arg(sink.path())
        .arg("--local-base")
        .arg(local.path())
        .arg("--ledger")
        .arg(&ledger_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Scanned 1 indexes, 1 buckets"));

    let content = std::fs::read_to_string(&ledger_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed["main"][0]["bucket"], BUCKET);
    assert_eq!(parsed["main"][0]["status"], "todo");
}

#[test]
fn scan_honors_environment_configuration() {
    let source = TempDir::new().unwrap();
    let sink = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let ledger_path = work.path().join("bucket_structure.json");

    std::fs::create_dir_all(source.path().join("main").join(BUCKET)).unwrap();

    thaw_adm()
        .arg("scan")
        .env("THAW_SOURCE_ROOT", source.path())
        .env("THAW_SINK_ROOT", sink.path())
        .env("THAW_LOCAL_BASE", local.path())
        .env("THAW_LEDGER", &ledger_path)
        .assert()
        .success();

    assert!(ledger_path.exists());
}

#[test]
fn restore_with_no_todo_buckets_exits_2() {
    let work = TempDir::new().unwrap();
    let ledger_path = work.path().join("bucket_structure.json");
    std::fs::write(
        &ledger_path,
        format!(r#"{{ "main": [ {{ "bucket": "{}", "status": "done" }} ] }}"#, BUCKET),
    )
    .unwrap();

    thaw_adm()
        .arg("restore")
        .arg("--ledger")
        .arg(&ledger_path)
        .arg("--index")
        .arg("main")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nothing to restore"));
}

#[test]
fn restore_without_index_selection_exits_2_when_idle() {
    let work = TempDir::new().unwrap();
    let ledger_path = work.path().join("bucket_structure.json");
    std::fs::write(&ledger_path, r#"{ "main": [] }"#).unwrap();

    thaw_adm()
        .arg("restore")
        .arg("--ledger")
        .arg(&ledger_path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nothing to restore"));
}

#[test]
fn restore_fails_cleanly_on_missing_ledger() {
    let work = TempDir::new().unwrap();
    let ledger_path = work.path().join("does-not-exist.json");

    thaw_adm()
        .arg("restore")
        .arg("--ledger")
        .arg(&ledger_path)
        .assert()
        .failure()
        .code(predicate::ne(2));
}

#[cfg(unix)]
#[test]
fn restore_runs_the_configured_script() {
    use std::os::unix::fs::PermissionsExt;

    let work = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let ledger_path = work.path().join("bucket_structure.json");
    std::fs::write(
        &ledger_path,
        format!(r#"{{ "main": [ {{ "bucket": "{}", "status": "todo" }} ] }}"#, BUCKET),
    )
    .unwrap();

    // $1 = bucket, $2 = index.
    let script = work.path().join("process_bucket.sh");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\nmkdir -p {base}/$2/db/$1\n",
            base = local.path().display()
        ),
    )
    .unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    thaw_adm()
        .arg("restore")
        .arg("--ledger")
        .arg(&ledger_path)
        .arg("--index")
        .arg("main")
        .arg("--script")
        .arg(&script)
        .arg("--local-base")
        .arg(local.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 1 buckets in index main"));

    let content = std::fs::read_to_string(&ledger_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed["main"][0]["status"], "pendingupload");
}
