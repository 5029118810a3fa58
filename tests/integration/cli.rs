//! The `reprokit` binary end to end

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use super::common::git_fixtures::TestRepo;

/// A command isolated from the user's data directory
fn reprokit(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("reprokit").unwrap();
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_record_then_show() {
    let data = TempDir::new().unwrap();
    let repo = TestRepo::new();

    reprokit(&data)
        .args(["record", "--no-conda", "--no-tools", "--step", "pst_setup", "--dir"])
        .arg(&repo.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Snapshot written to"))
        .stdout(predicate::str::contains("Step: pst_setup"));

    let snapshot = repo.path.join("reproducibility").join("pst_setup");
    assert!(snapshot.join("run_record.json").exists());

    reprokit(&data)
        .arg("show")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains(&repo.head_sha()[..8]))
        .stdout(predicate::str::contains("Scripts: 1"));

    // First run seeds the user config from the bundled example
    assert!(data.path().join("config.toml").exists());
    assert!(data.path().join("logs").join("reprokit.log").exists());
}

#[test]
fn test_record_json_output() {
    let data = TempDir::new().unwrap();
    let repo = TestRepo::new();

    let output = reprokit(&data)
        .args(["record", "--no-conda", "--no-tools", "--no-git", "--json", "--dir"])
        .arg(&repo.path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["schema_version"], 1);
    assert!(record.get("git").is_none());
    assert!(record["manifest"].get("freyberg.pst").is_some());
}

#[test]
fn test_diff_exit_codes() {
    let data = TempDir::new().unwrap();
    let repo = TestRepo::new();

    for step in ["a", "b"] {
        reprokit(&data)
            .args(["record", "--no-conda", "--no-tools", "--no-git", "--step", step, "--dir"])
            .arg(&repo.path)
            .assert()
            .success();
    }
    let a = repo.path.join("reproducibility").join("a");
    let b = repo.path.join("reproducibility").join("b");

    reprokit(&data)
        .arg("diff")
        .arg(&a)
        .arg(&b)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Snapshots are identical."));

    std::fs::write(repo.path.join("freyberg.pst"), "pcf\nchanged\n").unwrap();
    reprokit(&data)
        .args(["record", "--no-conda", "--no-tools", "--no-git", "--step", "b", "--dir"])
        .arg(&repo.path)
        .assert()
        .success();

    reprokit(&data)
        .arg("diff")
        .arg(&a)
        .arg(&b)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("~ freyberg.pst"));
}

#[test]
fn test_bundle_and_extract() {
    let data = TempDir::new().unwrap();
    let repo = TestRepo::new();
    reprokit(&data)
        .args(["record", "--no-conda", "--no-tools", "--dir"])
        .arg(&repo.path)
        .assert()
        .success();

    let snapshot = repo.path.join("reproducibility");
    let out = TempDir::new().unwrap();
    let bundle = out.path().join("snap.repro.zip");

    reprokit(&data)
        .arg("bundle")
        .arg(&snapshot)
        .arg("-o")
        .arg(&bundle)
        .arg("--shareable")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundle written to"));

    reprokit(&data)
        .arg("diff")
        .arg(&snapshot)
        .arg(&bundle)
        .assert()
        .code(0);

    let restored = out.path().join("restored");
    reprokit(&data)
        .arg("extract")
        .arg(&bundle)
        .arg(&restored)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted shareable bundle"));

    reprokit(&data)
        .arg("extract")
        .arg(&bundle)
        .arg(&restored)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn test_invalid_step_fails() {
    let data = TempDir::new().unwrap();
    let repo = TestRepo::new();

    reprokit(&data)
        .args(["record", "--no-conda", "--no-tools", "--step", "../escape", "--dir"])
        .arg(&repo.path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("path separator"));
}

#[test]
fn test_config_commands() {
    let data = TempDir::new().unwrap();

    reprokit(&data)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    reprokit(&data)
        .args(["tools", "set", "mf6"])
        .arg(data.path().join("missing-mf6"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not an executable file"));

    reprokit(&data)
        .args(["tools", "set", "modflow"])
        .arg(data.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown tool 'modflow'"));
}
