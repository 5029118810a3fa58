//! Recording snapshots of a git-tracked workflow directory

use std::path::Path;

use super::common::git_fixtures::TestRepo;
use super::common::offline_options;
use reprokit::repro::record::RUN_RECORD_FILENAME;
use reprokit::{RecordComparison, Recorder, RunRecord};

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_record_clean_repo() {
    let repo = TestRepo::new();
    repo.set_remote("origin", "git@github.com:hydro/freyberg.git");

    let outcome = Recorder::new(offline_options(&repo.path)).record().await.unwrap();
    let record = &outcome.record;

    let git = record.git.as_ref().expect("git state should be captured");
    assert_eq!(git.commit_hash, repo.head_sha());
    assert_eq!(git.project_name, "freyberg");
    assert_eq!(git.web_url, "https://github.com/hydro/freyberg");
    assert!(!git.dirty, "the snapshot itself must not dirty the tree");
    assert!(record.warnings.is_empty(), "warnings: {:?}", record.warnings);

    let files = files_in(&outcome.snapshot_dir);
    assert!(files.contains(&RUN_RECORD_FILENAME.to_string()));
    assert!(files.iter().any(|f| f.starts_with("git_commit_") && f.ends_with(".txt")));
    assert!(files.iter().any(|f| f.starts_with("pst_setup.py_") && f.ends_with(".txt")));

    let commit_file = files.iter().find(|f| f.starts_with("git_commit_")).unwrap();
    let text = std::fs::read_to_string(outcome.snapshot_dir.join(commit_file)).unwrap();
    assert!(text.contains(&format!(
        "View single commit: https://github.com/hydro/freyberg/commit/{}",
        repo.head_sha()
    )));

    // .git and the snapshot directory stay out of the manifest
    let keys: Vec<&String> = record.manifest.files.keys().collect();
    assert_eq!(keys, vec!["freyberg.pst", "pst_setup.py"]);
}

#[tokio::test]
async fn test_record_dirty_repo() {
    let repo = TestRepo::with_uncommitted_changes();

    let outcome = Recorder::new(offline_options(&repo.path)).record().await.unwrap();
    let git = outcome.record.git.unwrap();

    assert!(git.dirty);
    assert_eq!(git.uncommitted_entries, 1);
    assert!(git.render_text().contains("Uncommitted changes: 1 entries"));
}

#[tokio::test]
async fn test_record_written_to_disk_matches_outcome() {
    let repo = TestRepo::new();
    let outcome = Recorder::new(offline_options(&repo.path).with_step("pst_setup"))
        .record()
        .await
        .unwrap();

    let loaded = RunRecord::read_from_path(&outcome.snapshot_dir).unwrap();
    assert_eq!(loaded, outcome.record);
    assert_eq!(loaded.step.as_deref(), Some("pst_setup"));
    assert!(outcome
        .snapshot_dir
        .ends_with(Path::new("reproducibility").join("pst_setup")));
}

#[tokio::test]
async fn test_compare_snapshots_across_commits() {
    let repo = TestRepo::new();
    let before = Recorder::new(offline_options(&repo.path).with_step("before"))
        .record()
        .await
        .unwrap();

    repo.commit_file(
        "freyberg.pst",
        "pcf\n* control data\nrestart estimation\n",
        "Tweak control data",
    );

    let after = Recorder::new(offline_options(&repo.path).with_step("after"))
        .record()
        .await
        .unwrap();

    let cmp = RecordComparison::between(&before.record, &after.record);
    assert!(!cmp.is_identical());
    assert!(cmp.git.iter().any(|c| c.field == "git.commit"));
    assert_eq!(cmp.files.changed, vec!["freyberg.pst"]);

    let same = RecordComparison::between(&after.record, &after.record);
    assert!(same.is_identical());
}

#[tokio::test]
async fn test_later_steps_keep_clean_tree_clean() {
    let repo = TestRepo::new();

    for step in ["prep_deps", "pst_setup", "deploy_pestpp"] {
        let outcome = Recorder::new(offline_options(&repo.path).with_step(step))
            .record()
            .await
            .unwrap();
        let git = outcome.record.git.unwrap();
        assert!(!git.dirty, "step {} saw earlier snapshots as changes", step);
        assert_eq!(git.uncommitted_entries, 0);
    }

    // Real changes next to the snapshots are still reported
    std::fs::write(repo.path.join("dirty.txt"), "uncommitted content").unwrap();
    let outcome = Recorder::new(offline_options(&repo.path).with_step("pst_setup"))
        .record()
        .await
        .unwrap();
    let git = outcome.record.git.unwrap();
    assert!(git.dirty);
    assert_eq!(git.uncommitted_entries, 1);
}
