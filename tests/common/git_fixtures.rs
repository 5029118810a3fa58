//! Git repository test fixtures
//!
//! Temporary repositories laid out like a small modeling workflow.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A temporary git repository for testing
///
/// The repository is removed when the `TestRepo` is dropped.
pub struct TestRepo {
    /// TempDir handle (keeps directory alive until dropped)
    _dir: TempDir,
    /// Path to the repository root
    pub path: PathBuf,
}

impl TestRepo {
    /// Create a new test repository with an initial commit
    ///
    /// The repository will have:
    /// - Git initialized
    /// - User configured (test@example.com)
    /// - GPG signing disabled (for CI compatibility)
    /// - A workflow script and a PEST control file
    /// - One initial commit
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().to_path_buf();

        Self::git(&path, &["init"]);
        Self::git(&path, &["config", "user.email", "test@example.com"]);
        Self::git(&path, &["config", "user.name", "Test User"]);
        // Disable GPG signing to ensure tests work on machines with global signing enabled
        Self::git(&path, &["config", "commit.gpgsign", "false"]);

        std::fs::write(path.join("pst_setup.py"), "import pyemu\n").unwrap();
        std::fs::write(path.join("freyberg.pst"), "pcf\n* control data\n").unwrap();
        Self::git(&path, &["add", "."]);
        Self::git(&path, &["commit", "-m", "Initial commit"]);

        Self { _dir: dir, path }
    }

    /// Create a repository whose working tree has an untracked file
    #[allow(dead_code)] // Used in integration tests via #[path] includes
    pub fn with_uncommitted_changes() -> Self {
        let repo = Self::new();
        std::fs::write(repo.path.join("dirty.txt"), "uncommitted content").unwrap();
        repo
    }

    /// Add a file and commit it
    #[allow(dead_code)]
    pub fn commit_file(&self, filename: &str, content: &str, message: &str) {
        std::fs::write(self.path.join(filename), content).unwrap();
        Self::git(&self.path, &["add", filename]);
        Self::git(&self.path, &["commit", "-m", message]);
    }

    /// Get the HEAD commit SHA
    pub fn head_sha(&self) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(&self.path)
            .output()
            .expect("Failed to get HEAD");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Set up a remote URL for the repository
    #[allow(dead_code)] // Used in integration tests via #[path] includes
    pub fn set_remote(&self, name: &str, url: &str) {
        Self::git(&self.path, &["remote", "add", name, url]);
    }

    /// Execute a git command in the repository
    fn git(path: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(path)
            .output()
            .unwrap_or_else(|e| panic!("Git command failed to execute: {}", e));

        if !output.status.success() {
            panic!(
                "Git command failed: git {}\nstderr: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_creation() {
        let repo = TestRepo::new();
        assert!(repo.path.join(".git").exists());
        assert!(repo.path.join("pst_setup.py").exists());
        assert_eq!(repo.head_sha().len(), 40);
    }

    #[test]
    fn test_commit_file() {
        let repo = TestRepo::new();
        let initial_sha = repo.head_sha();

        repo.commit_file("run_ies.py", "import pyemu\n", "Add run script");

        assert_ne!(initial_sha, repo.head_sha());
    }
}
