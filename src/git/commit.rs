//! Commit capture: which revision of the workflow scripts produced a run

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::{excluding_pathspecs, uncommitted_entries, GitDiffStats};

#[derive(Error, Debug)]
pub enum GitInfoError {
    #[error("Git is not installed or not in PATH")]
    GitNotFound,
    #[error("Not a git repository: {0}")]
    NotAGitRepo(PathBuf),
    #[error("Git command failed: {0}")]
    CommandFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Git state of the recorded working directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommitInfo {
    pub project_name: String,
    pub branch: String,
    pub commit_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Browser URL of the repository, derived from the remote
    pub web_url: String,
    pub dirty: bool,
    #[serde(default)]
    pub uncommitted_entries: usize,
    #[serde(default)]
    pub diff: GitDiffStats,
}

impl GitCommitInfo {
    /// Capture commit, branch, remote and dirtiness for `dir`
    pub fn capture(dir: &Path) -> Result<Self, GitInfoError> {
        Self::capture_excluding(dir, None)
    }

    /// Like [`capture`](Self::capture), but changes under `excluded` do not
    /// count towards dirtiness
    pub fn capture_excluding(dir: &Path, excluded: Option<&Path>) -> Result<Self, GitInfoError> {
        match git(dir, &["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out == "true" => {}
            Ok(_) | Err(GitInfoError::CommandFailed(_)) => {
                return Err(GitInfoError::NotAGitRepo(dir.to_path_buf()))
            }
            Err(e) => return Err(e),
        }

        let commit_hash = git(dir, &["rev-parse", "HEAD"])?;
        let branch = git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;

        // No origin is fine: fall back to the directory name.
        let remote_url = git(dir, &["config", "--get", "remote.origin.url"])
            .ok()
            .filter(|url| !url.is_empty());

        let project_name = remote_url
            .as_deref()
            .and_then(project_name_from_remote)
            .unwrap_or_else(|| dir_name(dir));

        let web_url = remote_url
            .as_deref()
            .and_then(web_url_from_remote)
            .unwrap_or_else(|| format!("https://github.com/<user>/{}", project_name));

        let pathspecs = match excluded {
            Some(excluded) => {
                let toplevel = PathBuf::from(git(dir, &["rev-parse", "--show-toplevel"])?);
                let toplevel = std::fs::canonicalize(&toplevel).unwrap_or(toplevel);
                let excluded = std::fs::canonicalize(excluded)
                    .unwrap_or_else(|_| excluded.to_path_buf());
                excluding_pathspecs(&toplevel, &excluded)
            }
            None => Vec::new(),
        };
        let uncommitted_entries = uncommitted_entries(dir, &pathspecs)?;
        let diff = GitDiffStats::from_working_dir(dir, &pathspecs);

        tracing::debug!(
            dir = %dir.display(),
            commit = %commit_hash,
            branch = %branch,
            dirty = uncommitted_entries > 0,
            "Captured git state"
        );

        Ok(Self {
            project_name,
            branch,
            commit_hash,
            remote_url,
            web_url,
            dirty: uncommitted_entries > 0,
            uncommitted_entries,
            diff,
        })
    }

    /// Short form of the commit hash
    pub fn short_hash(&self) -> &str {
        let end = self.commit_hash.len().min(8);
        &self.commit_hash[..end]
    }

    /// Render the human-readable commit file
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Project Name: {}\n", self.project_name));
        out.push_str(&format!("Branch Name: {}\n", self.branch));
        out.push_str(&format!("Commit Hash: {}\n", self.commit_hash));
        out.push_str(&format!(
            "View single commit: {}/commit/{}\n",
            self.web_url, self.commit_hash
        ));
        out.push_str(&format!(
            "View log: {}/commits/{}\n",
            self.web_url, self.commit_hash
        ));
        if self.dirty {
            out.push_str(&format!(
                "Uncommitted changes: {} entries ({})\n",
                self.uncommitted_entries,
                self.diff.summary()
            ));
        }
        out.push_str(
            "/!\\ the files in the directory may have been modified since the last commit!!\n",
        );
        out
    }

    /// Write `git_commit_<timestamp>.txt` into `dest_dir`
    pub fn write_text_file(&self, dest_dir: &Path, timestamp: &str) -> io::Result<PathBuf> {
        let path = dest_dir.join(format!("git_commit_{}.txt", timestamp));
        std::fs::write(&path, self.render_text())?;
        Ok(path)
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<String, GitInfoError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GitInfoError::GitNotFound,
            _ => GitInfoError::Io(e),
        })?;

    if !output.status.success() {
        return Err(GitInfoError::CommandFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn dir_name(dir: &Path) -> String {
    let resolved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Project name from a remote URL.
///
/// Handles `https://github.com/user/project.git` and
/// `git@github.com:user/project.git` (with or without `.git`).
pub fn project_name_from_remote(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);
    let name = url.rsplit(&['/', ':', '\\'][..]).next()?;
    if name.is_empty() || name.contains('@') {
        return None;
    }
    Some(name.to_string())
}

/// Browser URL for a remote, with credentials stripped.
///
/// Returns `None` for remotes that are not hosted (local paths, `file://`).
pub fn web_url_from_remote(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);

    let (host, path) = if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("ssh://"))
        .or_else(|| url.strip_prefix("git://"))
    {
        let (authority, path) = rest.split_once('/')?;
        let host = authority.rsplit('@').next()?;
        // Drop an ssh port; browsers use the default one.
        let host = if url.starts_with("ssh://") {
            host.split(':').next()?
        } else {
            host
        };
        (host.to_string(), path.to_string())
    } else if url.contains("://") {
        return None;
    } else {
        // scp-like syntax: [user@]host:path
        let (authority, path) = url.split_once(':')?;
        if authority.contains('/') || authority.len() == 1 {
            // A local path, or a Windows drive letter.
            return None;
        }
        let host = authority.rsplit('@').next()?;
        (host.to_string(), path.trim_start_matches('/').to_string())
    };

    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("https://{}/{}", host, path))
}
