//! Working tree status: how far the checkout drifted from the recorded commit

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

/// Git diff statistics (additions, deletions, files changed)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitDiffStats {
    pub additions: usize,
    pub deletions: usize,
    pub files_changed: usize,
}

impl GitDiffStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.files_changed > 0 || self.additions > 0 || self.deletions > 0
    }

    /// Uncommitted changes against HEAD (staged and unstaged), limited to `pathspecs`
    pub fn from_working_dir(working_dir: &Path, pathspecs: &[String]) -> Self {
        let output = Command::new("git")
            .args(["diff", "--shortstat", "HEAD", "--"])
            .args(pathspecs)
            .current_dir(working_dir)
            .output();

        match output {
            Ok(o) if o.status.success() => {
                Self::parse_shortstat(&String::from_utf8_lossy(&o.stdout))
            }
            _ => GitDiffStats::default(),
        }
    }

    /// Parse from `git diff --shortstat` output
    /// Format: "1 file changed, 44 insertions(+), 10 deletions(-)"
    pub fn parse_shortstat(output: &str) -> Self {
        let mut stats = GitDiffStats::default();

        for part in output.trim().split(',') {
            let part = part.trim();
            let count = part
                .split_whitespace()
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            if part.contains("insertion") {
                stats.additions = count;
            } else if part.contains("deletion") {
                stats.deletions = count;
            } else if part.contains("file") {
                stats.files_changed = count;
            }
        }

        stats
    }

    /// One-line summary, e.g. "3 files, +44/-10"
    pub fn summary(&self) -> String {
        let noun = if self.files_changed == 1 { "file" } else { "files" };
        format!(
            "{} {}, +{}/-{}",
            self.files_changed, noun, self.additions, self.deletions
        )
    }
}

/// Count entries in `git status --porcelain` output, untracked files included
pub fn count_porcelain_entries(output: &str) -> usize {
    output.lines().filter(|l| !l.trim().is_empty()).count()
}

/// Pathspecs covering the whole repository except `excluded`.
///
/// Empty when `excluded` lies outside `toplevel` or is the toplevel itself.
pub fn excluding_pathspecs(toplevel: &Path, excluded: &Path) -> Vec<String> {
    let Ok(rel) = excluded.strip_prefix(toplevel) else {
        return Vec::new();
    };
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if rel.is_empty() {
        return Vec::new();
    }
    vec![":/".to_string(), format!(":(top,literal,exclude){}", rel)]
}

/// Number of modified, staged or untracked paths matching `pathspecs`
pub fn uncommitted_entries(working_dir: &Path, pathspecs: &[String]) -> std::io::Result<usize> {
    let output = Command::new("git")
        .args(["status", "--porcelain", "--"])
        .args(pathspecs)
        .current_dir(working_dir)
        .output()?;
    if !output.status.success() {
        return Err(std::io::Error::other(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(count_porcelain_entries(&String::from_utf8_lossy(
        &output.stdout,
    )))
}
