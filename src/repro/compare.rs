//! Structural comparison of two run records

use std::collections::BTreeSet;
use std::fmt;

use crate::repro::manifest::ManifestDiff;
use crate::repro::record::RunRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChange {
    Added { name: String, version: Option<String> },
    Removed { name: String, version: Option<String> },
    VersionChanged {
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordComparison {
    pub tools: Vec<ToolChange>,
    pub git: Vec<FieldChange>,
    pub conda: Option<FieldChange>,
    pub host: Vec<FieldChange>,
    pub files: ManifestDiff,
}

impl RecordComparison {
    pub fn between(old: &RunRecord, new: &RunRecord) -> Self {
        Self {
            tools: compare_tools(old, new),
            git: compare_git(old, new),
            conda: compare_opt(
                "conda.env_name",
                old.conda.as_ref().map(|c| c.env_name.clone()),
                new.conda.as_ref().map(|c| c.env_name.clone()),
            ),
            host: [
                compare_opt(
                    "host.os_version",
                    old.host.os_version.clone(),
                    new.host.os_version.clone(),
                ),
                compare_opt(
                    "host.arch",
                    Some(old.host.arch.clone()),
                    Some(new.host.arch.clone()),
                ),
            ]
            .into_iter()
            .flatten()
            .collect(),
            files: old.manifest.diff(&new.manifest),
        }
    }

    pub fn is_identical(&self) -> bool {
        self.tools.is_empty()
            && self.git.is_empty()
            && self.conda.is_none()
            && self.host.is_empty()
            && self.files.is_empty()
    }
}

fn compare_tools(old: &RunRecord, new: &RunRecord) -> Vec<ToolChange> {
    let names: BTreeSet<&String> = old.tools.keys().chain(new.tools.keys()).collect();
    let mut changes = Vec::new();

    for name in names {
        let old_version = old.tools.get(name).filter(|t| t.path.is_some());
        let new_version = new.tools.get(name).filter(|t| t.path.is_some());
        match (old_version, new_version) {
            (None, None) => {}
            (None, Some(t)) => changes.push(ToolChange::Added {
                name: name.clone(),
                version: t.version.clone(),
            }),
            (Some(t), None) => changes.push(ToolChange::Removed {
                name: name.clone(),
                version: t.version.clone(),
            }),
            (Some(a), Some(b)) if a.version != b.version => {
                changes.push(ToolChange::VersionChanged {
                    name: name.clone(),
                    old: a.version.clone(),
                    new: b.version.clone(),
                })
            }
            _ => {}
        }
    }

    changes
}

fn compare_git(old: &RunRecord, new: &RunRecord) -> Vec<FieldChange> {
    match (&old.git, &new.git) {
        (None, None) => Vec::new(),
        (Some(a), Some(b)) => [
            compare_opt("git.commit", Some(a.commit_hash.clone()), Some(b.commit_hash.clone())),
            compare_opt("git.branch", Some(a.branch.clone()), Some(b.branch.clone())),
            compare_opt("git.dirty", Some(a.dirty.to_string()), Some(b.dirty.to_string())),
        ]
        .into_iter()
        .flatten()
        .collect(),
        (a, b) => vec![FieldChange {
            field: "git",
            old: a.as_ref().map(|g| g.commit_hash.clone()).unwrap_or_else(none),
            new: b.as_ref().map(|g| g.commit_hash.clone()).unwrap_or_else(none),
        }],
    }
}

fn compare_opt(
    field: &'static str,
    old: Option<String>,
    new: Option<String>,
) -> Option<FieldChange> {
    (old != new).then(|| FieldChange {
        field,
        old: old.unwrap_or_else(none),
        new: new.unwrap_or_else(none),
    })
}

fn none() -> String {
    "<none>".to_string()
}

fn version_or_unknown(version: &Option<String>) -> &str {
    version.as_deref().unwrap_or("unknown version")
}

impl fmt::Display for RecordComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identical() {
            return writeln!(f, "Snapshots are identical.");
        }

        if !self.tools.is_empty() {
            writeln!(f, "Tools:")?;
            for change in &self.tools {
                match change {
                    ToolChange::Added { name, version } => {
                        writeln!(f, "  + {} ({})", name, version_or_unknown(version))?
                    }
                    ToolChange::Removed { name, version } => {
                        writeln!(f, "  - {} ({})", name, version_or_unknown(version))?
                    }
                    ToolChange::VersionChanged { name, old, new } => writeln!(
                        f,
                        "  ~ {}: {} -> {}",
                        name,
                        version_or_unknown(old),
                        version_or_unknown(new)
                    )?,
                }
            }
        }

        let fields = self.git.iter().chain(self.conda.iter()).chain(self.host.iter());
        let mut header = false;
        for change in fields {
            if !header {
                writeln!(f, "Environment:")?;
                header = true;
            }
            writeln!(f, "  ~ {}: {} -> {}", change.field, change.old, change.new)?;
        }

        if !self.files.is_empty() {
            writeln!(f, "Files:")?;
            for path in &self.files.added {
                writeln!(f, "  + {}", path)?;
            }
            for path in &self.files.removed {
                writeln!(f, "  - {}", path)?;
            }
            for path in &self.files.changed {
                writeln!(f, "  ~ {}", path)?;
            }
        }

        Ok(())
    }
}
