//! Working directory listing with content hashes

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

/// Files above this size are listed without a hash
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 256 * 1024 * 1024;

/// Directory names never descended into
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[".git", "__pycache__", ".ipynb_checkpoints", "target"];

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ManifestOptions {
    /// Directory names to skip wherever they appear
    pub ignore: Vec<String>,
    /// Paths (under the walked root) to skip entirely
    pub exclude: Vec<PathBuf>,
    pub max_file_size_bytes: u64,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            ignore: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub size: u64,
    /// Hex SHA-256; `None` when the file exceeded the size limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Result of walking a working directory
#[derive(Debug, Default)]
pub struct ManifestScan {
    pub manifest: FileManifest,
    /// Entries below the root that could not be read or hashed
    pub skipped: Vec<ManifestError>,
}

/// Relative path (forward slashes) to entry, sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileManifest {
    pub files: BTreeMap<String, FileEntry>,
}

impl FileManifest {
    /// Walk `root`; only an unreadable root is an error, anything below it
    /// that fails is skipped and reported in [`ManifestScan::skipped`]
    pub fn build(root: &Path, options: &ManifestOptions) -> Result<ManifestScan, ManifestError> {
        let mut scan = ManifestScan::default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if options.exclude.iter().any(|ex| entry.path() == ex.as_path()) {
                    return false;
                }
                !(entry.file_type().is_dir()
                    && options
                        .ignore
                        .iter()
                        .any(|name| entry.file_name().to_string_lossy() == name.as_str()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let root_failed = source.depth() == 0;
                    let error = ManifestError::Walk {
                        path: source.path().unwrap_or(root).to_path_buf(),
                        source,
                    };
                    if root_failed {
                        return Err(error);
                    }
                    tracing::warn!(error = %error, "Skipping unreadable entry");
                    scan.skipped.push(error);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            match hash_entry(&entry, options.max_file_size_bytes) {
                Ok(file) => {
                    scan.manifest.files.insert(relative_key(root, entry.path()), file);
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Skipping unreadable file");
                    scan.skipped.push(error);
                }
            }
        }

        Ok(scan)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }

    /// What changed going from `self` (old) to `other` (new)
    pub fn diff(&self, other: &FileManifest) -> ManifestDiff {
        let mut diff = ManifestDiff::default();

        for (path, old) in &self.files {
            match other.files.get(path) {
                None => diff.removed.push(path.clone()),
                Some(new) => {
                    let differs = match (&old.sha256, &new.sha256) {
                        (Some(a), Some(b)) => a != b,
                        _ => old.size != new.size,
                    };
                    if differs {
                        diff.changed.push(path.clone());
                    }
                }
            }
        }

        diff.added = other
            .files
            .keys()
            .filter(|path| !self.files.contains_key(*path))
            .cloned()
            .collect();

        diff
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

fn hash_entry(entry: &walkdir::DirEntry, max_size: u64) -> Result<FileEntry, ManifestError> {
    let path = entry.path();
    let size = entry
        .metadata()
        .map_err(|source| ManifestError::Walk {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    let sha256 = if size > max_size {
        tracing::debug!(path = %path.display(), size, "Skipping hash of large file");
        None
    } else {
        Some(hash_file(path).map_err(|source| ManifestError::Hash {
            path: path.to_path_buf(),
            source,
        })?)
    };
    Ok(FileEntry { size, sha256 })
}

/// Streamed SHA-256 of a file, hex encoded
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
