use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::env::{CondaSnapshot, HostInfo};
use crate::git::GitCommitInfo;
use crate::repro::manifest::FileManifest;
use crate::util::tools::ToolRecord;

pub const RUN_RECORD_SCHEMA_VERSION: u32 = 1;

/// File name of the record inside a snapshot directory
pub const RUN_RECORD_FILENAME: &str = "run_record.json";

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("unsupported run record schema_version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
    #[error("No run_record.json in {0}")]
    NotFound(PathBuf),
    #[error("Invalid run record {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize run record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Environment state captured at the start of a workflow step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub schema_version: u32,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub working_dir: PathBuf,
    pub app_version: String,
    pub host: HostInfo,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitCommitInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conda: Option<CondaSnapshot>,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub manifest: FileManifest,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RunRecord {
    pub fn new(working_dir: PathBuf, step: Option<String>, host: HostInfo) -> Self {
        Self {
            schema_version: RUN_RECORD_SCHEMA_VERSION,
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            step,
            working_dir,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            host,
            tools: BTreeMap::new(),
            git: None,
            conda: None,
            scripts: Vec::new(),
            manifest: FileManifest::default(),
            warnings: Vec::new(),
        }
    }

    /// Record a non-fatal capture failure
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(warning = %message, "Capture step failed");
        self.warnings.push(message);
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_slice(bytes: &[u8], origin: &Path) -> Result<Self, RecordError> {
        let record: RunRecord =
            serde_json::from_slice(bytes).map_err(|source| RecordError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        if record.schema_version > RUN_RECORD_SCHEMA_VERSION {
            return Err(RecordError::UnsupportedSchema {
                found: record.schema_version,
                supported: RUN_RECORD_SCHEMA_VERSION,
            });
        }
        Ok(record)
    }

    /// Write `run_record.json` into `snapshot_dir`
    pub fn write_to_dir(&self, snapshot_dir: &Path) -> Result<PathBuf, RecordError> {
        let path = snapshot_dir.join(RUN_RECORD_FILENAME);
        let json = self.to_json_pretty().map_err(|source| RecordError::Serialize {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Load from a record file or from a snapshot directory containing one
    pub fn read_from_path(path: &Path) -> Result<Self, RecordError> {
        let file = if path.is_dir() {
            let candidate = path.join(RUN_RECORD_FILENAME);
            if !candidate.is_file() {
                return Err(RecordError::NotFound(path.to_path_buf()));
            }
            candidate
        } else {
            path.to_path_buf()
        };
        let bytes = std::fs::read(&file)?;
        Self::from_json_slice(&bytes, &file)
    }

    /// Names of tools that were found
    pub fn available_tools(&self) -> impl Iterator<Item = (&String, &ToolRecord)> {
        self.tools
            .iter()
            .filter(|(_, t)| t.state == crate::util::tools::ToolState::Available)
    }
}
