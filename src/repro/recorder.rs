//! One environment snapshot: scripts, git, conda, tools and file hashes
//! written next to the workflow before a model run.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

use crate::config::{Config, DEFAULT_OUTPUT_DIR};
use crate::env::{CondaEnv, HostInfo};
use crate::git::GitCommitInfo;
use crate::repro::manifest::{FileManifest, ManifestOptions};
use crate::repro::record::RunRecord;
use crate::repro::scripts::{save_files_rootdir, DEFAULT_SCRIPT_EXTENSIONS};
use crate::util::tools::{
    probe_all, ExtraTool, ToolPaths, ToolSpec, ToolState, DEFAULT_PROBE_TIMEOUT_SECS,
};

/// Timestamp format used in artifact file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StepNameError {
    #[error("step name is empty")]
    Empty,
    #[error("step name {0:?} contains a path separator")]
    Separator(String),
    #[error("step name {0:?} is reserved")]
    Reserved(String),
}

/// A step label becomes a directory name, so it must be one plain component
pub fn validate_step(name: &str) -> Result<(), StepNameError> {
    if name.trim().is_empty() {
        return Err(StepNameError::Empty);
    }
    if name.contains(&['/', '\\'][..]) {
        return Err(StepNameError::Separator(name.to_string()));
    }
    if name == "." || name == ".." {
        return Err(StepNameError::Reserved(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub working_dir: PathBuf,
    pub step: Option<String>,
    /// Snapshot root, relative to `working_dir` unless absolute
    pub output_dir: PathBuf,
    /// Script extensions to copy; empty disables script capture
    pub extensions: Vec<String>,
    pub include_builds: bool,
    pub capture_git: bool,
    pub capture_conda: bool,
    pub probe_tools: bool,
    pub build_manifest: bool,
    pub tool_paths: ToolPaths,
    pub extra_tools: Vec<ExtraTool>,
    pub probe_timeout: Duration,
    pub manifest: ManifestOptions,
}

impl RecordOptions {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            step: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            extensions: DEFAULT_SCRIPT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            include_builds: false,
            capture_git: true,
            capture_conda: true,
            probe_tools: true,
            build_manifest: true,
            tool_paths: ToolPaths::default(),
            extra_tools: Vec::new(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            manifest: ManifestOptions::default(),
        }
    }

    pub fn from_config(config: &Config, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            step: None,
            output_dir: PathBuf::from(&config.snapshot.output_dir),
            extensions: config.snapshot.extensions.clone(),
            include_builds: config.snapshot.include_builds,
            capture_git: config.snapshot.git,
            capture_conda: config.snapshot.conda,
            probe_tools: config.snapshot.tools,
            build_manifest: config.snapshot.manifest,
            tool_paths: config.tool_paths.clone(),
            extra_tools: config.extra_tools.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            manifest: config.manifest_options(),
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub snapshot_dir: PathBuf,
    pub record_path: PathBuf,
    pub record: RunRecord,
}

pub struct Recorder {
    options: RecordOptions,
}

impl Recorder {
    pub fn new(options: RecordOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RecordOptions {
        &self.options
    }

    /// For callers without a tokio runtime of their own
    pub fn record_blocking(&self) -> anyhow::Result<RecordOutcome> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        runtime.block_on(self.record())
    }

    /// Take the snapshot.
    ///
    /// Capture failures end up in `RunRecord::warnings`; only an unusable
    /// output location or an unwritable record is an error.
    pub async fn record(&self) -> anyhow::Result<RecordOutcome> {
        let opts = &self.options;

        if let Some(step) = &opts.step {
            validate_step(step)?;
        }

        let working_dir = std::fs::canonicalize(&opts.working_dir).with_context(|| {
            format!("Working directory not found: {}", opts.working_dir.display())
        })?;
        let output_root = resolve_output_root(&working_dir, &opts.output_dir)?;
        let snapshot_dir = match &opts.step {
            Some(step) => output_root.join(step),
            None => output_root.clone(),
        };

        prepare_snapshot_dir(&snapshot_dir)?;
        tracing::info!(
            working_dir = %working_dir.display(),
            snapshot_dir = %snapshot_dir.display(),
            step = opts.step.as_deref().unwrap_or("-"),
            "Recording environment snapshot"
        );

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut record =
            RunRecord::new(working_dir.clone(), opts.step.clone(), HostInfo::capture());

        // Read git state before any artifact lands in the working tree.
        // Earlier steps' snapshots under the output root are not changes.
        let git = opts
            .capture_git
            .then(|| GitCommitInfo::capture_excluding(&working_dir, Some(&output_root)));

        if !opts.extensions.is_empty() {
            match save_files_rootdir(&working_dir, &snapshot_dir, &opts.extensions, &timestamp) {
                Ok(scripts) => record.scripts = scripts,
                Err(e) => record.warn(format!("scripts: {}", e)),
            }
        }

        if let Some(git) = git {
            match git {
                Ok(info) => {
                    if let Err(e) = info.write_text_file(&snapshot_dir, &timestamp) {
                        record.warn(format!("git: failed to write commit file: {}", e));
                    }
                    record.git = Some(info);
                }
                Err(e) => record.warn(format!("git: {}", e)),
            }
        }

        if opts.capture_conda {
            let conda = CondaEnv::detect(opts.tool_paths.conda.as_deref())
                .and_then(|env| env.export(&snapshot_dir, opts.include_builds, &timestamp));
            match conda {
                Ok(snapshot) => record.conda = Some(snapshot),
                Err(e) => record.warn(format!("conda: {}", e)),
            }
        }

        if opts.probe_tools {
            let specs = ToolSpec::all(&opts.tool_paths, &opts.extra_tools);
            for probe in probe_all(specs, opts.probe_timeout).await {
                if probe.spec.required && probe.record.state != ToolState::Available {
                    record.warn(format!(
                        "tools: required tool {} is not available ({:?})",
                        probe.spec.name, probe.record.state
                    ));
                }
                record.tools.insert(probe.spec.name, probe.record);
            }
        }

        if opts.build_manifest {
            let mut manifest_opts = opts.manifest.clone();
            manifest_opts.exclude.push(output_root.clone());
            match FileManifest::build(&working_dir, &manifest_opts) {
                Ok(scan) => {
                    for skipped in &scan.skipped {
                        record.warn(format!("manifest: skipped {}", skipped));
                    }
                    tracing::info!(
                        files = scan.manifest.len(),
                        bytes = scan.manifest.total_bytes(),
                        "Built file manifest"
                    );
                    record.manifest = scan.manifest;
                }
                Err(e) => record.warn(format!("manifest: {}", e)),
            }
        }

        let record_path = record
            .write_to_dir(&snapshot_dir)
            .with_context(|| format!("Failed to write run record to {}", snapshot_dir.display()))?;

        tracing::info!(
            record = %record_path.display(),
            warnings = record.warnings.len(),
            "Snapshot complete"
        );

        Ok(RecordOutcome {
            snapshot_dir,
            record_path,
            record,
        })
    }
}

/// Absolute snapshot root; refuses roots that would swallow the working dir
fn resolve_output_root(working_dir: &Path, output_dir: &Path) -> anyhow::Result<PathBuf> {
    let root = normalize_lexically(&working_dir.join(output_dir));
    if working_dir.starts_with(&root) {
        anyhow::bail!(
            "Output directory {} must not be or contain the working directory {}",
            root.display(),
            working_dir.display()
        );
    }
    Ok(root)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Start from an empty snapshot directory
fn prepare_snapshot_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        tracing::debug!(dir = %dir.display(), "Removing previous snapshot");
        std::fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to clear {}", dir.display()))?;
    }
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repro::record::RUN_RECORD_FILENAME;
    use tempfile::tempdir;

    fn offline_options(dir: &Path) -> RecordOptions {
        RecordOptions {
            capture_git: false,
            capture_conda: false,
            probe_tools: false,
            ..RecordOptions::new(dir)
        }
    }

    #[test]
    fn step_names() {
        assert_eq!(validate_step("pst_setup"), Ok(()));
        assert_eq!(validate_step(" "), Err(StepNameError::Empty));
        assert!(matches!(validate_step("a/b"), Err(StepNameError::Separator(_))));
        assert!(matches!(validate_step("a\\b"), Err(StepNameError::Separator(_))));
        assert!(matches!(validate_step(".."), Err(StepNameError::Reserved(_))));
    }

    #[test]
    fn output_root_must_not_contain_working_dir() {
        let work = Path::new("/data/freyberg");
        assert_eq!(
            resolve_output_root(work, Path::new("reproducibility")).unwrap(),
            PathBuf::from("/data/freyberg/reproducibility")
        );
        assert!(resolve_output_root(work, Path::new(".")).is_err());
        assert!(resolve_output_root(work, Path::new("..")).is_err());
        assert!(resolve_output_root(work, Path::new("/data")).is_err());
        assert_eq!(
            resolve_output_root(work, Path::new("../logs")).unwrap(),
            PathBuf::from("/data/logs")
        );
    }

    #[tokio::test]
    async fn records_scripts_and_manifest() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("pst_setup.py"), "import pyemu\n").unwrap();
        std::fs::write(dir.path().join("freyberg.pst"), "pcf\n").unwrap();

        let outcome = Recorder::new(offline_options(dir.path())).record().await.unwrap();

        assert!(outcome.record_path.ends_with(RUN_RECORD_FILENAME));
        assert_eq!(outcome.record.scripts.len(), 1);
        assert!(outcome.record.scripts[0].starts_with("pst_setup.py_"));
        assert!(outcome.snapshot_dir.join(&outcome.record.scripts[0]).exists());

        let keys: Vec<&String> = outcome.record.manifest.files.keys().collect();
        assert_eq!(keys, vec!["freyberg.pst", "pst_setup.py"]);
        assert!(outcome.record.warnings.is_empty());
    }

    #[tokio::test]
    async fn rerun_clears_previous_artifacts() {
        let dir = tempdir().unwrap();
        let recorder = Recorder::new(offline_options(dir.path()).with_step("deploy_pestpp"));

        let first = recorder.record().await.unwrap();
        let stale = first.snapshot_dir.join("stale.txt");
        std::fs::write(&stale, "old").unwrap();

        let second = recorder.record().await.unwrap();
        assert_eq!(first.snapshot_dir, second.snapshot_dir);
        assert!(second.snapshot_dir.ends_with(Path::new("reproducibility").join("deploy_pestpp")));
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn step_run_keeps_sibling_steps() {
        let dir = tempdir().unwrap();
        let prep = Recorder::new(offline_options(dir.path()).with_step("prep_deps"))
            .record()
            .await
            .unwrap();
        Recorder::new(offline_options(dir.path()).with_step("pst_setup"))
            .record()
            .await
            .unwrap();
        assert!(prep.record_path.exists());
    }

    #[tokio::test]
    async fn git_failure_becomes_warning() {
        let dir = tempdir().unwrap();
        let options = RecordOptions {
            capture_git: true,
            ..offline_options(dir.path())
        };
        let outcome = Recorder::new(options).record().await.unwrap();
        assert!(outcome.record.git.is_none());
        assert_eq!(outcome.record.warnings.len(), 1);
        assert!(outcome.record.warnings[0].starts_with("git: "));
    }

    #[tokio::test]
    async fn invalid_step_is_fatal() {
        let dir = tempdir().unwrap();
        let result = Recorder::new(offline_options(dir.path()).with_step("../escape"))
            .record()
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("reproducibility").exists());
    }

    #[test]
    fn record_blocking_without_runtime() {
        let dir = tempdir().unwrap();
        let outcome = Recorder::new(offline_options(dir.path())).record_blocking().unwrap();
        assert!(outcome.record_path.exists());
    }
}
