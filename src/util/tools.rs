//! Tool availability detection and version probing
//!
//! This module detects the external programs a modeling workflow depends on
//! (git, conda, python, MODFLOW 6, PEST++) and asks each of them for the
//! version string it reports about itself.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

/// Default upper bound for a single version probe
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// External tools that reprokit knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Git version control - REQUIRED to pin the workflow scripts to a commit
    Git,
    /// Conda package manager, used to export the Python environment
    Conda,
    /// Python interpreter running the workflow scripts
    Python,
    /// MODFLOW 6 groundwater flow model
    Modflow6,
    /// PEST++ iterative ensemble smoother
    PestppIes,
    /// PEST++ GLM (Gauss-Levenberg-Marquardt) estimator
    PestppGlm,
}

impl Tool {
    /// Get the binary name for this tool
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Git => "git",
            Tool::Conda => "conda",
            Tool::Python => "python",
            Tool::Modflow6 => "mf6",
            Tool::PestppIes => "pestpp-ies",
            Tool::PestppGlm => "pestpp-glm",
        }
    }

    /// Get the display name for this tool
    pub fn display_name(&self) -> &'static str {
        match self {
            Tool::Git => "Git",
            Tool::Conda => "Conda",
            Tool::Python => "Python",
            Tool::Modflow6 => "MODFLOW 6",
            Tool::PestppIes => "PEST++ IES",
            Tool::PestppGlm => "PEST++ GLM",
        }
    }

    /// Arguments that make the tool print its version and exit.
    ///
    /// PEST++ executables print a banner with the version when run bare.
    pub fn version_args(&self) -> &'static [&'static str] {
        match self {
            Tool::Git | Tool::Conda | Tool::Python => &["--version"],
            Tool::Modflow6 => &["-v"],
            Tool::PestppIes | Tool::PestppGlm => &[],
        }
    }

    /// Check if this tool is required (a missing one is reported as a warning)
    pub fn is_required(&self) -> bool {
        matches!(self, Tool::Git)
    }

    /// Look a tool up by its binary name
    pub fn from_binary_name(name: &str) -> Option<Tool> {
        Tool::all()
            .iter()
            .copied()
            .find(|tool| tool.binary_name() == name)
    }

    /// Get all tools
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Git,
            Tool::Conda,
            Tool::Python,
            Tool::Modflow6,
            Tool::PestppIes,
            Tool::PestppGlm,
        ]
    }
}

/// Status of a tool's availability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolStatus {
    /// Tool is available at the given path
    Available(PathBuf),
    /// Tool was not found in PATH or configured location
    #[default]
    NotFound,
    /// A path was configured in config.toml but it's invalid
    ConfiguredPathInvalid(PathBuf),
}

impl ToolStatus {
    /// Check if the tool is available
    pub fn is_available(&self) -> bool {
        matches!(self, ToolStatus::Available(_))
    }

    /// Get the path if available
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ToolStatus::Available(p) => Some(p),
            _ => None,
        }
    }
}

/// Configuration for tool paths from config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolPaths {
    pub git: Option<PathBuf>,
    pub conda: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub mf6: Option<PathBuf>,
    #[serde(rename = "pestpp-ies")]
    pub pestpp_ies: Option<PathBuf>,
    #[serde(rename = "pestpp-glm")]
    pub pestpp_glm: Option<PathBuf>,
}

impl ToolPaths {
    /// Get the configured path for a tool
    pub fn get(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::Git => self.git.as_ref(),
            Tool::Conda => self.conda.as_ref(),
            Tool::Python => self.python.as_ref(),
            Tool::Modflow6 => self.mf6.as_ref(),
            Tool::PestppIes => self.pestpp_ies.as_ref(),
            Tool::PestppGlm => self.pestpp_glm.as_ref(),
        }
    }

    /// Set the path for a tool
    pub fn set(&mut self, tool: Tool, path: PathBuf) {
        match tool {
            Tool::Git => self.git = Some(path),
            Tool::Conda => self.conda = Some(path),
            Tool::Python => self.python = Some(path),
            Tool::Modflow6 => self.mf6 = Some(path),
            Tool::PestppIes => self.pestpp_ies = Some(path),
            Tool::PestppGlm => self.pestpp_glm = Some(path),
        }
    }
}

/// A user-declared tool from `[[tools.extra]]`, e.g. an older MODFLOW build
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtraTool {
    pub name: String,
    /// Binary to look up in PATH when `path` is not set (defaults to `name`)
    pub binary: Option<String>,
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub version_args: Vec<String>,
}

/// Everything needed to locate and probe one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub binary: String,
    pub configured_path: Option<PathBuf>,
    pub version_args: Vec<String>,
    pub required: bool,
}

impl ToolSpec {
    pub fn builtin(tool: Tool, paths: &ToolPaths) -> Self {
        Self {
            name: tool.binary_name().to_string(),
            binary: tool.binary_name().to_string(),
            configured_path: paths.get(tool).cloned(),
            version_args: tool.version_args().iter().map(|a| a.to_string()).collect(),
            required: tool.is_required(),
        }
    }

    pub fn extra(extra: &ExtraTool) -> Self {
        Self {
            name: extra.name.clone(),
            binary: extra.binary.clone().unwrap_or_else(|| extra.name.clone()),
            configured_path: extra.path.clone(),
            version_args: extra.version_args.clone(),
            required: false,
        }
    }

    /// All built-in tools followed by the extra ones
    pub fn all(paths: &ToolPaths, extras: &[ExtraTool]) -> Vec<ToolSpec> {
        Tool::all()
            .iter()
            .map(|&tool| ToolSpec::builtin(tool, paths))
            .chain(extras.iter().map(ToolSpec::extra))
            .collect()
    }

    /// Resolve where the tool lives.
    ///
    /// 1. If a path is configured, validate it exists and is executable
    /// 2. Otherwise, use `which` to find the binary in PATH
    pub fn locate(&self) -> ToolStatus {
        if let Some(path) = &self.configured_path {
            if is_valid_executable(path) {
                return ToolStatus::Available(path.clone());
            } else {
                return ToolStatus::ConfiguredPathInvalid(path.clone());
            }
        }

        match which::which(&self.binary) {
            Ok(path) => ToolStatus::Available(path),
            Err(_) => ToolStatus::NotFound,
        }
    }
}

/// Check if a path points to a valid executable
pub fn is_valid_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    // On Unix, check if the file is executable
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = path.metadata() {
            let permissions = metadata.permissions();
            return permissions.mode() & 0o111 != 0;
        }
        false
    }

    // On Windows, just check if the file exists
    #[cfg(not(unix))]
    {
        true
    }
}

/// Recorded state of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    Available,
    NotFound,
    ConfiguredPathInvalid,
    /// Found, but running it for a version failed or timed out
    ProbeFailed,
}

/// What a snapshot records about one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub state: ToolState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of probing one tool
#[derive(Debug, Clone)]
pub struct ToolProbe {
    pub spec: ToolSpec,
    pub record: ToolRecord,
}

/// Locate and probe every tool concurrently
pub async fn probe_all(specs: Vec<ToolSpec>, timeout: Duration) -> Vec<ToolProbe> {
    join_all(specs.into_iter().map(|spec| probe(spec, timeout))).await
}

/// Locate a tool and ask it for its version
pub async fn probe(spec: ToolSpec, timeout: Duration) -> ToolProbe {
    let record = match spec.locate() {
        ToolStatus::NotFound => ToolRecord {
            state: ToolState::NotFound,
            path: None,
            version: None,
            error: None,
        },
        ToolStatus::ConfiguredPathInvalid(path) => ToolRecord {
            state: ToolState::ConfiguredPathInvalid,
            path: Some(path),
            version: None,
            error: None,
        },
        ToolStatus::Available(path) => {
            match run_version_command(&path, &spec.version_args, timeout).await {
                Ok(version) => ToolRecord {
                    state: ToolState::Available,
                    path: Some(path),
                    version,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(tool = %spec.name, error = %e, "Version probe failed");
                    ToolRecord {
                        state: ToolState::ProbeFailed,
                        path: Some(path),
                        version: None,
                        error: Some(e),
                    }
                }
            }
        }
    };

    ToolProbe { spec, record }
}

async fn run_version_command(
    path: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<Option<String>, String> {
    let child = tokio::process::Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(format!("failed to run {}: {}", path.display(), e)),
        Err(_) => return Err(format!("timed out after {}s", timeout.as_secs())),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(extract_version(&stdout, &stderr))
}

/// Pick the version line out of a tool's output.
///
/// Prefers stdout, falls back to stderr. Within a stream, the first line
/// containing a digit wins, otherwise the first non-empty line.
pub fn extract_version(stdout: &str, stderr: &str) -> Option<String> {
    pick_version_line(stdout).or_else(|| pick_version_line(stderr))
}

fn pick_version_line(output: &str) -> Option<String> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.clone().next()?;
    let line = lines
        .find(|l| l.chars().any(|c| c.is_ascii_digit()))
        .unwrap_or(first);
    Some(line.to_string())
}
