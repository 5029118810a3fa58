//! Conda environment detection and export

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Set by `conda activate` for the active environment
const ENV_CONDA_DEFAULT_ENV: &str = "CONDA_DEFAULT_ENV";
const ENV_CONDA_PREFIX: &str = "CONDA_PREFIX";

#[derive(Error, Debug)]
pub enum CondaError {
    #[error("conda is not installed or not in PATH ({0})")]
    NotInstalled(PathBuf),
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("Could not determine current conda environment")]
    NoActiveEnvironment,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What a snapshot records about the exported environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondaSnapshot {
    pub env_name: String,
    /// Export file name, relative to the snapshot directory
    pub export_file: String,
    pub include_builds: bool,
}

/// The active conda environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondaEnv {
    command: PathBuf,
    pub name: String,
}

impl CondaEnv {
    /// Resolve the conda executable.
    ///
    /// A configured path wins. On Windows conda is a batch file living in the
    /// `Scripts` directory of the active prefix.
    pub fn conda_command(configured: Option<&Path>) -> PathBuf {
        if let Some(path) = configured {
            return path.to_path_buf();
        }

        if cfg!(windows) {
            if let Some(prefix) = std::env::var_os(ENV_CONDA_PREFIX) {
                let bat = PathBuf::from(prefix).join("Scripts").join("conda.bat");
                if bat.exists() {
                    return bat;
                }
            }
        }

        which::which("conda").unwrap_or_else(|_| PathBuf::from("conda"))
    }

    /// Find the active environment via `conda info --envs`.
    ///
    /// Falls back to `$CONDA_DEFAULT_ENV` when the listing marks no environment.
    pub fn detect(configured: Option<&Path>) -> Result<Self, CondaError> {
        let command = Self::conda_command(configured);
        let stdout = run(&command, &["info", "--envs"])?;

        let name = parse_active_env(&stdout)
            .or_else(|| {
                std::env::var(ENV_CONDA_DEFAULT_ENV)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .ok_or(CondaError::NoActiveEnvironment)?;

        tracing::debug!(env = %name, conda = %command.display(), "Detected conda environment");
        Ok(Self { command, name })
    }

    /// Arguments for `conda env export`
    pub fn export_args(&self, include_builds: bool) -> Vec<String> {
        let mut args = vec![
            "env".to_string(),
            "export".to_string(),
            "-n".to_string(),
            self.name.clone(),
        ];
        if !include_builds {
            args.push("--no-builds".to_string());
        }
        args
    }

    /// Export the environment to `conda_env_<env>_<timestamp>.yml` in `dest_dir`
    pub fn export(
        &self,
        dest_dir: &Path,
        include_builds: bool,
        timestamp: &str,
    ) -> Result<CondaSnapshot, CondaError> {
        let args = self.export_args(include_builds);
        tracing::info!(
            command = %format!("conda {}", args.join(" ")),
            "Exporting conda environment"
        );
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let yaml = run(&self.command, &arg_refs)?;

        let export_file = format!(
            "conda_env_{}_{}.yml",
            sanitize_file_component(&self.name),
            timestamp
        );
        std::fs::write(dest_dir.join(&export_file), yaml)?;

        Ok(CondaSnapshot {
            env_name: self.name.clone(),
            export_file,
            include_builds,
        })
    }
}

fn run(command: &Path, args: &[&str]) -> Result<String, CondaError> {
    let output = Command::new(command).args(args).output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CondaError::NotInstalled(command.to_path_buf()),
        _ => CondaError::Io(e),
    })?;

    if !output.status.success() {
        return Err(CondaError::CommandFailed {
            command: format!("conda {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Name of the environment marked active (`*`) in `conda info --envs` output.
///
/// Handles both `name * /path` and a bare `* /path` row.
pub fn parse_active_env(info_output: &str) -> Option<String> {
    info_output
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find(|line| line.contains('*'))
        .and_then(|line| {
            let mut tokens = line.split_whitespace();
            match tokens.next()? {
                "*" => tokens.next(),
                first => Some(first),
            }
        })
        .map(str::to_string)
}

/// Environment names may be prefixes (paths); keep only their last component.
fn sanitize_file_component(name: &str) -> String {
    let last = name
        .trim_end_matches(&['/', '\\'][..])
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(name);
    last.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
