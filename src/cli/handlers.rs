use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::cli::commands::{Cli, Command, ConfigCommand, RecordArgs, ToolsCommand};
use crate::config::{save_tool_path, Config};
use crate::repro::bundle::{ReproBundle, ReproExportMode, BUNDLE_EXTENSION};
use crate::repro::compare::RecordComparison;
use crate::repro::record::RunRecord;
use crate::repro::recorder::{RecordOptions, Recorder};
use crate::repro::scrub::ScrubConfig;
use crate::util::paths::config_path;
use crate::util::tools::{is_valid_executable, probe_all, Tool, ToolSpec, ToolState};

/// Run a parsed command line.
///
/// `diff` exits with 1 when the snapshots differ.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Record(args) => record(args).await,
        Command::Diff { old, new } => diff(&old, &new),
        Command::Show { path, json } => show(&path, json),
        Command::Tools { command } => match command {
            ToolsCommand::List => tools_list().await,
            ToolsCommand::Set { tool, path } => tools_set(&tool, &path),
        },
        Command::Bundle {
            snapshot_dir,
            output,
            shareable,
        } => bundle(&snapshot_dir, output, shareable),
        Command::Extract {
            bundle,
            out_dir,
            overwrite,
        } => {
            let meta = ReproBundle::extract_to(&bundle, &out_dir, overwrite)?;
            println!(
                "Extracted {} bundle ({}) to {}",
                match meta.export_mode {
                    ReproExportMode::Local => "local",
                    ReproExportMode::Shareable => "shareable",
                },
                meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                out_dir.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { command } => match command {
            ConfigCommand::Path => {
                println!("{}", config_path().display());
                Ok(ExitCode::SUCCESS)
            }
            ConfigCommand::Init => {
                let path = config_path();
                if Config::init_config_file(&path)? {
                    println!("Created {}", path.display());
                } else {
                    println!("Config already exists at {}", path.display());
                }
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to read the current directory")
}

/// Apply command line flags over the configured options
pub fn record_options(config: &Config, working_dir: PathBuf, args: &RecordArgs) -> RecordOptions {
    let mut options = RecordOptions::from_config(config, working_dir);
    options.step = args.step.clone();
    if let Some(out) = &args.out {
        options.output_dir = out.clone();
    }
    if !args.extensions.is_empty() {
        options.extensions = args.extensions.clone();
    }
    options.include_builds |= args.include_builds;
    options.capture_git &= !args.no_git;
    options.capture_conda &= !args.no_conda;
    options.probe_tools &= !args.no_tools;
    options.build_manifest &= !args.no_manifest;
    options
}

async fn record(args: RecordArgs) -> Result<ExitCode> {
    let working_dir = match &args.dir {
        Some(dir) => dir.clone(),
        None => current_dir()?,
    };
    let config = Config::load(&working_dir);
    let options = record_options(&config, working_dir, &args);

    let outcome = Recorder::new(options).record().await?;

    if args.json {
        println!("{}", String::from_utf8(outcome.record.to_json_pretty()?)?);
    } else {
        println!("Snapshot written to {}", outcome.snapshot_dir.display());
        print!("{}", render_summary(&outcome.record));
    }
    Ok(ExitCode::SUCCESS)
}

/// Load a run record from a record file, a snapshot directory or a bundle
pub fn load_record(path: &Path) -> Result<RunRecord> {
    let is_bundle = path.is_file()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

    if is_bundle {
        let opened = ReproBundle::open(path)
            .with_context(|| format!("Failed to open bundle {}", path.display()))?;
        match opened.record {
            Some(record) => Ok(record),
            None => bail!("Bundle {} contains no run record", path.display()),
        }
    } else {
        RunRecord::read_from_path(path)
            .with_context(|| format!("Failed to load run record from {}", path.display()))
    }
}

fn diff(old: &Path, new: &Path) -> Result<ExitCode> {
    let old = load_record(old)?;
    let new = load_record(new)?;
    let comparison = RecordComparison::between(&old, &new);
    print!("{}", comparison);
    if comparison.is_identical() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn show(path: &Path, json: bool) -> Result<ExitCode> {
    let record = load_record(path)?;
    if json {
        println!("{}", String::from_utf8(record.to_json_pretty()?)?);
    } else {
        print!("{}", render_summary(&record));
    }
    Ok(ExitCode::SUCCESS)
}

/// Human-readable summary of a record
pub fn render_summary(record: &RunRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Recorded: {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(step) = &record.step {
        let _ = writeln!(out, "Step: {}", step);
    }
    let _ = writeln!(out, "Working dir: {}", record.working_dir.display());
    let _ = writeln!(out, "Host: {}", record.host.summary());

    match &record.git {
        Some(git) => {
            let _ = writeln!(
                out,
                "Git: {} @ {} ({}){}",
                git.project_name,
                git.short_hash(),
                git.branch,
                if git.dirty { ", uncommitted changes" } else { "" }
            );
        }
        None => {
            let _ = writeln!(out, "Git: not recorded");
        }
    }

    match &record.conda {
        Some(conda) => {
            let _ = writeln!(out, "Conda: {} -> {}", conda.env_name, conda.export_file);
        }
        None => {
            let _ = writeln!(out, "Conda: not recorded");
        }
    }

    if !record.tools.is_empty() {
        let _ = writeln!(out, "Tools:");
        for (name, tool) in &record.tools {
            let detail = match tool.state {
                ToolState::Available => tool
                    .version
                    .clone()
                    .unwrap_or_else(|| "unknown version".to_string()),
                ToolState::NotFound => "not found".to_string(),
                ToolState::ConfiguredPathInvalid => "configured path invalid".to_string(),
                ToolState::ProbeFailed => format!(
                    "probe failed: {}",
                    tool.error.as_deref().unwrap_or("unknown error")
                ),
            };
            let _ = writeln!(out, "  {:<12} {}", name, detail);
        }
    }

    let _ = writeln!(out, "Scripts: {}", record.scripts.len());
    let _ = writeln!(
        out,
        "Files: {} ({} bytes)",
        record.manifest.len(),
        record.manifest.total_bytes()
    );

    if !record.warnings.is_empty() {
        let _ = writeln!(out, "Warnings:");
        for warning in &record.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }
    out
}

async fn tools_list() -> Result<ExitCode> {
    let config = Config::load(&current_dir()?);
    let specs = ToolSpec::all(&config.tool_paths, &config.extra_tools);
    let probes = probe_all(specs, Duration::from_secs(config.probe_timeout_secs)).await;

    for probe in probes {
        let record = &probe.record;
        let location = record
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = match record.state {
            ToolState::Available => record
                .version
                .clone()
                .unwrap_or_else(|| "available".to_string()),
            ToolState::NotFound if probe.spec.required => "NOT FOUND (required)".to_string(),
            ToolState::NotFound => "not found".to_string(),
            ToolState::ConfiguredPathInvalid => "configured path invalid".to_string(),
            ToolState::ProbeFailed => format!(
                "probe failed: {}",
                record.error.as_deref().unwrap_or("unknown error")
            ),
        };
        println!("{:<12} {:<40} {}", probe.spec.name, location, status);
    }
    Ok(ExitCode::SUCCESS)
}

fn tools_set(tool: &str, path: &Path) -> Result<ExitCode> {
    let Some(tool) = Tool::from_binary_name(tool) else {
        let known: Vec<&str> = Tool::all().iter().map(|t| t.binary_name()).collect();
        bail!("Unknown tool '{}' (known: {})", tool, known.join(", "));
    };
    if !is_valid_executable(path) {
        bail!("{} is not an executable file", path.display());
    }
    save_tool_path(tool, path)
        .with_context(|| format!("Failed to update {}", config_path().display()))?;
    println!("{} path set to {}", tool.display_name(), path.display());
    Ok(ExitCode::SUCCESS)
}

/// `<dir>.repro.zip` next to the snapshot directory
pub fn default_bundle_path(snapshot_dir: &Path) -> PathBuf {
    // `.` and `..` have no file name of their own
    let snapshot_dir =
        std::fs::canonicalize(snapshot_dir).unwrap_or_else(|_| snapshot_dir.to_path_buf());
    let name = snapshot_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".to_string());
    let file = format!("{}.{}", name, BUNDLE_EXTENSION);
    match snapshot_dir.parent() {
        Some(parent) => parent.join(file),
        None => PathBuf::from(file),
    }
}

fn bundle(snapshot_dir: &Path, output: Option<PathBuf>, shareable: bool) -> Result<ExitCode> {
    let config = Config::load(&current_dir()?);
    let out = output.unwrap_or_else(|| default_bundle_path(snapshot_dir));
    let mode = if shareable {
        ReproExportMode::Shareable
    } else {
        ReproExportMode::Local
    };
    let scrub = ScrubConfig::with_extra_patterns(&config.scrub_patterns);

    ReproBundle::create(snapshot_dir, &out, mode, &scrub)
        .with_context(|| format!("Failed to bundle {}", snapshot_dir.display()))?;
    println!("Bundle written to {}", out.display());
    Ok(ExitCode::SUCCESS)
}
