use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

fn about_message() -> String {
    format!(
        "Record the execution environment of MODFLOW / PEST++ workflows\nVersion: {}",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Parser, Debug, Clone)]
#[clap(name = "reprokit", about = about_message(), version)]
pub struct Cli {
    /// Data directory for config and logs (default: ~/.reprokit)
    #[clap(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Snapshot the current environment into the reproducibility directory
    Record(RecordArgs),

    /// Compare two snapshots (record file, snapshot directory or bundle)
    Diff {
        old: PathBuf,
        new: PathBuf,
    },

    /// Summarize a snapshot (record file, snapshot directory or bundle)
    Show {
        path: PathBuf,
        /// Print the raw run record as JSON
        #[clap(long)]
        json: bool,
    },

    /// Inspect or configure external tools
    Tools {
        #[clap(subcommand)]
        command: ToolsCommand,
    },

    /// Pack a snapshot directory into a zip bundle
    Bundle {
        snapshot_dir: PathBuf,
        /// Output file (default: <snapshot_dir>.repro.zip)
        #[clap(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Redact credentials from every text artifact
        #[clap(long)]
        shareable: bool,
    },

    /// Unpack a bundle's snapshot files into a directory
    Extract {
        bundle: PathBuf,
        out_dir: PathBuf,
        /// Replace the contents of a non-empty directory
        #[clap(long)]
        overwrite: bool,
    },

    /// Manage the user configuration file
    Config {
        #[clap(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RecordArgs {
    /// Working directory to record (default: current directory)
    #[clap(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Workflow step label; the snapshot goes into a subdirectory of that name
    #[clap(long, value_name = "NAME")]
    pub step: Option<String>,

    /// Snapshot directory name, relative to the working directory
    #[clap(long, value_name = "NAME")]
    pub out: Option<PathBuf>,

    /// Script extension to copy (repeatable, replaces the configured list)
    #[clap(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Keep build strings in the conda export
    #[clap(long)]
    pub include_builds: bool,

    #[clap(long)]
    pub no_git: bool,

    #[clap(long)]
    pub no_conda: bool,

    #[clap(long)]
    pub no_tools: bool,

    #[clap(long)]
    pub no_manifest: bool,

    /// Print the run record as JSON instead of a summary
    #[clap(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ToolsCommand {
    /// Show where each tool was found and its version
    List,

    /// Store an explicit path for a built-in tool in the user config
    Set { tool: String, path: PathBuf },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the user config file location
    Path,

    /// Write the example config file if none exists
    Init,
}
