pub mod cli;
pub mod config;
pub mod env;
pub mod git;
pub mod repro;
pub mod util;

pub use config::Config;
pub use env::{CondaEnv, CondaError, HostInfo};
pub use git::{GitCommitInfo, GitInfoError};
pub use repro::{
    RecordComparison, RecordError, RecordOptions, RecordOutcome, Recorder, ReproBundle,
    ReproExportMode, RunRecord, ScrubConfig,
};
pub use util::{Tool, ToolPaths, ToolRecord, ToolState};
