//! Shared test utilities for reprokit
//!
//! - Git repository fixtures
//! - Offline recorder options

pub mod git_fixtures;

use std::path::Path;

use reprokit::RecordOptions;

/// Recorder options that never touch conda or probe external tools
#[allow(dead_code)]
pub fn offline_options(dir: &Path) -> RecordOptions {
    RecordOptions {
        capture_conda: false,
        probe_tools: false,
        ..RecordOptions::new(dir)
    }
}
