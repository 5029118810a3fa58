//! Git capture module

mod commit;
mod status;

pub use commit::{project_name_from_remote, web_url_from_remote, GitCommitInfo, GitInfoError};
pub use status::{count_porcelain_entries, GitDiffStats};
