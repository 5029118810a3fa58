//! Command line interface

pub mod commands;
pub mod handlers;

pub use commands::{Cli, Command};
pub use handlers::{load_record, run};
