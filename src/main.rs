use std::fs::{self, OpenOptions};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use reprokit::cli::{self, Cli};
use reprokit::util;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) -> Result<()> {
    // Log to file (~/.reprokit/logs/reprokit.log); stdout is for command output
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    util::init_data_dir(cli.data_dir.clone());

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
