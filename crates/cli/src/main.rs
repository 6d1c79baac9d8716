//! Taskboard CLI - command-line client for the Taskboard API

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Manage Taskboard tasks and projects from the terminal")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to ./taskboard.toml or ./config/taskboard.toml)
    #[arg(short = 'c', long, global = true, env = "TASKBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the saved session
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Timeout for the whole command in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into(), cli.json_logs)?;

    let settings = config::load(cli.config.as_deref(), cli.data_dir)?;
    debug!(base_url = %settings.client.base_url, state_dir = %settings.state_dir.display(), "configuration loaded");

    let outcome = if cli.timeout == 0 {
        Some(cli.command.execute(&settings).await)
    } else {
        let timeout_duration = Duration::from_secs(cli.timeout);
        tokio::time::timeout(timeout_duration, cli.command.execute(&settings))
            .await
            .ok()
    };

    match outcome {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => {
            error!("Command failed: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
        None => {
            error!("Command timed out after {} seconds", cli.timeout);
            eprintln!("error: timed out after {} seconds", cli.timeout);
            std::process::exit(1);
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
