//! CLI configuration utilities

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use taskboard_http::ClientConfig;

/// File holding the persisted session inside the state directory
pub const SESSION_FILE: &str = "session.json";

/// Resolved settings for one CLI invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub state_dir: PathBuf,
}

impl Settings {
    pub fn session_file(&self) -> PathBuf {
        self.state_dir.join(SESSION_FILE)
    }
}

/// Load client configuration and pick the state directory.
///
/// The state directory is taken from `data_dir`, then the configuration,
/// then the platform data directory.
pub fn load(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Settings> {
    let client = match config_path {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ClientConfig::load().context("failed to load configuration")?,
    };

    let state_dir = data_dir
        .or_else(|| client.state_dir.clone())
        .unwrap_or_else(default_state_dir);

    Ok(Settings { client, state_dir })
}

fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
}
