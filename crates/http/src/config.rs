//! Client configuration

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_SIGN_IN_PATH: &str = "/auth";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Environment variable prefix, e.g. `TASKBOARD__BASE_URL`
const ENV_PREFIX: &str = "TASKBOARD";

/// Taskboard client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Prefix for relative API paths
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Where the user is sent when the session cannot be refreshed
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    /// Token refresh endpoint
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Request timeout in seconds; transport default when unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Directory holding the persisted session
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_sign_in_path() -> String {
    DEFAULT_SIGN_IN_PATH.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

pub fn default_user_agent() -> String {
    format!("taskboard-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sign_in_path: default_sign_in_path(),
            refresh_path: default_refresh_path(),
            timeout_secs: None,
            user_agent: default_user_agent(),
            state_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment and files in common locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let config_paths = ["taskboard.toml", "config/taskboard.toml"];
        for path in &config_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific config file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path.as_ref()))
            // Environment variables override file settings
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.sign_in_path, "/auth");
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert!(config.timeout().is_none());
        assert!(config.user_agent.starts_with("taskboard-client/"));
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let path = tmp.path().join("taskboard.toml");
        std::fs::write(
            &path,
            "base_url = \"https://api.example.com\"\ntimeout_secs = 15\n",
        )
        .unwrap();

        let config = ClientConfig::load_from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.sign_in_path, "/auth");
    }

    #[test]
    fn zero_timeout_means_transport_default() {
        let config = ClientConfig {
            timeout_secs: Some(0),
            ..ClientConfig::default()
        };
        assert!(config.timeout().is_none());
    }
}
