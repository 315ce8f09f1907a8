//! Beacon CLI Configuration Management
//!
//! Configuration is layered, later sources winning:
//! - Defaults
//! - A TOML file (`--config`, else `~/.beacon/config.toml` when present)
//! - Environment variables (`BEACON_URL`, `BEACON_TOKEN`)
//! - Command line arguments

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use beacon_core::SessionOptions;

use crate::error::{CliError, Result};

pub const URL_ENV: &str = "BEACON_URL";
pub const TOKEN_ENV: &str = "BEACON_TOKEN";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the Beacon CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Options of the session the CLI opens
    pub session: SessionOptions,

    /// CLI-specific settings
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Enable verbose logging output
    pub verbose: bool,

    /// Probe the server host for reachability
    pub probe_network: bool,

    /// Interval between reachability probes (in seconds)
    pub probe_interval_secs: u64,

    /// How long `send` waits for the session to connect (in seconds)
    pub connect_timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            probe_network: false,
            probe_interval_secs: 10,
            connect_timeout_secs: 10,
        }
    }
}

impl CliConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load the configuration file, falling back to defaults
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            info!("Loading configuration from: {}", path);
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)
            }
            _ => {
                info!("Using default configuration");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// `~/.beacon/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".beacon").join("config.toml"))
    }

    /// Apply `BEACON_URL` and `BEACON_TOKEN` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(URL_ENV).filter(|v| !v.is_empty()) {
            debug!("Server address taken from {}", URL_ENV);
            self.session.url = url;
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            debug!("Credential taken from {}", TOKEN_ENV);
            self.session.auth_token = Some(token);
        }
    }

    /// Apply command line overrides
    pub fn apply_overrides(
        &mut self,
        url: Option<String>,
        token: Option<String>,
        probe_network: bool,
        verbose: bool,
    ) {
        if let Some(url) = url {
            self.session.url = url;
        }
        if let Some(token) = token {
            self.session.auth_token = Some(token);
        }
        self.cli.probe_network |= probe_network;
        self.cli.verbose |= verbose;
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.session.url.is_empty() {
            return Err(CliError::Config(format!(
                "No server address; set session.url, {} or --url",
                URL_ENV
            )));
        }
        self.session.validate()?;

        if self.cli.connect_timeout_secs == 0 {
            return Err(CliError::Config(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }
        if self.cli.probe_network && self.cli.probe_interval_secs == 0 {
            return Err(CliError::Config(
                "Probe interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// A filled-in configuration to start from
    pub fn example() -> Self {
        Self {
            session: SessionOptions::new("wss://example.com/ws").with_token("replace-me"),
            cli: CliConfig::default(),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [session]
            url = "wss://host/ws"
            auth_token = "t1"

            [session.reconnect]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.session.url, "wss://host/ws");
        assert_eq!(config.session.auth_token.as_deref(), Some("t1"));
        assert_eq!(config.session.reconnect.max_attempts, 3);
        assert_eq!(config.session.reconnect.initial_delay_ms, 1000);
        assert!(config.session.auto_reconnect);
        assert_eq!(config.cli, CliConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_then_flags_override_file() {
        let mut config = AppConfig::from_toml_str("[session]\nurl = \"wss://file/ws\"\n").unwrap();
        let env: HashMap<&str, &str> = [(URL_ENV, "wss://env/ws"), (TOKEN_ENV, "env-token")]
            .into_iter()
            .collect();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.session.url, "wss://env/ws");
        assert_eq!(config.session.auth_token.as_deref(), Some("env-token"));

        config.apply_overrides(None, Some("flag-token".to_string()), true, false);
        assert_eq!(config.session.url, "wss://env/ws");
        assert_eq!(config.session.auth_token.as_deref(), Some("flag-token"));
        assert!(config.cli.probe_network);
        assert!(!config.cli.verbose);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = AppConfig::example();
        config.apply_env_with(|_| Some(String::new()));
        assert_eq!(config.session.url, "wss://example.com/ws");
        assert_eq!(config.session.auth_token.as_deref(), Some("replace-me"));
    }

    #[test]
    fn test_validation_failures() {
        assert!(matches!(
            AppConfig::default().validate(),
            Err(CliError::Config(_))
        ));

        let mut config = AppConfig::example();
        config.session.url = "http://host/ws".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::example();
        config.cli.connect_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::example();
        config.session.reconnect.factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_survives_toml() {
        let example = AppConfig::example();
        let text = example.to_toml_string().unwrap();
        assert!(text.contains("[session]"));
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), example);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some("/nonexistent/beacon/config.toml"));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
