//! Hook configuration loaded from a TOML file
//!
//! Handles:
//! - Proxmox credentials (password never printed)
//! - Governor names for the started and stopped states
//! - API endpoint and TLS verification
//! - Config path resolution (flag > env var > fixed path)

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Fixed location Proxmox hookscripts read their settings from
pub const DEFAULT_CONFIG_PATH: &str = "/etc/proxmox-hook-cpu-affinity-hook.toml";

/// Environment override for the config location
pub const CONFIG_ENV_VAR: &str = "GOVERNOR_HOOK_CONFIG";

/// Governors shipped by the Linux cpufreq subsystem
pub const KNOWN_GOVERNORS: &[&str] = &[
    "performance",
    "powersave",
    "userspace",
    "ondemand",
    "conservative",
    "schedutil",
];

/// Name of a cpufreq governor as written to `scaling_governor`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Governor(String);

impl Governor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        KNOWN_GOVERNORS.contains(&self.0.as_str())
    }
}

impl fmt::Display for Governor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(alias = "username")]
    pub user: String,
    pub password: String,
    #[serde(default = "default_started_state")]
    pub started_state: Governor,
    #[serde(default = "default_stopped_state")]
    pub stopped_state: Governor,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub verify_tls: bool,
    /// Full API base URL, replaces `https://{hostname}:{port}/api2/json`
    #[serde(default)]
    pub api_url: Option<String>,
}

fn default_started_state() -> Governor {
    Governor::new("performance")
}

fn default_stopped_state() -> Governor {
    Governor::new("schedutil")
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8006
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("started_state", &self.started_state)
            .field("stopped_state", &self.stopped_state)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("verify_tls", &self.verify_tls)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Config {
    /// Load and validate the config at `path`
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.started_state = Governor::new(config.started_state.0);
        config.stopped_state = Governor::new(config.stopped_state.0);
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, governor) in [
            ("started_state", &self.started_state),
            ("stopped_state", &self.stopped_state),
        ] {
            if governor.as_str().is_empty() {
                return Err(ConfigError::InvalidGovernor { field });
            }
            if !governor.is_known() {
                warn!(
                    "{} = `{}` is not a standard governor, the kernel may reject it",
                    field, governor
                );
            }
        }

        if !self.verify_tls && !self.is_local() {
            warn!(
                "TLS verification disabled for non-local host {}, set verify_tls = true",
                self.hostname
            );
        }

        Ok(())
    }

    /// Base URL of the Proxmox JSON API
    pub fn api_base_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}/api2/json", self.hostname, self.port),
        }
    }

    fn is_local(&self) -> bool {
        matches!(self.hostname.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// Resolve the config path from the CLI flag, the environment or the default
    pub fn resolve_path(flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}
