// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading the agent config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no home directory; set agent.state_dir explicitly")]
    NoHome,
}

/// Agent configuration, TOML on disk
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentSection,
    pub collector: CollectorSection,
    pub manifests: ManifestSection,
    #[serde(default)]
    pub intervals: IntervalsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentSection {
    /// Display name the collector files this endpoint under; defaults to the
    /// hostname
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Defaults to `~/.cormorant`
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Installed location of the run helper every wrapped entry invokes
    #[serde(default)]
    pub helper_path: Option<PathBuf>,
    /// Log to this file instead of stdout
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSection {
    pub url: String,
    /// Required only for first enrollment; the endpoint token is persisted
    /// afterwards
    #[serde(default)]
    pub enrollment_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestSection {
    /// Directory the version-control sync keeps the job manifests in
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalsSection {
    #[serde(default = "default_reconcile", with = "humantime_serde")]
    pub reconcile: Duration,
    #[serde(default = "default_heartbeat", with = "humantime_serde")]
    pub heartbeat: Duration,
    #[serde(default = "default_discovery", with = "humantime_serde")]
    pub discovery: Duration,
}

fn default_reconcile() -> Duration {
    Duration::from_secs(30)
}

fn default_heartbeat() -> Duration {
    Duration::from_secs(30)
}

fn default_discovery() -> Duration {
    Duration::from_secs(300)
}

impl Default for IntervalsSection {
    fn default() -> Self {
        Self {
            reconcile: default_reconcile(),
            heartbeat: default_heartbeat(),
            discovery: default_discovery(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.agent.state_dir {
            return Ok(dir.clone());
        }
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home).join(".cormorant"))
    }

    pub fn hostname(&self) -> String {
        if let Some(hostname) = &self.agent.hostname {
            return hostname.clone();
        }
        std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn agent_name(&self) -> String {
        self.agent.name.clone().unwrap_or_else(|| self.hostname())
    }

    pub fn helper_path(&self) -> PathBuf {
        if let Some(path) = &self.agent.helper_path {
            return path.clone();
        }
        if cfg!(windows) {
            PathBuf::from("C:\\Program Files\\Cormorant\\cormorant-run.exe")
        } else {
            PathBuf::from("/usr/local/libexec/cormorant-run")
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
