//! `autograph.toml` loading and environment overrides

use std::path::{Path, PathBuf};

use anyhow::Context;
use autograph_core::{StyleClassifier, VersionDiffEngine};
use autograph_server::ServerConfig;
use autograph_sync::{RemoteConfig, SyncPolicy};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "autograph.toml";

const ENV_REMOTE_URL: &str = "AUTOGRAPH_REMOTE_URL";
const ENV_TOKEN: &str = "AUTOGRAPH_TOKEN";
const ENV_DATA_DIR: &str = "AUTOGRAPH_DATA_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Offline store directory; relative paths resolve against the root
    pub data_dir: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub sync: SyncPolicy,
    pub diff: DiffSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSection {
    /// Style keys counted as color changes. Unset means the built-in table.
    pub color_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
        }
    }
}

impl Config {
    /// Read the config file, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Config file plus `.env` and process environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_file.display());
        }
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_REMOTE_URL) {
            self.remote.base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.remote.token = Some(token);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn data_dir(&self, root: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => autograph_core::data_dir(root),
        }
    }

    pub fn engine(&self) -> VersionDiffEngine {
        let classifier = match &self.diff.color_keys {
            Some(keys) => StyleClassifier::new(keys),
            None => StyleClassifier::default(),
        };
        VersionDiffEngine::new(classifier)
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
        }
    }
}
