//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! selects the API base URL, which app surface is running (coach or player),
//! and where the session credential is persisted.
//!
//! Configuration is stored at `~/.config/swinglens/config.json`. Every field
//! can be overridden through `SWINGLENS_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "swinglens";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL used when nothing is configured (local development backend)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

pub const ENV_API_BASE_URL: &str = "SWINGLENS_API_BASE_URL";
pub const ENV_APP: &str = "SWINGLENS_APP";
pub const ENV_STORAGE: &str = "SWINGLENS_STORAGE";
pub const ENV_STORE_PASSPHRASE: &str = "SWINGLENS_STORE_PASSPHRASE";
pub const ENV_EMAIL: &str = "SWINGLENS_EMAIL";

/// Which client surface is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    /// Coach dashboard: email + password login
    #[default]
    Coach,
    /// Player app: phone + one-time code login
    Player,
}

impl AppKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            AppKind::Coach => "Coach Dashboard",
            AppKind::Player => "Player",
        }
    }
}

impl FromStr for AppKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coach" => Ok(AppKind::Coach),
            "player" => Ok(AppKind::Player),
            other => Err(anyhow::anyhow!("Unknown app kind: {}", other)),
        }
    }
}

/// Durable medium backing the token store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Plain key-value JSON file in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Passphrase-encrypted file in the data directory
    Encrypted,
    /// Process memory only (nothing survives a restart)
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" => Ok(StorageKind::Keyring),
            "encrypted" => Ok(StorageKind::Encrypted),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!("Unknown storage kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub app: AppKind,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub last_email: Option<String>,
    #[serde(default)]
    pub last_phone: Option<String>,
}

impl Config {
    /// Load config from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific file. A missing file yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `SWINGLENS_*` overrides. Empty values are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(ENV_API_BASE_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(app) = var(ENV_APP) {
            self.app = app.parse()?;
        }
        if let Some(storage) = var(ENV_STORAGE) {
            self.storage = storage.parse()?;
        }
        if let Some(email) = var(ENV_EMAIL) {
            self.last_email = Some(email);
        }
        Ok(())
    }

    /// Effective API base URL without a trailing slash.
    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted token and logs.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
