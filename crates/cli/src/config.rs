// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! User configuration.
//!
//! Configuration is stored in `<config dir>/config.toml` and includes:
//! - `[user]`: the identity used for commits (git's `user.name`/`user.email`
//!   when absent)
//! - `[sync]`: timer overrides for every folder
//! - `[[folder]]`: one entry per synced folder

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use drift_core::{Identifier, StorageType, User};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendKind, ExternalCommands};
use crate::env;
use crate::error::{Error, Result};
use crate::listener::ListenerConfig;
use crate::repository::{FolderStore, Timing};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOG_FILE_NAME: &str = "drift.log";
pub const LOCK_FILE_NAME: &str = "drift.lock";
const APP_DIR_NAME: &str = "drift";
const DEFAULT_FOLDER_ROOT: &str = "Drift";

/// Resolves the configuration directory.
///
/// Uses `DRIFT_CONFIG_DIR`, then `$XDG_CONFIG_HOME/drift`, then the
/// platform config directory.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = env::config_dir() {
        return dir;
    }
    if let Some(xdg) = env::xdg_config_home() {
        return xdg.join(APP_DIR_NAME);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

/// Resolves the directory for logs and the instance lock.
///
/// Uses `DRIFT_STATE_DIR`, then `$XDG_STATE_HOME/drift`, then
/// `~/.local/state/drift`.
pub fn state_dir() -> PathBuf {
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(xdg) = env::xdg_state_home() {
        return xdg.join(APP_DIR_NAME);
    }
    dirs::home_dir()
        .map(|h| h.join(".local").join("state").join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

/// Parent directory for folders added without `--path`.
pub fn default_folder_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_FOLDER_ROOT)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Timer overrides shared by every folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_poll_short_secs")]
    pub poll_short_secs: u64,
    #[serde(default = "default_poll_long_secs")]
    pub poll_long_secs: u64,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
    #[serde(default = "default_settle_samples")]
    pub settle_samples: usize,
    /// Listener ping interval.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Listener retry interval while disconnected.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

fn default_poll_short_secs() -> u64 {
    300
}

fn default_poll_long_secs() -> u64 {
    900
}

fn default_tick_secs() -> u64 {
    5
}

fn default_settle_interval_ms() -> u64 {
    500
}

fn default_settle_samples() -> usize {
    4
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_reconnect_secs() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            poll_short_secs: default_poll_short_secs(),
            poll_long_secs: default_poll_long_secs(),
            tick_secs: default_tick_secs(),
            settle_interval_ms: default_settle_interval_ms(),
            settle_samples: default_settle_samples(),
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

impl SyncSettings {
    pub fn timing(&self) -> Timing {
        Timing {
            poll_short: Duration::from_secs(self.poll_short_secs),
            poll_long: Duration::from_secs(self.poll_long_secs.max(self.poll_short_secs)),
            tick: Duration::from_secs(self.tick_secs.max(1)),
            settle_interval: Duration::from_millis(self.settle_interval_ms),
            settle_samples: self.settle_samples.max(1),
            ..Timing::default()
        }
    }

    pub fn listener(&self) -> ListenerConfig {
        ListenerConfig {
            heartbeat: Duration::from_secs(self.heartbeat_secs.max(1)),
            reconnect_interval: Duration::from_secs(self.reconnect_secs.max(1)),
            ..ListenerConfig::default()
        }
    }
}

/// One synced folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub name: String,
    pub path: PathBuf,
    pub url: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    pub identifier: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcements_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Command lines for the external backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<ExternalCommands>,
}

fn default_backend() -> String {
    BackendKind::Git.as_str().to_string()
}

impl FolderConfig {
    pub fn backend_kind(&self) -> Result<BackendKind> {
        BackendKind::from_str(&self.backend)
    }

    pub fn identifier(&self) -> Result<Identifier> {
        Ok(Identifier::parse(&self.identifier)?)
    }

    /// Checks the fields that are only parsed when the folder starts.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("folder with an empty name".to_string()));
        }
        self.backend_kind()?;
        self.identifier()
            .map_err(|e| Error::Config(format!("folder '{}': {}", self.name, e)))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default, rename = "folder", skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderConfig>,
}

impl Config {
    /// Loads configuration from `dir`; a missing file is an empty config.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(Error::Config(format!("failed to read config: {}", e))),
        };
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        for folder in &config.folders {
            folder.validate()?;
        }
        Ok(config)
    }

    /// Saves configuration to `dir`, replacing the file atomically.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        let tmp = dir.join(format!("{}.tmp", CONFIG_FILE_NAME));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, dir.join(CONFIG_FILE_NAME))?;
        Ok(())
    }

    /// The configured identity, or the one git knows about.
    pub fn user(&self) -> User {
        match &self.user {
            Some(user) => User::new(&user.name, &user.email),
            None => drift_core::identity::local_user(),
        }
    }

    pub fn folder(&self, name: &str) -> Result<&FolderConfig> {
        self.folders
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::FolderNotFound(name.to_string()))
    }

    pub fn folder_mut(&mut self, name: &str) -> Result<&mut FolderConfig> {
        self.folders
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::FolderNotFound(name.to_string()))
    }

    /// Registers a folder; names and paths must be unique.
    pub fn add_folder(&mut self, folder: FolderConfig) -> Result<()> {
        folder.validate()?;
        if let Some(existing) = self
            .folders
            .iter()
            .find(|f| f.name == folder.name || f.path == folder.path)
        {
            return Err(Error::FolderExists(existing.name.clone()));
        }
        self.folders.push(folder);
        Ok(())
    }

    pub fn remove_folder(&mut self, name: &str) -> Result<FolderConfig> {
        let index = self
            .folders
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::FolderNotFound(name.to_string()))?;
        Ok(self.folders.remove(index))
    }
}

/// Persists per-folder flags into the config file on disk.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    write: Mutex<()>,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ConfigStore {
            dir: dir.into(),
            write: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FolderStore for ConfigStore {
    fn set_paused(&self, name: &str, paused: bool) -> Result<()> {
        let _guard = self
            .write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut config = Config::load(&self.dir)?;
        config.folder_mut(name)?.paused = paused;
        config.save(&self.dir)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
