//! Server configuration loaded from TOML

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use hostel_core::services::accounts::SESSION_HOURS;
use hostel_net::{ServerSettings, DEFAULT_PORT};

use crate::error::{AppError, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "HOSTEL_CONFIG";

/// Longest allowed session lifetime: one year
pub const MAX_SESSION_HOURS: i64 = 24 * 366;

const CONFIG_FILE: &str = "hostel.toml";
const DB_FILE: &str = "hostel.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: SocketAddr,
    /// Defaults to the platform data directory
    pub database_path: Option<PathBuf>,
    pub session_hours: i64,
    pub max_connections: usize,
    /// Account created on first start when no users exist
    pub admin_username: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            database_path: None,
            session_hours: SESSION_HOURS,
            max_connections: 256,
            admin_username: "admin".to_string(),
        }
    }
}

impl Config {
    /// Load from `HOSTEL_CONFIG` or the platform config directory
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => match project_dirs() {
                Some(dirs) => dirs.config_dir().join(CONFIG_FILE),
                None => return Ok(Self::default()),
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if !(1..=MAX_SESSION_HOURS).contains(&config.session_hours) {
            return Err(AppError::Config(format!(
                "session_hours must be between 1 and {}",
                MAX_SESSION_HOURS
            )));
        }
        if config.admin_username.trim().is_empty() {
            return Err(AppError::Config("admin_username must not be empty".into()));
        }
        Ok(config)
    }

    /// Resolved database location
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let dirs = project_dirs()
            .ok_or_else(|| AppError::Config("Could not determine data directory".into()))?;
        Ok(dirs.data_dir().join(DB_FILE))
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            session_hours: self.session_hours,
            max_connections: self.max_connections,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "hostel", "hostel")
}
