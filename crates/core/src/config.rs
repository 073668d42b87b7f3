//! Service configuration loaded from TOML
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:7411"
//!
//! [storage]
//! database = "/var/lib/fleetflow/fleetflow.db"
//!
//! [invites]
//! ttl_days = 7
//!
//! [identity]
//! min_password_length = 8
//! session_hours = 168
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:7411";

/// Longest accepted invitation lifetime
pub const MAX_INVITE_TTL_DAYS: i64 = 365;

/// Longest accepted session lifetime
pub const MAX_SESSION_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub invites: InviteSettings,
    pub identity: IdentitySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file; defaults to the platform data directory
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteSettings {
    /// Days an invitation stays redeemable
    pub ttl_days: i64,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self { ttl_days: 7 }
    }
}

impl InviteSettings {
    pub fn ttl(&self) -> Duration {
        Duration::days(self.ttl_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub min_password_length: usize,
    pub session_hours: i64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            min_password_length: 8,
            session_hours: 24 * 7,
        }
    }
}

impl IdentitySettings {
    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_hours)
    }
}

impl FleetConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: FleetConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check value ranges; lifetimes outside them would overflow timestamps
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_INVITE_TTL_DAYS).contains(&self.invites.ttl_days) {
            return Err(Error::validation(format!(
                "invites.ttl_days must be between 1 and {}",
                MAX_INVITE_TTL_DAYS
            )));
        }
        if !(1..=MAX_SESSION_HOURS).contains(&self.identity.session_hours) {
            return Err(Error::validation(format!(
                "identity.session_hours must be between 1 and {}",
                MAX_SESSION_HOURS
            )));
        }
        Ok(())
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("fleetflow.db")),
        }
    }
}

/// Platform data directory for FleetFlow
pub fn data_dir() -> Result<PathBuf> {
    let dirs = project_dirs()?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = project_dirs()?;
    Ok(dirs.config_dir().join("fleetflow.toml"))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "fleetflow", "fleetflow").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine data directory",
        ))
    })
}
