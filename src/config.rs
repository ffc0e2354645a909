//! Stored credentials.
//!
//! Resolution order is environment first (`CONFLUENCE_BASE_URL` or
//! `CONFLUENCE_DOMAIN`, plus either `CONFLUENCE_BEARER_TOKEN` or
//! `CONFLUENCE_EMAIL`/`CONFLUENCE_TOKEN`), then the config file written by
//! `auth login`. The stored site may be a bare domain; `ApiClient::new`
//! normalizes it when a connection is opened.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::auth::AuthMethod;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub auth: AuthMethod,
}

/// Where a resolved config came from, reported by `auth status`.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Env,
    File(PathBuf),
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let base = config_dir().context("Unable to resolve config directory")?;
        Ok(base.join("confpack").join("config.json"))
    }

    /// Find usable credentials, if any, along with where they came from.
    pub fn resolve() -> Result<Option<(Config, ConfigSource)>> {
        if let Some(config) = Self::from_env() {
            return Ok(Some((config, ConfigSource::Env)));
        }
        let path = Self::path()?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("Invalid config format: {}", path.display()))?;
        Ok(Some((config, ConfigSource::File(path))))
    }

    fn from_env() -> Option<Config> {
        let base_url = env::var("CONFLUENCE_BASE_URL")
            .or_else(|_| env::var("CONFLUENCE_DOMAIN"))
            .ok()?;
        if let Ok(token) = env::var("CONFLUENCE_BEARER_TOKEN") {
            return Some(Config {
                base_url,
                auth: AuthMethod::Bearer { token },
            });
        }
        let email = env::var("CONFLUENCE_EMAIL").ok()?;
        let token = env::var("CONFLUENCE_TOKEN").ok()?;
        Some(Config {
            base_url,
            auth: AuthMethod::Basic { email, token },
        })
    }

    /// Write the config file (private to the user) and return its path.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        fs::write(&path, serde_json::to_vec_pretty(self)?)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        #[cfg(unix)]
        {
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms)
                .with_context(|| format!("Failed to set permissions: {}", path.display()))?;
        }
        Ok(path)
    }

    /// Delete the config file. Returns whether anything was stored.
    pub fn clear() -> Result<bool> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete config: {}", path.display()))?;
        Ok(true)
    }
}
