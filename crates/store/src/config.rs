//! Store connection configuration.
//!
//! Connection parameters come from two sources:
//!
//! 1. Environment variables (`ECONOTE_PROJECT_ID`, `ECONOTE_API_KEY`,
//!    `ECONOTE_AUTH_DOMAIN`), typically via `.env` in development.
//! 2. An optional local settings file (`ECONOTE_SETTINGS_PATH`, default
//!    `econote-settings.json`) holding the same three keys, written by the
//!    settings endpoint.
//!
//! Precedence: a key present in the settings file **overrides** the
//! environment; the environment fills any key the file omits. The settings
//! file exists so an operator can repoint a running install without a
//! rebuild, which is only useful if it wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default settings-file location, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "econote-settings.json";

/// Connection parameters for the remote document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Project identity within the managed store.
    pub project_id: String,
    /// API credential sent with every request.
    pub api_key: String,
    /// Host serving both the listen channel and the REST surface.
    pub auth_domain: String,
}

/// The three overridable keys, as persisted in the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_domain: Option<String>,
}

/// Errors produced while assembling a [`StoreConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required key was found in neither the settings file nor the
    /// environment.
    #[error("Missing store configuration key: {0}")]
    MissingKey(&'static str),

    /// The settings file exists but could not be read or parsed.
    #[error("Invalid settings file {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },

    /// The settings file could not be written.
    #[error("Failed to write settings file {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },
}

impl StoreConfig {
    /// Assemble configuration from the settings file and the environment.
    ///
    /// The settings path is taken from `ECONOTE_SETTINGS_PATH` when set. A
    /// missing settings file is not an error -- the environment is then the
    /// only source.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&settings_path())
    }

    /// Like [`load`](Self::load) with an explicit settings-file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Assembly with an injected environment lookup, so tests never depend
    /// on the real process environment.
    fn load_with(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let overrides = read_overrides_from(path)?;

        let project_id = resolve(overrides.project_id, "ECONOTE_PROJECT_ID", &env)?;
        let api_key = resolve(overrides.api_key, "ECONOTE_API_KEY", &env)?;
        let auth_domain = resolve(overrides.auth_domain, "ECONOTE_AUTH_DOMAIN", &env)?;

        Ok(Self {
            project_id,
            api_key,
            auth_domain,
        })
    }

    /// Persist override values to the default settings file.
    ///
    /// Takes effect on the next [`load`](Self::load); the live connection is
    /// not re-established.
    pub fn save_overrides(overrides: &StoreOverrides) -> Result<(), ConfigError> {
        save_overrides_to(&settings_path(), overrides)
    }
}

/// Persist override values to an explicit path.
pub fn save_overrides_to(path: &Path, overrides: &StoreOverrides) -> Result<(), ConfigError> {
    let body = serde_json::to_string_pretty(overrides).map_err(|e| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, body).map_err(|e| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn settings_path() -> PathBuf {
    std::env::var("ECONOTE_SETTINGS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_PATH))
}

/// Read the current override values. A missing file reads as no overrides.
pub fn read_overrides_from(path: &Path) -> Result<StoreOverrides, ConfigError> {
    if !path.exists() {
        return Ok(StoreOverrides::default());
    }
    let body = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidSettings {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&body).map_err(|e| ConfigError::InvalidSettings {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Settings-file value wins; the environment fills the gap.
fn resolve(
    file_value: Option<String>,
    env_key: &'static str,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    if let Some(value) = file_value.filter(|v| !v.is_empty()) {
        return Ok(value);
    }
    env(env_key)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingKey(env_key))
}
