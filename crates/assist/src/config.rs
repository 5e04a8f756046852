//! Assist service configuration.

use std::env;

/// Connection settings for the generative text service.
#[derive(Debug, Clone)]
pub struct AssistConfig {
    /// Base URL of the service, e.g. `https://assist.example.com`.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Optional model name; the service default applies when unset.
    pub model: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssistConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingKey(&'static str),
}

impl AssistConfig {
    /// Load from `ECONOTE_ASSIST_URL`, `ECONOTE_ASSIST_API_KEY`, and the
    /// optional `ECONOTE_ASSIST_MODEL`.
    pub fn from_env() -> Result<Self, AssistConfigError> {
        Ok(Self {
            base_url: require("ECONOTE_ASSIST_URL")?,
            api_key: require("ECONOTE_ASSIST_API_KEY")?,
            model: env::var("ECONOTE_ASSIST_MODEL")
                .ok()
                .filter(|v| !v.is_empty()),
        })
    }
}

fn require(key: &'static str) -> Result<String, AssistConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AssistConfigError::MissingKey(key)),
    }
}
