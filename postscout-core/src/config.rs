//! Application configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then a
//! `.env` file and the process environment. Reddit credentials usually come
//! from the environment (`REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`,
//! `REDDIT_USER_AGENT`).

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const ENV_CONFIG_PATH: &str = "POSTSCOUT_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = "postscout.toml";
pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";
pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditSettings,
    pub history: HistorySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: Option<String>,
    pub api_base: String,
    pub token_url: String,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: None,
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

/// How much of a user's submission history is pulled during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub max_pages: u32,
    /// Trust the provider's newest-first ordering and stop at the first page
    /// that reaches past the lookback window.
    pub stop_at_window_edge: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_pages: 10,
            stop_at_window_edge: false,
        }
    }
}

/// The three opaque values needed for an app-only Reddit grant.
#[derive(Clone, PartialEq, Eq)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl RedditCredentials {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
        }
    }
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl AppConfig {
    /// Loads `.env`, the optional TOML file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let (path, required) = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = Self::from_file(&path, required)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path, required: bool) -> Result<Self, ConfigError> {
        if !path.exists() && !required {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotReadable {
                path: path.display().to_string(),
            })?;
        info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overrides credentials with any non-empty values from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty(ENV_CLIENT_ID) {
            self.reddit.client_id = Some(value);
        }
        if let Some(value) = non_empty(ENV_CLIENT_SECRET) {
            self.reddit.client_secret = Some(value);
        }
        if let Some(value) = non_empty(ENV_USER_AGENT) {
            self.reddit.user_agent = Some(value);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "history.max_pages".to_string(),
                value: "0".to_string(),
            });
        }
        for (field, value) in [
            ("reddit.api_base", &self.reddit.api_base),
            ("reddit.token_url", &self.reddit.token_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<RedditCredentials, ConfigError> {
        let require = |value: &Option<String>, var_name: &str| {
            value
                .clone()
                .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                    var_name: var_name.to_string(),
                })
        };

        Ok(RedditCredentials::new(
            require(&self.reddit.client_id, ENV_CLIENT_ID)?,
            require(&self.reddit.client_secret, ENV_CLIENT_SECRET)?,
            require(&self.reddit.user_agent, ENV_USER_AGENT)?,
        ))
    }
}
