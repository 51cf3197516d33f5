//! Application configuration management.
//!
//! `Config` is read once from the environment (`.env` is loaded by the binary)
//! and validated at startup, before any workflow begins:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `EFACTURE_API_URL` | platform base URL (required) |
//! | `EFACTURE_API_KEY` | platform API key (required, placeholders rejected) |
//! | `EFACTURE_SUBSCRIPTION_ID` | subscription the token is stored under (required) |
//! | `EFACTURE_CHANNEL` | channel sent with upload sessions (default `web`) |
//! | `EFACTURE_MAIL_ADDRESS` | contact address sent with upload sessions |
//! | `EFACTURE_REQUEST_TIMEOUT_SECS` | HTTP timeout (default 120) |
//! | `EFACTURE_TOKEN_STORE` | `file` (default), `supabase` or `memory` |
//! | `EFACTURE_TOKEN_FILE` | token document for the file store |
//! | `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY` / `SUPABASE_ANON_KEY`, `SUPABASE_TOKENS_TABLE` | Supabase store |
//!
//! `Preferences` (last login) are stored at `~/.config/efacture/preferences.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::PlatformError;

/// Application name used for config/data directory paths
const APP_NAME: &str = "efacture";

/// Preferences file name
const PREFERENCES_FILE: &str = "preferences.json";

/// Token document name for the file store
const TOKEN_FILE: &str = "tokens.json";

/// Channel reported to the platform when creating upload sessions
const DEFAULT_CHANNEL: &str = "web";

/// HTTP request timeout in seconds.
/// Uploads of large batches go through one request, so this is generous.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default Supabase table holding token records
const DEFAULT_TOKENS_TABLE: &str = "tokens";

/// Values shipped in sample `.env` files that must never reach the platform
const PLACEHOLDER_VALUES: &[&str] = &["your_cecurity_api_key", "your_api_key", "changeme"];

/// True for blank values and well-known sample placeholders.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.starts_with("your_")
        || PLACEHOLDER_VALUES
            .iter()
            .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

/// Settings for talking to the invoice platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub subscription_id: String,
    pub channel: String,
    pub mail_address: Option<String>,
    pub request_timeout: Duration,
}

impl PlatformConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            subscription_id: subscription_id.into(),
            channel: DEFAULT_CHANNEL.to_string(),
            mail_address: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// The API key, unless it is missing or a placeholder
    pub fn api_key(&self) -> Result<&str, PlatformError> {
        match self.api_key.as_deref() {
            Some(key) if !is_placeholder(key) => Ok(key),
            Some(_) => Err(PlatformError::Configuration(
                "Invalid API key configuration: EFACTURE_API_KEY is a placeholder".to_string(),
            )),
            None => Err(PlatformError::Configuration(
                "Invalid API key configuration: EFACTURE_API_KEY is not set".to_string(),
            )),
        }
    }

    /// The parsed base URL, unless it is missing or not http(s)
    pub fn base_url(&self) -> Result<Url, PlatformError> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                PlatformError::Configuration("Missing platform API URL: EFACTURE_API_URL is not set".to_string())
            })?;

        let url = Url::parse(raw).map_err(|e| {
            PlatformError::Configuration(format!("Invalid platform API URL {:?}: {}", raw, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PlatformError::Configuration(format!(
                "Invalid platform API URL {:?}: scheme must be http or https",
                raw
            )));
        }
        Ok(url)
    }

    pub fn subscription_id(&self) -> Result<&str, PlatformError> {
        let id = self.subscription_id.trim();
        if id.is_empty() {
            return Err(PlatformError::Configuration(
                "Missing subscription identifier: EFACTURE_SUBSCRIPTION_ID is not set".to_string(),
            ));
        }
        Ok(id)
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        self.base_url()?;
        self.api_key()?;
        self.subscription_id()?;
        Ok(())
    }
}

/// Where token records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    File { path: PathBuf },
    Supabase { url: String, api_key: String, table: String },
    Memory,
}

impl StoreConfig {
    /// `<data_dir>/efacture/tokens.json`
    pub fn default_file_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_NAME).join(TOKEN_FILE))
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        match self {
            StoreConfig::Supabase { url, api_key, .. } => {
                Url::parse(url).map_err(|e| {
                    PlatformError::Configuration(format!("Invalid SUPABASE_URL {:?}: {}", url, e))
                })?;
                if is_placeholder(api_key) {
                    return Err(PlatformError::Configuration(
                        "Invalid Supabase key configuration".to_string(),
                    ));
                }
                Ok(())
            }
            StoreConfig::File { .. } | StoreConfig::Memory => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub platform: PlatformConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, PlatformError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PlatformError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_timeout = match var("EFACTURE_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                PlatformError::Configuration(format!("Invalid EFACTURE_REQUEST_TIMEOUT_SECS: {:?}", raw))
            })?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let platform = PlatformConfig {
            base_url: var("EFACTURE_API_URL"),
            api_key: var("EFACTURE_API_KEY"),
            subscription_id: var("EFACTURE_SUBSCRIPTION_ID").unwrap_or_default(),
            channel: var("EFACTURE_CHANNEL").unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            mail_address: var("EFACTURE_MAIL_ADDRESS"),
            request_timeout,
        };

        let store = match var("EFACTURE_TOKEN_STORE").as_deref().unwrap_or("file") {
            "file" => {
                let path = var("EFACTURE_TOKEN_FILE")
                    .map(PathBuf::from)
                    .or_else(StoreConfig::default_file_path)
                    .ok_or_else(|| {
                        PlatformError::Configuration(
                            "Could not find data directory; set EFACTURE_TOKEN_FILE".to_string(),
                        )
                    })?;
                StoreConfig::File { path }
            }
            "supabase" => {
                let url = var("SUPABASE_URL").ok_or_else(|| {
                    PlatformError::Configuration("Missing env.SUPABASE_URL".to_string())
                })?;
                let api_key = var("SUPABASE_SERVICE_ROLE_KEY")
                    .or_else(|| var("SUPABASE_ANON_KEY"))
                    .ok_or_else(|| {
                        PlatformError::Configuration("Missing env.SUPABASE_ANON_KEY".to_string())
                    })?;
                let table = var("SUPABASE_TOKENS_TABLE").unwrap_or_else(|| DEFAULT_TOKENS_TABLE.to_string());
                StoreConfig::Supabase { url, api_key, table }
            }
            "memory" => StoreConfig::Memory,
            other => {
                return Err(PlatformError::Configuration(format!(
                    "Unknown EFACTURE_TOKEN_STORE {:?} (expected file, supabase or memory)",
                    other
                )))
            }
        };

        Ok(Self { platform, store })
    }

    /// Startup check; returns the first configuration problem found
    pub fn validate(&self) -> Result<(), PlatformError> {
        self.platform.validate()?;
        self.store.validate()
    }
}

/// Small amount of user state remembered between runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Preferences {
    pub last_login: Option<String>,
}

impl Preferences {
    pub fn load() -> Result<Self> {
        let path = Self::preferences_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::preferences_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn preferences_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(PREFERENCES_FILE))
    }
}
