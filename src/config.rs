use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Clip played while a skipped track winds down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerConfig {
    pub uri: String,
    #[serde(default)]
    pub position_ms: u64,
    pub duration_secs: u64,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            uri: "spotify:track:6pwt5G9ZKwM6I0GKVfIBb4".to_string(),
            position_ms: 40_700,
            duration_secs: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_accounts_base_url")]
    pub accounts_base_url: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default)]
    pub filler: FillerConfig,
    /// Where the authorization flow sends the user back to, if known.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

fn default_storage_path() -> PathBuf {
    AppConfig::config_dir()
        .map(|dir| dir.join("session.json"))
        .unwrap_or_else(|_| PathBuf::from("autodj-session.json"))
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_accounts_base_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_market() -> String {
    "US".to_string()
}

fn default_search_page_size() -> u32 {
    10
}

fn default_call_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            storage_path: default_storage_path(),
            api_base_url: default_api_base_url(),
            accounts_base_url: default_accounts_base_url(),
            market: default_market(),
            search_page_size: default_search_page_size(),
            call_timeout_secs: default_call_timeout_secs(),
            filler: FillerConfig::default(),
            redirect_uri: None,
        }
    }

    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".autodj"))
    }

    pub fn default_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file {} not found",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AppError::Config(
                "client_id and client_secret must be set".into(),
            ));
        }
        if self.search_page_size == 0 {
            return Err(AppError::Config("search_page_size must be positive".into()));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
