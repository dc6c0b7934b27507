use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

const APP_DIR: &str = "rankwatch";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub competition: CompetitionConfig,
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub endpoint: String,
    pub content_types: Vec<String>,
    pub page_size: u32,
    pub request_timeout_seconds: u64,
    pub rate_limit_backoff_secs: u64,
    pub max_rate_limit_retries: u8,
    pub page_delay_ms: u64,
    /// Sent as `builder-session-token` when present.
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionConfig {
    /// `uri` or `id` fragment identifying the tracked post.
    pub tracked_locator: String,
    /// Title fragment used only when the locator finds nothing.
    pub tracked_title_pattern: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    pub retry_attempts: u8,
    pub retry_delay_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://builder.aws.com".to_string(),
            endpoint: "/cs/content/feed".to_string(),
            content_types: vec!["article".into(), "post".into(), "wish".into()],
            page_size: 50,
            request_timeout_seconds: 15,
            rate_limit_backoff_secs: 5,
            max_rate_limit_retries: 5,
            page_delay_ms: 500,
            session_token: None,
        }
    }
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            tracked_locator: "/content/3AAMRb7lRzAJnleldfYBBtfM1WG/aideas-transforming-healthcare-into-ai-powered-wellness-companion".to_string(),
            tracked_title_pattern: Some(
                "Transforming Healthcare into AI-Powered Wellness Companion".to_string(),
            ),
            keywords: [
                "AIdeas",
                "AI ideas",
                "healthcare",
                "wellness",
                "competition",
                "Kiro",
                "Mimamori",
                "wellness companion",
                "AI-powered wellness",
                "wellness avatar",
                "health AI",
                "medical AI",
            ]
            .iter()
            .map(|kw| kw.to_string())
            .collect(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 150,
            initial_delay_secs: 10,
            retry_attempts: 3,
            retry_delay_secs: 5,
        }
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Per-user application directory, e.g. `~/.config/rankwatch` on Linux.
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join(APP_DIR))
}

impl AppConfig {
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dir = app_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("config.json"))
    }

    /// Loads the config from the default location, writing out defaults if it is missing.
    pub fn load() -> Self {
        match Self::config_file_path() {
            Ok(path) => Self::load_or_init(&path),
            Err(e) => {
                warn!(error = %e, "no config location, using defaults");
                Self::default()
            }
        }
    }

    /// Loads `path`, falling back to defaults. A missing file is created with the defaults.
    pub fn load_or_init(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => {
                info!(path = %path.display(), "configuration loaded");
                config
            }
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(save_err) = config.save_to(path) {
                    warn!(error = %save_err, path = %path.display(), "failed to write default config");
                }
                config
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
