use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    pub api_key: Option<String>,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_country")]
    pub country: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_min_articles")]
    pub min_articles: usize,

    #[serde(default = "default_trending_count")]
    pub trending_count: usize,

    #[serde(default = "default_primary_page_size")]
    pub primary_page_size: u32,

    #[serde(default = "default_fallback_page_size")]
    pub fallback_page_size: u32,

    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,

    #[serde(default = "default_fallback_categories")]
    pub fallback_categories: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

fn default_api_base_url() -> String {
    "https://newsapi.org/v2/".to_string()
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsdesk");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("social.db").to_string_lossy().to_string()
}

fn default_country() -> String {
    "us".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_min_articles() -> usize {
    20
}

fn default_trending_count() -> usize {
    3
}

fn default_primary_page_size() -> u32 {
    100
}

fn default_fallback_page_size() -> u32 {
    50
}

fn default_search_page_size() -> u32 {
    50
}

fn default_fallback_categories() -> Vec<String> {
    [
        "general",
        "business",
        "technology",
        "sports",
        "entertainment",
        "health",
        "science",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            db_path: default_db_path(),
            country: default_country(),
            language: default_language(),
            min_articles: default_min_articles(),
            trending_count: default_trending_count(),
            primary_page_size: default_primary_page_size(),
            fallback_page_size: default_fallback_page_size(),
            search_page_size: default_search_page_size(),
            fallback_categories: default_fallback_categories(),
            request_timeout_secs: default_request_timeout(),
            user_id: None,
            user_email: None,
        }
    }
}

impl Config {
    /// Parse config from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a TOML string
    pub fn to_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        // Environment variables override config file values
        if let Ok(key) = std::env::var("NEWSAPI_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(uid) = std::env::var("NEWSDESK_USER") {
            config.user_id = Some(uid);
        }
        if let Ok(email) = std::env::var("NEWSDESK_EMAIL") {
            config.user_email = Some(email);
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, self.to_string()?)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsdesk")
            .join("config.toml")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.trending_count > self.min_articles {
            return Err(AppError::Config(format!(
                "trending_count ({}) cannot exceed min_articles ({})",
                self.trending_count, self.min_articles
            )));
        }
        url::Url::parse(&self.api_base_url)
            .map_err(|e| AppError::Config(format!("api_base_url: {}", e)))?;
        Ok(())
    }
}
