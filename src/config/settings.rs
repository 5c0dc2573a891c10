use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8787/callback";
const DEFAULT_LABEL_NAME: &str = "Replied";
const DEFAULT_REPLY_PREFIX: &str = "Re:";
const DEFAULT_RECENCY: &str = "1d";
const DEFAULT_REPLY_BODY: &str = "Hi,\n\nI am currently out of office.\nI will reply to your message when I am back.\n\nBest regards";

/// Per-profile settings. Every field is optional on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Google client-secret JSON (`installed` or `web` flavor).
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    #[serde(default)]
    pub label_name: Option<String>,
    #[serde(default)]
    pub reply_prefix: Option<String>,
    #[serde(default)]
    pub reply_body: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recency: Option<String>,
    #[serde(default)]
    pub max_candidates: Option<u32>,
    #[serde(default)]
    pub min_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_interval_secs: Option<u64>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    #[serde(default)]
    pub archive: Option<bool>,
}

impl Settings {
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
    }

    pub fn label_name(&self) -> &str {
        non_blank(self.label_name.as_deref()).unwrap_or(DEFAULT_LABEL_NAME)
    }

    pub fn reply_prefix(&self) -> &str {
        non_blank(self.reply_prefix.as_deref()).unwrap_or(DEFAULT_REPLY_PREFIX)
    }

    pub fn reply_body(&self) -> &str {
        self.reply_body.as_deref().unwrap_or(DEFAULT_REPLY_BODY)
    }

    pub fn sender(&self) -> Option<&str> {
        non_blank(self.sender.as_deref())
    }

    pub fn recency(&self) -> &str {
        non_blank(self.recency.as_deref()).unwrap_or(DEFAULT_RECENCY)
    }

    pub fn max_candidates(&self) -> u32 {
        self.max_candidates.unwrap_or(100)
    }

    pub fn interval_range(&self) -> (Duration, Duration) {
        let min = self.min_interval_secs.unwrap_or(45);
        let max = self.max_interval_secs.unwrap_or(120);
        (Duration::from_secs(min), Duration::from_secs(max))
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.unwrap_or(3)
    }

    pub fn archive(&self) -> bool {
        self.archive.unwrap_or(true)
    }

    pub fn validate(&self) -> AppResult<()> {
        let (min, max) = self.interval_range();
        if min.is_zero() || min > max {
            return Err(AppError::Config(format!(
                "poll interval must satisfy 0 < min_interval_secs <= max_interval_secs (got {} and {})",
                min.as_secs(),
                max.as_secs()
            )));
        }

        if self.label_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(AppError::Config("label_name must not be blank".to_string()));
        }

        if self.reply_prefix.as_deref().is_some_and(|prefix| prefix.trim().is_empty()) {
            return Err(AppError::Config("reply_prefix must not be blank".to_string()));
        }

        if self.max_candidates == Some(0) {
            return Err(AppError::Config(
                "max_candidates must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn load(path: PathBuf) -> AppResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)?;
    let settings = serde_json::from_str(&raw)?;
    Ok(settings)
}

pub fn save(path: PathBuf, settings: &Settings) -> AppResult<()> {
    let payload = serde_json::to_string_pretty(settings)?;
    fs::write(path, payload)?;
    Ok(())
}
