//! Application configuration.
//!
//! Handles loading configuration from environment variables and .env files.

use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{api, drag, save};
use crate::error::Result;

/// Configuration for the application.
#[derive(Debug, Clone)]
pub struct Config {
    /// The application name
    app_name: String,
    /// The application version
    app_version: String,
    /// Base URL of the script persistence service
    pub api_url: String,
    /// Bearer token for the persistence service
    pub api_token: String,
    /// Auto-save interval in seconds; `None` disables auto-save
    pub auto_save_secs: Option<u64>,
    /// Directory holding local session drafts
    pub draft_dir: Option<PathBuf>,
    /// Press-and-hold time before a drag starts
    pub drag_debounce_ms: u64,
}

impl Config {
    /// Get the application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Get the application version.
    #[must_use]
    pub fn app_version(&self) -> &str {
        &self.app_version
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            api_url: api::DEFAULT_BASE_URL.to_string(),
            api_token: String::new(),
            auto_save_secs: None,
            draft_dir: dirs::data_dir().map(|d| d.join(save::DRAFT_DIR_NAME)),
            drag_debounce_ms: drag::DEBOUNCE_MS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    #[allow(clippy::unnecessary_wraps)] // Returns Result for forward-compatible API
    pub fn load() -> Result<Self> {
        // Try to load .env file if present
        dotenv().ok();

        let mut config = Self::default();

        if let Ok(url) = env::var("SHOWFLOW_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(token) = env::var("SHOWFLOW_API_TOKEN") {
            config.api_token = token;
        }

        // 0 or unparsable disables auto-save; tiny intervals are raised
        config.auto_save_secs = env::var("SHOWFLOW_AUTO_SAVE_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(|secs| secs.max(save::MIN_AUTO_SAVE_SECS));

        if let Ok(path) = env::var("SHOWFLOW_DRAFT_DIR") {
            config.draft_dir = Some(PathBuf::from(shellexpand::tilde(&path).to_string()));
        }

        if let Ok(ms) = env::var("SHOWFLOW_DRAG_DEBOUNCE_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                config.drag_debounce_ms = ms;
            }
        }

        Ok(config)
    }

    /// Check if the persistence service is configured
    pub fn has_api_credentials(&self) -> bool {
        !self.api_url.is_empty() && !self.api_token.is_empty()
    }

    /// The auto-save interval, if enabled.
    pub fn auto_save_interval(&self) -> Option<Duration> {
        self.auto_save_secs.map(Duration::from_secs)
    }

    /// The drag debounce as a duration.
    pub const fn drag_debounce(&self) -> Duration {
        Duration::from_millis(self.drag_debounce_ms)
    }
}
