//! Process-wide configuration, read once at startup

use crate::llm::gemini::DEFAULT_BASE_URL;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for the chat server and its model session
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model credential; `None` leaves the session unavailable
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub port: u16,
    pub request_timeout: Duration,
    /// Replaces the built-in system instruction when set
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            system_prompt_path: None,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            api_key: non_empty("API_KEY").or_else(|| non_empty("GEMINI_API_KEY")),
            model: non_empty("CYBERGUARD_MODEL").unwrap_or(defaults.model),
            base_url: non_empty("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            port: non_empty("CYBERGUARD_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            request_timeout: non_empty("CYBERGUARD_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            system_prompt_path: non_empty("CYBERGUARD_SYSTEM_PROMPT_FILE").map(PathBuf::from),
        }
    }
}
