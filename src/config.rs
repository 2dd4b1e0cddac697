use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::summarize;

pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOSTED_RETRY_DELAY_MS: u64 = 1500;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Process-wide settings, built once at startup and shared read-only.
///
/// Precedence: config file, then environment, then CLI flags (applied by the
/// caller).
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub default_lang: Option<String>,
    pub default_model: Option<String>,
    /// Running in a hosted/datacenter network range; enables the
    /// multi-profile transcript fallback.
    pub hosted: bool,
    pub hosted_retry_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub port: Option<u16>,
    pub summary_max_tokens: Option<u32>,
    /// Overrides the built-in browser identity pool
    pub user_agents: Vec<String>,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Load config from ~/.config/ytsum/config.toml if it exists, then overlay
    /// the process environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            let config: Config =
                toml::from_str(&content).wrap_err_with(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            self.gemini_api_key = Some(key);
        }
        if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(flag) = non_empty("YTSUM_HOSTED") {
            self.hosted = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(port) = non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.port = Some(port);
        }
    }

    pub fn lang(&self) -> &str {
        self.default_lang.as_deref().unwrap_or(DEFAULT_LANG)
    }

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn hosted_retry_delay(&self) -> Duration {
        Duration::from_millis(self.hosted_retry_delay_ms.unwrap_or(DEFAULT_HOSTED_RETRY_DELAY_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    pub fn summary_max_tokens(&self) -> u32 {
        self.summary_max_tokens.unwrap_or(summarize::DEFAULT_MAX_TOKENS)
    }

    /// Shared HTTP client honoring the configured per-request timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout())
            .build()
            .wrap_err("building HTTP client")
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytsum")
        .join("config.toml")
}
