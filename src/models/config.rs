//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Credentials;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hub connection and credentials
    #[serde(default)]
    pub hub: HubConfig,

    /// Polling and content fetching behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override hub settings from `HUB_URL`, `HUB_USERNAME` and `HUB_PASSWORD`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("HUB_URL") {
            self.hub.url = url;
        }
        if let Some(username) = lookup("HUB_USERNAME") {
            self.hub.username = username;
        }
        if let Some(password) = lookup("HUB_PASSWORD") {
            self.hub.password = password;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.hub.url.trim().is_empty() {
            return Err(AppError::validation("hub.url is empty"));
        }
        let parsed = url::Url::parse(&self.hub.url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "hub.url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.hub.username.trim().is_empty() {
            return Err(AppError::validation("hub.username is empty"));
        }
        if self.hub.timeout_secs == 0 {
            return Err(AppError::validation("hub.timeout_secs must be > 0"));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.interval_secs == 0 {
            return Err(AppError::validation("crawler.interval_secs must be > 0"));
        }
        if self.crawler.fetch_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.fetch_timeout_secs must be > 0",
            ));
        }
        Ok(())
    }
}

/// Hub endpoint, credentials and TLS trust.
#[derive(Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Base URL of the hub, e.g. `https://hub.example.org`
    #[serde(default = "defaults::hub_url")]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// PEM file holding the CA that hub certificates must chain to
    #[serde(default = "defaults::ca_cert")]
    pub ca_cert: PathBuf,

    /// Connect and request timeout for job and auth calls
    #[serde(default = "defaults::hub_timeout")]
    pub timeout_secs: u64,
}

impl HubConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: defaults::hub_url(),
            username: String::new(),
            password: String::new(),
            ca_cert: defaults::ca_cert(),
            timeout_secs: defaults::hub_timeout(),
        }
    }
}

// Hand-written so the password never reaches the logs.
impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ca_cert", &self.ca_cert)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Polling and content fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for every HTTP request
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Pause between poll iterations in seconds
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Timeout for feed and page downloads
    #[serde(default = "defaults::fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            interval_secs: defaults::interval(),
            fetch_timeout_secs: defaults::fetch_timeout(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Hub defaults
    pub fn hub_url() -> String {
        "http://localhost:3000".into()
    }
    pub fn ca_cert() -> PathBuf {
        PathBuf::from("ca.pem")
    }
    pub fn hub_timeout() -> u64 {
        5
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        concat!("Mozilla/5.0 (compatible; hub-scout/", env!("CARGO_PKG_VERSION"), ")").into()
    }
    pub fn interval() -> u64 {
        60
    }
    pub fn fetch_timeout() -> u64 {
        20
    }
}
