// src/config/service.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::retry::{RetryPolicy, DEFAULT_MAX_RETRIES};

pub const DEFAULT_SERVICE_CONFIG_PATH: &str = "config/service.toml";
pub const ENV_SERVICE_CONFIG_PATH: &str = "SERVICE_CONFIG_PATH";

fn default_movies_info_url() -> String {
    "http://localhost:8080/v1/movieinfos".to_string()
}
fn default_reviews_url() -> String {
    "http://localhost:8081/v1/reviews".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_connect_timeout_ms() -> u64 {
    2_000
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_delay_ms() -> u64 {
    1_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Where the two upstreams live and how patiently we talk to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_movies_info_url")]
    pub movies_info_url: String,
    #[serde(default = "default_reviews_url")]
    pub reviews_url: String,
    /// Per-attempt timeout; a timed out attempt is classified as unclassified (no retry).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            movies_info_url: default_movies_info_url(),
            reviews_url: default_reviews_url(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry: RetrySettings::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ServiceConfig = toml::from_str(s).context("parsing service config")?;
        Ok(cfg.normalized())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading service config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $SERVICE_CONFIG_PATH
    /// 2) config/service.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        let base = match env::var(ENV_SERVICE_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(PathBuf::from(p))?,
            Err(_) => {
                let p = Path::new(DEFAULT_SERVICE_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(p)?
                } else {
                    Self::default()
                }
            }
        };
        base.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = env::var("MOVIES_INFO_URL") {
            self.movies_info_url = v;
        }
        if let Ok(v) = env::var("REVIEWS_URL") {
            self.reviews_url = v;
        }
        if let Some(v) = parse_env::<u64>("DOWNSTREAM_TIMEOUT_MS")? {
            self.request_timeout_ms = v;
        }
        if let Some(v) = parse_env::<u64>("DOWNSTREAM_CONNECT_TIMEOUT_MS")? {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = parse_env::<u32>("RETRY_MAX")? {
            self.retry.max_retries = v;
        }
        if let Some(v) = parse_env::<u64>("RETRY_DELAY_MS")? {
            self.retry.delay_ms = v;
        }
        Ok(self.normalized())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    fn normalized(mut self) -> Self {
        // Base URLs are joined with "/{id}", so a trailing slash would double up.
        while self.movies_info_url.ends_with('/') {
            self.movies_info_url.pop();
        }
        while self.reviews_url.ends_with('/') {
            self.reviews_url.pop();
        }
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = default_request_timeout_ms();
        }
        if self.connect_timeout_ms == 0 {
            self.connect_timeout_ms = default_connect_timeout_ms();
        }
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => {
            let v = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}"))?;
            Ok(Some(v))
        }
        Err(_) => Ok(None),
    }
}
