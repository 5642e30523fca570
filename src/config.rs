use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::InsiderError;

pub const DEFAULT_CONFIG_FILE: &str = "edgar-insiders.json";
pub const CONTACT_ENV: &str = "EQEMAIL";
pub const DEFAULT_BASE_URL: &str =
    "https://www.sec.gov/files/structureddata/data/insider-transactions-data-sets/";
pub const IN_MEMORY_DATABASE: &str = ":memory:";
pub const DEFAULT_TABLE: &str = "insiders";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetryEntry {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub base_delay_secs: Option<u64>,
}

/// Attempts are counted in total, so `max_attempts: 5` means four retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 5;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

    /// Pause before the retry that follows failed attempt number `attempt`
    /// (1-based): 2s, 4s, 8s, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub contact: Option<String>,
    pub download_dir: Utf8PathBuf,
    pub database: String,
    pub base_url: String,
    pub table: String,
    pub retry: RetryPolicy,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `edgar-insiders.json` in the working directory when it
    /// exists, then layers the environment on top.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, InsiderError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| InsiderError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| InsiderError::ConfigParse(err.to_string()))?
        };

        let env_contact = std::env::var(CONTACT_ENV).ok();
        Self::resolve_config(config, env_contact)
    }

    pub fn resolve_config(
        config: Config,
        env_contact: Option<String>,
    ) -> Result<ResolvedConfig, InsiderError> {
        let schema_version = config.schema_version.unwrap_or(SCHEMA_VERSION);
        if schema_version != SCHEMA_VERSION {
            return Err(InsiderError::ConfigParse(format!(
                "unsupported schema_version {schema_version} (expected {SCHEMA_VERSION})"
            )));
        }

        let contact = env_contact
            .or(config.contact)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let download_dir = match config.download_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_download_dir()?,
        };

        let retry = match config.retry {
            Some(entry) => RetryPolicy {
                max_attempts: entry
                    .max_attempts
                    .unwrap_or(RetryPolicy::DEFAULT_ATTEMPTS)
                    .max(1),
                base_delay: entry
                    .base_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(RetryPolicy::DEFAULT_BASE_DELAY),
            },
            None => RetryPolicy::default(),
        };

        let mut base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(ResolvedConfig {
            schema_version,
            contact,
            download_dir,
            database: config
                .database
                .unwrap_or_else(|| IN_MEMORY_DATABASE.to_string()),
            base_url,
            table: config.table.unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            retry,
        })
    }
}

pub fn default_download_dir() -> Result<Utf8PathBuf, InsiderError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("edgar-insiders")).ok()
        })
        .ok_or_else(|| InsiderError::Filesystem("unable to resolve cache directory".to_string()))
}
