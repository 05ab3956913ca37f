// src/config.rs
use crate::application::{
    pipeline::{PipelineConfig, SilentErrorCodes},
    services::ClientSettings,
    sync::bus::DEFAULT_CLEAR_DELAY,
    upload::PollingConfig,
};
use crate::domain::upload::{UploadLimits, file::DEFAULT_ALLOWED_TYPES, file::DEFAULT_MAX_FILE_SIZE};
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    api_base_url: String,
    api_timeout: Duration,
    auto_refresh: bool,
    refresh_threshold: Duration,
    polling_interval: Duration,
    polling_max_duration: Duration,
    max_file_size: u64,
    allowed_file_types: Vec<String>,
    silent_error_codes: Vec<String>,
    storage_dir: PathBuf,
    session_redirect_delay: Duration,
    review_redirect_delay: Duration,
    quota_cache_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_api_base_url() -> String {
    "http://localhost:8000".into()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".receipt-client")
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!("{name} must be a boolean, got '{other}'"))),
    }
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(format!("{name} must be a non-negative integer, got '{raw}'")))
}

impl AppConfig {
    /// Build configuration from environment variables, loading a `.env` file
    /// first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source. Unset variables
    /// fall back to defaults; set but unparsable ones are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |name: &str, default: u64| -> Result<u64, ConfigError> {
            lookup(name).map_or(Ok(default), |raw| parse_number(name, &raw))
        };
        let millis = |name: &str, default: u64| number(name, default).map(Duration::from_millis);

        let api_base_url = lookup("API_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(default_api_base_url);
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "API_BASE_URL must be an http(s) URL, got '{api_base_url}'"
            )));
        }

        let auto_refresh = lookup("ENABLE_AUTO_REFRESH")
            .map_or(Ok(true), |raw| parse_bool("ENABLE_AUTO_REFRESH", &raw))?;

        let polling_interval = millis("POLLING_INTERVAL_MS", 3000)?;
        if polling_interval.is_zero() {
            return Err(ConfigError::Invalid("POLLING_INTERVAL_MS must be positive".into()));
        }

        let allowed_file_types = lookup("ALLOWED_FILE_TYPES")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|| DEFAULT_ALLOWED_TYPES.iter().map(|t| (*t).to_string()).collect());
        if allowed_file_types.is_empty() {
            return Err(ConfigError::Invalid("ALLOWED_FILE_TYPES cannot be empty".into()));
        }

        let silent_error_codes = lookup("SILENT_ERROR_CODES")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|| SilentErrorCodes::default().iter().map(str::to_string).collect());

        Ok(Self {
            api_base_url,
            api_timeout: millis("API_TIMEOUT_MS", 30_000)?,
            auto_refresh,
            refresh_threshold: Duration::from_secs(number("TOKEN_REFRESH_THRESHOLD_SECS", 300)?),
            polling_interval,
            polling_max_duration: millis("POLLING_MAX_DURATION_MS", 120_000)?,
            max_file_size: number("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
            allowed_file_types,
            silent_error_codes,
            storage_dir: lookup("STORAGE_DIR").map_or_else(default_storage_dir, PathBuf::from),
            session_redirect_delay: millis("SESSION_REDIRECT_DELAY_MS", 500)?,
            review_redirect_delay: millis("REVIEW_REDIRECT_DELAY_MS", 1500)?,
            quota_cache_ttl: millis("QUOTA_CACHE_TTL_MS", 60_000)?,
        })
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout(&self) -> Duration {
        self.api_timeout
    }

    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    pub fn pipeline(&self) -> PipelineConfig {
        let threshold = i64::try_from(self.refresh_threshold.as_secs()).unwrap_or(i64::MAX);
        PipelineConfig {
            auto_refresh: self.auto_refresh,
            refresh_threshold: chrono::Duration::seconds(threshold),
            silent_codes: SilentErrorCodes::from_codes(&self.silent_error_codes),
            session_redirect_delay: self.session_redirect_delay,
            ..PipelineConfig::default()
        }
    }

    pub fn polling(&self) -> PollingConfig {
        PollingConfig::from_budget(
            self.polling_interval,
            self.polling_max_duration,
            self.review_redirect_delay,
        )
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_size: self.max_file_size,
            allowed_types: self.allowed_file_types.clone(),
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            pipeline: self.pipeline(),
            polling: self.polling(),
            limits: self.upload_limits(),
            sync_clear_delay: DEFAULT_CLEAR_DELAY,
            quota_ttl: self.quota_cache_ttl,
            ..ClientSettings::default()
        }
    }
}
