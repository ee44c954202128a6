//! Configuration module for the BJDMS client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::{ClientError, ClientResult};

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST API, including the `/api/v1` prefix
    pub api_url: Url,
    /// Path to the SQLite file backing durable local storage
    pub storage_path: PathBuf,
    /// Upper bound for a single HTTP request
    pub request_timeout: Duration,
    /// Upper bound for establishing a connection (HTTP or push channel)
    pub connect_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();

        let api_url = env::var("BJDMS_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000/api/v1".to_string());

        let storage_path = env::var("BJDMS_STORAGE_PATH")
            .unwrap_or_else(|_| "./data/client.sqlite".to_string())
            .into();

        let request_timeout = seconds_from_env("BJDMS_REQUEST_TIMEOUT_SECS", 30)?;
        let connect_timeout = seconds_from_env("BJDMS_CONNECT_TIMEOUT_SECS", 10)?;

        let log_level = env::var("BJDMS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_url: parse_api_url(&api_url)?,
            storage_path,
            request_timeout,
            connect_timeout,
            log_level,
        })
    }

    /// Build a configuration pointing at `api_url` with default timeouts.
    pub fn for_api(api_url: &str, storage_path: impl Into<PathBuf>) -> ClientResult<Self> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            storage_path: storage_path.into(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            log_level: "info".to_string(),
        })
    }

    /// Resolve an endpoint such as `/org/committees?status=active` against the API base.
    pub fn endpoint_url(&self, endpoint: &str) -> ClientResult<Url> {
        let joined = format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    /// URL of the notification push channel. The scheme mirrors the API scheme.
    pub fn notifications_ws_url(&self) -> ClientResult<Url> {
        let mut url = self.endpoint_url("/notifications/ws")?;
        let scheme = match self.api_url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("Cannot derive {} URL from {}", scheme, url)))?;
        Ok(url)
    }
}

fn parse_api_url(raw: &str) -> ClientResult<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::Config(format!(
            "BJDMS_API_URL must use http or https, got {}",
            other
        ))),
    }
}

fn seconds_from_env(key: &str, default: u64) -> ClientResult<Duration> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ClientError::Config(format!("Invalid {} value: {}", key, raw))),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
