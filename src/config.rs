//! Platform connection configuration.
//!
//! This module provides configuration for reaching the managed platform:
//! API base URL, artifact gateway, credentials, and client-side timing
//! (request timeout, poll interval, wait limits).
//!
//! Credentials and endpoints are commonly distributed as an env file
//! (`remote.env`); [`load_env_file`] applies one before reading the
//! environment.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::error::PlatformError;

/// Default timeout for a single HTTP request.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default interval between run/deploy status polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default overall wait limit for a remote run to reach a terminal state.
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 3600;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The env file could not be loaded.
    #[error("Failed to load env file '{path}': {message}")]
    EnvFile { path: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Connection settings for the managed platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Base URL of the platform API (e.g., "https://mlops.example.com").
    pub api_base: String,
    /// Base URL of the artifact store HTTP gateway. Defaults to
    /// `{api_base}/artifact-store` when not set explicitly.
    pub artifact_base: String,
    /// Optional bearer token for API authentication.
    pub api_key: Option<String>,
    /// Timeout for individual HTTP requests.
    pub request_timeout: Duration,
    /// Interval between status polls while waiting on runs and deploys.
    pub poll_interval: Duration,
    /// Overall limit when waiting for a run, deploy, or workflow.
    pub run_timeout: Duration,
}

impl PlatformConfig {
    /// Creates a configuration with explicit API base and defaults elsewhere.
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        let artifact_base = format!("{}/artifact-store", api_base.trim_end_matches('/'));
        Self {
            api_base,
            artifact_base,
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MLPIPE_API_BASE`: Platform API base URL (required)
    /// - `MLPIPE_ARTIFACT_BASE`: Artifact gateway base URL (optional)
    /// - `MLPIPE_API_KEY`: Bearer token (optional)
    /// - `MLPIPE_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 60)
    /// - `MLPIPE_POLL_INTERVAL_SECS`: Status poll interval (default: 5)
    /// - `MLPIPE_RUN_TIMEOUT_SECS`: Overall run wait limit (default: 3600)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `MLPIPE_API_BASE` is missing or a numeric
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base = std::env::var("MLPIPE_API_BASE")
            .map_err(|_| ConfigError::MissingEnvVar("MLPIPE_API_BASE".to_string()))?;

        let mut config = Self::new(api_base);

        if let Ok(val) = std::env::var("MLPIPE_ARTIFACT_BASE") {
            config.artifact_base = val;
        }

        config.api_key = std::env::var("MLPIPE_API_KEY").ok();

        if let Ok(val) = std::env::var("MLPIPE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "MLPIPE_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("MLPIPE_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "MLPIPE_POLL_INTERVAL_SECS")?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("MLPIPE_RUN_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "MLPIPE_RUN_TIMEOUT_SECS")?;
            config.run_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the artifact gateway base URL.
    pub fn with_artifact_base(mut self, artifact_base: impl Into<String>) -> Self {
        self.artifact_base = artifact_base.into();
        self
    }

    /// Sets the status poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the overall run wait limit.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "api_base must not be empty".to_string(),
            ));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(ConfigError::ValidationFailed(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.run_timeout < self.poll_interval {
            return Err(ConfigError::ValidationFailed(
                "run_timeout must be at least poll_interval".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<ConfigError> for PlatformError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingEnvVar(var) if var == "MLPIPE_API_BASE" => {
                PlatformError::MissingApiBase
            }
            other => PlatformError::RequestFailed(other.to_string()),
        }
    }
}

/// Loads an env file (e.g., `remote.env`) into the process environment.
///
/// Existing variables win over file entries, so values exported in the
/// shell are not silently overridden.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    dotenvy::from_filename(path).map_err(|e| ConfigError::EnvFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Parses an environment variable value with context on failure.
fn parse_env_value<T: std::str::FromStr>(val: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
