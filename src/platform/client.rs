//! HTTP client for the managed platform API.
//!
//! All remote capability (job execution, artifact storage, model registry,
//! hyperparameter search, serving, workflows) lives behind this API; the
//! client only shapes requests, maps errors, and retries transient
//! failures.

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::PlatformConfig;
use crate::error::PlatformError;

/// Maximum number of retry attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Client for the platform's REST API.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    /// HTTP client for making API requests.
    http: Client,
    /// Base URL for the platform API.
    api_base: String,
    /// Base URL for the artifact store HTTP gateway.
    artifact_base: String,
    /// Optional bearer token for authentication.
    api_key: Option<String>,
    /// Interval between status polls.
    poll_interval: Duration,
    /// Overall wait limit for runs, deploys, and workflows.
    run_timeout: Duration,
}

impl PlatformClient {
    /// Creates a new client from a [`PlatformConfig`].
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            http: Client::builder()
                .timeout(config.request_timeout)
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            artifact_base: config.artifact_base.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            poll_interval: config.poll_interval,
            run_timeout: config.run_timeout,
        }
    }

    /// Creates a client from environment variables (see
    /// [`PlatformConfig::from_env`]).
    pub fn from_env() -> Result<Self, PlatformError> {
        let config = PlatformConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the artifact gateway base URL.
    pub fn artifact_base(&self) -> &str {
        &self.artifact_base
    }

    /// Get the status poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Get the overall wait limit.
    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    /// Get the API key (for debugging, returns masked value).
    pub fn api_key_masked(&self) -> String {
        match &self.api_key {
            None => "<none>".to_string(),
            Some(key) if key.len() <= 8 => "*".repeat(key.len()),
            Some(key) => format!("{}...{}", &key[..4], &key[key.len() - 4..]),
        }
    }

    /// GET an API path and deserialize the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.api_base, path);
        let value = self.execute_with_retry(Method::GET, &url, None).await?;
        from_value(value)
    }

    /// POST a JSON body to an API path and deserialize the response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.api_base, path);
        let body = serde_json::to_value(body)?;
        let value = self
            .execute_with_retry(Method::POST, &url, Some(body))
            .await?;
        from_value(value)
    }

    /// PUT a JSON body to an API path and deserialize the response.
    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.api_base, path);
        let body = serde_json::to_value(body)?;
        let value = self
            .execute_with_retry(Method::PUT, &url, Some(body))
            .await?;
        from_value(value)
    }

    /// POST a JSON body to an absolute URL (serving endpoints live outside
    /// the API base) and deserialize the response.
    pub async fn post_url<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, PlatformError> {
        let body = serde_json::to_value(body)?;
        let value = self.execute_with_retry(Method::POST, url, Some(body)).await?;
        from_value(value)
    }

    /// GET raw bytes from an absolute URL. Used for artifact downloads.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, PlatformError> {
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(PlatformError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlatformError::RequestFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Execute a request with exponential backoff retry logic.
    async fn execute_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, PlatformError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay_ms = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay_ms,
                    url = url,
                    "Retrying platform request after transient failure"
                );
            }

            match self.execute_request(method.clone(), url, body.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    // Only retry on transient errors
                    if is_transient_error(&err) {
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            error = %err,
                            "Transient platform error, will retry"
                        );
                        last_error = Some(err);
                    } else {
                        // Non-transient errors should fail immediately
                        return Err(err);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PlatformError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }

    /// Execute a single request (no retry logic).
    async fn execute_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, PlatformError> {
        let mut request = self
            .http
            .request(method, url)
            .header("Content-Type", "application/json");

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            // Try to parse the platform's structured error body
            if let Ok(error_body) = serde_json::from_str::<ApiErrorBody>(&error_text) {
                let message = error_body.message();
                if status_code == 429 {
                    return Err(PlatformError::RateLimited(message));
                }
                return Err(PlatformError::ApiError {
                    code: status_code,
                    message,
                });
            }

            return Err(PlatformError::ApiError {
                code: status_code,
                message: error_text,
            });
        }

        // Some endpoints (project save) return an empty body on success
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::RequestFailed(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| PlatformError::ParseError(format!("Invalid JSON response: {}", e)))
    }
}

/// Deserializes an API response value, tolerating `null` for unit targets.
fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, PlatformError> {
    serde_json::from_value(value)
        .map_err(|e| PlatformError::ParseError(format!("Unexpected response shape: {}", e)))
}

/// Check if an error is transient and should be retried.
fn is_transient_error(error: &PlatformError) -> bool {
    match error {
        PlatformError::RequestFailed(msg) => {
            // Network errors, timeouts, connection issues
            msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("temporarily")
                || msg.contains("Connection refused")
        }
        PlatformError::RateLimited(_) => true,
        PlatformError::ApiError { code, .. } => {
            // Server errors (5xx) and rate limits are transient
            *code >= 500 || *code == 429
        }
        _ => false,
    }
}

/// Error body returned by the platform API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn message(self) -> String {
        self.detail
            .or(self.error)
            .unwrap_or_else(|| "Unknown platform error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(api_base: &str) -> PlatformClient {
        PlatformClient::new(PlatformConfig::new(api_base))
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = test_client("http://localhost:8080/");
        assert_eq!(client.api_base(), "http://localhost:8080");
    }

    #[test]
    fn test_api_key_masked_none() {
        let client = test_client("http://localhost");
        assert_eq!(client.api_key_masked(), "<none>");
    }

    #[test]
    fn test_api_key_masked_short() {
        let client =
            PlatformClient::new(PlatformConfig::new("http://localhost").with_api_key("abc"));
        assert_eq!(client.api_key_masked(), "***");
    }

    #[test]
    fn test_api_key_masked_normal() {
        let client = PlatformClient::new(
            PlatformConfig::new("http://localhost").with_api_key("sk-1234567890abcdef"),
        );
        assert_eq!(client.api_key_masked(), "sk-1...cdef");
    }

    #[test]
    fn test_is_transient_error_rate_limited() {
        let error = PlatformError::RateLimited("Too many requests".to_string());
        assert!(is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_server_error() {
        let error = PlatformError::ApiError {
            code: 503,
            message: "Service unavailable".to_string(),
        };
        assert!(is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_client_error() {
        let error = PlatformError::ApiError {
            code: 404,
            message: "Not found".to_string(),
        };
        assert!(!is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_connection() {
        let error = PlatformError::RequestFailed("Connection refused".to_string());
        assert!(is_transient_error(&error));
    }

    #[test]
    fn test_is_transient_error_parse_error() {
        let error = PlatformError::ParseError("Invalid JSON".to_string());
        assert!(!is_transient_error(&error));
    }

    #[test]
    fn test_api_error_body_prefers_detail() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"detail": "run not found", "error": "other"}"#)
                .expect("parse");
        assert_eq!(body.message(), "run not found");
    }

    #[test]
    fn test_api_error_body_falls_back_to_error() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"error": "boom"}"#).expect("parse");
        assert_eq!(body.message(), "boom");
    }

    #[tokio::test]
    async fn test_get_json_connection_error() {
        let client = test_client("http://localhost:65535");
        let result: Result<serde_json::Value, _> = client.get_json("/api/v1/projects/x").await;
        assert!(result.is_err());
    }
}
