//! Error types for mlpipe operations.
//!
//! Defines comprehensive error types for all major subsystems:
//! - Platform API interactions (projects, functions, runs)
//! - Artifact retrieval and preview
//! - Serving deployment and inference
//! - Workflow submission and watching

use thiserror::Error;

/// Errors that can occur while talking to the platform API.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Missing API base URL: MLPIPE_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse platform response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    #[error("Function '{0}' is not registered in the project")]
    FunctionNotRegistered(String),

    #[error("Invalid hub URI '{0}': expected 'hub://<name>'")]
    InvalidHubUri(String),

    #[error("Invalid selector '{input}': {reason}")]
    InvalidSelector { input: String, reason: String },

    #[error("Run '{uid}' ended in state '{state}': {reason}")]
    RunFailed {
        uid: String,
        state: String,
        reason: String,
    },

    #[error("Timed out after {seconds}s waiting for run '{uid}' to complete")]
    RunTimeout { uid: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during artifact access.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Run has no output named '{0}'")]
    OutputNotFound(String),

    #[error("Invalid store URL '{url}': {reason}")]
    InvalidStoreUrl { url: String, reason: String },

    #[error("Failed to fetch artifact '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during serving deployment and inference.
#[derive(Debug, Error)]
pub enum ServingError {
    #[error("Serving function '{0}' has no models attached")]
    NoModels(String),

    #[error("Model '{name}' already attached to serving function '{function}'")]
    DuplicateModel { function: String, name: String },

    #[error("Serving function '{0}' is not deployed")]
    NotDeployed(String),

    #[error("Deploy failed for function '{function}': {reason}")]
    DeployFailed { function: String, reason: String },

    #[error("Timed out after {seconds}s waiting for endpoint of '{function}'")]
    DeployTimeout { function: String, seconds: u64 },

    #[error("Inference request failed: {0}")]
    InferenceFailed(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow definition path is empty")]
    EmptyPath,

    #[error("Workflow run '{id}' ended in state '{state}'")]
    WorkflowFailed { id: String, state: String },

    #[error("Timed out after {seconds}s watching workflow '{id}'")]
    WatchTimeout { id: String, seconds: u64 },

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}
