//! mlpipe: end-to-end ML pipeline orchestration on a managed MLOps platform.
//!
//! This library provides a typed client for the platform's HTTP API
//! (projects, remote runs, artifacts, model serving, workflows) and a
//! pipeline orchestrator that sequences them into a complete train-and-serve
//! flow.

// Core modules
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod platform;

// Re-export commonly used error types
pub use error::{ArtifactError, PlatformError, ServingError, WorkflowError};
