//! Client surface for the managed MLOps platform.
//!
//! Everything non-trivial (distributed execution, artifact storage,
//! autoscaling, the model registry, hyperparameter search, the workflow
//! engine) lives behind the platform API. This module only provides typed
//! handles over that surface:
//!
//! - **Client**: HTTP plumbing with auth and transient-failure retry
//! - **Project / Function**: registration of batch and serving functions
//! - **Run**: submission, state polling, named outputs
//! - **Artifact**: store-URL normalization and dataset preview
//! - **Serving**: model attachment, deployment, versioned inference
//! - **Workflow**: DAG submission with wait-for-completion

pub mod artifact;
pub mod client;
pub mod function;
pub mod project;
pub mod run;
pub mod serving;
pub mod workflow;

// Re-export main types for convenience
pub use artifact::{to_store_url, ArtifactRef, CsvPreview, DataItem};
pub use client::PlatformClient;
pub use function::{FunctionKind, FunctionSpec};
pub use project::{ModelEntry, Project};
pub use run::{Best, HyperParamGrid, RunHandle, RunSpec, RunState, RunStatus, Selector};
pub use serving::{InferenceRequest, InferenceResponse, ModelSpec, ServingFunction};
pub use workflow::{WorkflowRun, WorkflowSpec, WorkflowState};
