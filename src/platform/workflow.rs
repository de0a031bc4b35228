//! Workflow execution.
//!
//! A workflow is a platform-native DAG defined in a separate file and
//! executed as a unit by the platform's workflow engine. The client only
//! submits the definition path with a keyword-argument mapping and,
//! when asked to watch, polls the run until the DAG settles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::WorkflowError;
use crate::platform::project::Project;

/// Specification of a workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSpec {
    /// Path of the workflow definition file, as known to the platform.
    pub path: String,
    /// Keyword arguments passed to the workflow.
    pub arguments: BTreeMap<String, serde_json::Value>,
    /// Whether to wait for the DAG to reach a terminal state.
    pub watch: bool,
    /// Whether to execute on the client node instead of the remote engine.
    pub local: bool,
}

impl WorkflowSpec {
    /// Creates a remote, non-watching workflow spec for a definition path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            arguments: BTreeMap::new(),
            watch: false,
            local: false,
        }
    }

    /// Adds a keyword argument.
    pub fn with_argument(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Requests wait-for-completion semantics.
    pub fn watch(mut self) -> Self {
        self.watch = true;
        self
    }
}

/// State of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl WorkflowState {
    /// Whether the DAG has settled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded | WorkflowState::Failed)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::Running => write!(f, "running"),
            WorkflowState::Succeeded => write!(f, "succeeded"),
            WorkflowState::Failed => write!(f, "failed"),
            WorkflowState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Status payload returned by the platform for a workflow run.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    /// Workflow run identifier.
    pub id: String,
    /// Current state.
    pub state: WorkflowState,
}

impl Project {
    /// Submits a workflow definition for execution.
    ///
    /// With `watch` set, polls until the DAG reaches a terminal state and
    /// returns an error if it failed; otherwise returns the submitted run
    /// immediately.
    pub async fn run_workflow(&self, spec: WorkflowSpec) -> Result<WorkflowRun, WorkflowError> {
        if spec.path.trim().is_empty() {
            return Err(WorkflowError::EmptyPath);
        }

        tracing::info!(
            project = %self.name(),
            workflow = %spec.path,
            watch = spec.watch,
            "Submitting workflow"
        );

        let path = format!("/api/v1/projects/{}/workflows", self.name());
        let mut run: WorkflowRun = self.client().post_json(&path, &spec).await?;

        if !spec.watch {
            return Ok(run);
        }

        let started = Instant::now();
        let timeout = self.client().run_timeout();
        let status_path = format!("/api/v1/projects/{}/workflows/{}", self.name(), run.id);

        while !run.state.is_terminal() {
            if started.elapsed() >= timeout {
                return Err(WorkflowError::WatchTimeout {
                    id: run.id,
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.client().poll_interval()).await;
            run = self.client().get_json(&status_path).await?;
            tracing::debug!(workflow_run = %run.id, state = %run.state, "Polled workflow status");
        }

        match run.state {
            WorkflowState::Succeeded => {
                tracing::info!(workflow_run = %run.id, "Workflow succeeded");
                Ok(run)
            }
            state => Err(WorkflowError::WorkflowFailed {
                id: run.id,
                state: state.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builders() {
        let spec = WorkflowSpec::new("./workflow.py")
            .with_argument("model_name", "cancer_classifier")
            .watch();
        assert_eq!(spec.path, "./workflow.py");
        assert!(spec.watch);
        assert!(!spec.local);
        assert_eq!(
            spec.arguments.get("model_name"),
            Some(&serde_json::json!("cancer_classifier"))
        );
    }

    #[test]
    fn test_spec_serialization() {
        let spec = WorkflowSpec::new("./workflow.py").with_argument("epochs", 5);
        let json = serde_json::to_string(&spec).expect("serialize");
        assert!(json.contains("\"path\":\"./workflow.py\""));
        assert!(json.contains("\"epochs\":5"));
        assert!(json.contains("\"watch\":false"));
    }

    #[test]
    fn test_workflow_state_terminal() {
        assert!(WorkflowState::Succeeded.is_terminal());
        assert!(WorkflowState::Failed.is_terminal());
        assert!(!WorkflowState::Running.is_terminal());
        assert!(!WorkflowState::Unknown.is_terminal());
    }

    #[test]
    fn test_workflow_state_unknown_string() {
        let state: WorkflowState = serde_json::from_str("\"queued\"").expect("deserialize");
        assert_eq!(state, WorkflowState::Unknown);
    }
}
