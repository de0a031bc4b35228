//! Function specifications for platform registration.
//!
//! A function is the platform's unit of remote execution: a named source
//! file packaged into a container image, registered against a project
//! either as a batch job or as a serving endpoint.

use serde::{Deserialize, Serialize};

/// Kind of a platform function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    /// Batch job executed to completion.
    Job,
    /// Long-lived serving endpoint wrapping a model.
    Serving,
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Job => write!(f, "job"),
            FunctionKind::Serving => write!(f, "serving"),
        }
    }
}

/// Specification of a function to register with the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function name, unique within the project.
    pub name: String,
    /// Source file the platform packages (e.g., "trainer.py").
    pub source: String,
    /// Optional handler entry point inside the source file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// Container image the function runs in.
    pub image: String,
    /// Function kind (batch job vs. serving).
    pub kind: FunctionKind,
    /// Whether the platform should attach its shared data volume.
    pub auto_mount: bool,
}

impl FunctionSpec {
    /// Creates a batch-job function spec.
    pub fn job(
        name: impl Into<String>,
        source: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            handler: None,
            image: image.into(),
            kind: FunctionKind::Job,
            auto_mount: false,
        }
    }

    /// Creates a serving function spec.
    pub fn serving(
        name: impl Into<String>,
        source: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            handler: None,
            image: image.into(),
            kind: FunctionKind::Serving,
            auto_mount: false,
        }
    }

    /// Sets the handler entry point.
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Requests the platform's shared data volume on the function pod.
    pub fn with_auto_mount(mut self) -> Self {
        self.auto_mount = true;
        self
    }

    /// Renders the spec as YAML, the format the platform's tooling uses for
    /// function manifests.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
