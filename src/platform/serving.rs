//! Serving deployment and inference.
//!
//! A serving function wraps one or more named models behind an inference
//! endpoint. Deployment is platform-side (image build, autoscaling,
//! routing); the client attaches models, requests the deploy, waits for
//! the endpoint, and posts inference payloads to the versioned route.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ServingError;
use crate::platform::client::PlatformClient;
use crate::platform::function::{FunctionKind, FunctionSpec};

/// A named model attached to a serving function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSpec {
    /// Name the model is served under.
    pub name: String,
    /// Store path of the model artifact.
    pub model_path: String,
    /// Handler class that loads and applies the model.
    pub class_name: String,
}

/// State of a serving deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployState {
    Deploying,
    Ready,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct DeployStatus {
    state: DeployState,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    function: &'a FunctionSpec,
    models: &'a [ModelSpec],
}

/// Inference request body: a batch of fixed-length feature vectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceRequest {
    /// Feature vectors, one per prediction.
    pub inputs: Vec<Vec<f64>>,
}

impl InferenceRequest {
    /// Creates a request from feature vectors.
    pub fn new(inputs: Vec<Vec<f64>>) -> Self {
        Self { inputs }
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Inference response from the serving runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceResponse {
    /// Request id assigned by the runtime.
    #[serde(default)]
    pub id: Option<String>,
    /// Name of the model that served the request.
    #[serde(default)]
    pub model_name: Option<String>,
    /// Model outputs, one entry per input row.
    pub outputs: serde_json::Value,
}

/// A serving function and its attached models.
#[derive(Debug, Clone)]
pub struct ServingFunction {
    client: PlatformClient,
    project: String,
    spec: FunctionSpec,
    models: Vec<ModelSpec>,
    endpoint: Option<String>,
}

impl ServingFunction {
    /// Builds a serving function from a source file and image within a
    /// project namespace.
    pub fn from_spec(client: &PlatformClient, project: &str, spec: FunctionSpec) -> Self {
        debug_assert_eq!(spec.kind, FunctionKind::Serving);
        Self {
            client: client.clone(),
            project: project.to_string(),
            spec,
            models: Vec::new(),
            endpoint: None,
        }
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Endpoint URL once deployed.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Models attached so far.
    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    /// Attaches a named model by artifact path and handler class.
    pub fn add_model(
        &mut self,
        name: impl Into<String>,
        model_path: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Result<(), ServingError> {
        let name = name.into();
        if self.models.iter().any(|m| m.name == name) {
            return Err(ServingError::DuplicateModel {
                function: self.spec.name.clone(),
                name,
            });
        }
        self.models.push(ModelSpec {
            name,
            model_path: model_path.into(),
            class_name: class_name.into(),
        });
        Ok(())
    }

    /// Requests deployment and waits until the platform reports the
    /// endpoint ready.
    pub async fn deploy(&mut self) -> Result<(), ServingError> {
        if self.models.is_empty() {
            return Err(ServingError::NoModels(self.spec.name.clone()));
        }

        let path = format!(
            "/api/v1/projects/{}/functions/{}/deploy",
            self.project, self.spec.name
        );
        let request = DeployRequest {
            function: &self.spec,
            models: &self.models,
        };

        tracing::info!(
            function = %self.spec.name,
            models = self.models.len(),
            "Deploying serving function"
        );

        let mut status: DeployStatus = self.client.post_json(&path, &request).await?;

        let started = Instant::now();
        let timeout = self.client.run_timeout();
        let status_path = format!("{}/status", path);

        while status.state == DeployState::Deploying || status.state == DeployState::Unknown {
            if started.elapsed() >= timeout {
                return Err(ServingError::DeployTimeout {
                    function: self.spec.name.clone(),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.client.poll_interval()).await;
            status = self.client.get_json(&status_path).await?;
            tracing::debug!(function = %self.spec.name, state = ?status.state, "Polled deploy status");
        }

        match status.state {
            DeployState::Ready => {
                let endpoint = status.endpoint.ok_or_else(|| ServingError::DeployFailed {
                    function: self.spec.name.clone(),
                    reason: "platform reported ready without an endpoint".to_string(),
                })?;
                tracing::info!(function = %self.spec.name, endpoint = %endpoint, "Serving endpoint ready");
                self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
                Ok(())
            }
            _ => Err(ServingError::DeployFailed {
                function: self.spec.name.clone(),
                reason: status
                    .error
                    .unwrap_or_else(|| "no failure reason reported".to_string()),
            }),
        }
    }

    /// Posts a JSON body to a path on the deployed endpoint.
    pub async fn invoke(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ServingError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| ServingError::NotDeployed(self.spec.name.clone()))?;
        let url = format!("{}{}", endpoint, path);
        self.client
            .post_url(&url, body)
            .await
            .map_err(|e| ServingError::InferenceFailed(e.to_string()))
    }

    /// Posts an inference batch to the versioned route for a named model
    /// (`/v2/models/{name}/infer`).
    pub async fn infer(
        &self,
        model: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, ServingError> {
        let path = infer_path(model);
        let body = serde_json::to_value(request)
            .map_err(|e| ServingError::InferenceFailed(e.to_string()))?;
        let value = self.invoke(&path, &body).await?;
        serde_json::from_value(value).map_err(|e| {
            ServingError::InferenceFailed(format!("unexpected response shape: {}", e))
        })
    }
}

/// Versioned inference route for a model name.
pub fn infer_path(model: &str) -> String {
    format!("/v2/models/{}/infer", urlencoding::encode(model))
}
