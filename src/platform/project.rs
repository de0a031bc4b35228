//! Project handles and function registration.
//!
//! A project is the platform's namespace for functions, runs, artifacts,
//! and models. The handle here tracks the function set registered through
//! it and fronts run, model-listing, and workflow submission for that
//! namespace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PlatformError;
use crate::platform::client::PlatformClient;
use crate::platform::function::FunctionSpec;
use crate::platform::run::{RunHandle, RunSpec, RunStatus};

/// Scheme prefix for function-marketplace URIs.
const HUB_SCHEME: &str = "hub://";

/// A model tracked by the project's registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    /// Store URI of the model artifact.
    pub uri: String,
    /// Registry key of the model.
    pub key: String,
    /// Metrics recorded for the model (e.g. accuracy).
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    name: String,
}

#[derive(Debug, Serialize)]
struct SaveProjectRequest<'a> {
    name: &'a str,
    functions: &'a [FunctionSpec],
}

/// Handle for a platform project.
#[derive(Debug, Clone)]
pub struct Project {
    client: PlatformClient,
    name: String,
    functions: Vec<FunctionSpec>,
}

impl Project {
    /// Creates (or fetches) a project on the platform and returns a handle.
    pub async fn create(client: &PlatformClient, name: &str) -> Result<Self, PlatformError> {
        let info: ProjectInfo = client
            .post_json("/api/v1/projects", &serde_json::json!({ "name": name }))
            .await?;

        tracing::info!(project = %info.name, "Project ready");

        Ok(Self {
            client: client.clone(),
            // Per-user suffixing is the platform's concern; use whatever
            // name it answered with.
            name: info.name,
            functions: Vec::new(),
        })
    }

    /// Project name as the platform knows it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Functions registered through this handle.
    pub fn functions(&self) -> &[FunctionSpec] {
        &self.functions
    }

    /// Registers a function with the project.
    pub async fn set_function(&mut self, spec: FunctionSpec) -> Result<(), PlatformError> {
        let path = format!("/api/v1/projects/{}/functions/{}", self.name, spec.name);
        let _: serde_json::Value = self.client.post_json(&path, &spec).await?;

        tracing::info!(
            project = %self.name,
            function = %spec.name,
            kind = %spec.kind,
            "Registered function"
        );

        // Replace a previous registration under the same name
        self.functions.retain(|f| f.name != spec.name);
        self.functions.push(spec);
        Ok(())
    }

    /// Persists the accumulated function set on the platform.
    pub async fn save(&self) -> Result<(), PlatformError> {
        let path = format!("/api/v1/projects/{}", self.name);
        let body = SaveProjectRequest {
            name: &self.name,
            functions: &self.functions,
        };
        let _: serde_json::Value = self.client.put_json(&path, &body).await?;
        tracing::debug!(project = %self.name, functions = self.functions.len(), "Saved project");
        Ok(())
    }

    /// Imports a function from the platform's marketplace (`hub://<name>`)
    /// and registers it with this project.
    pub async fn import_function(&mut self, uri: &str) -> Result<FunctionSpec, PlatformError> {
        let name = parse_hub_name(uri)?;
        let path = format!("/api/v1/hub/functions/{}", name);
        let spec: FunctionSpec = self.client.get_json(&path).await?;

        tracing::info!(uri = uri, function = %spec.name, "Imported hub function");

        self.set_function(spec.clone()).await?;
        Ok(spec)
    }

    /// Submits a run of a registered function and blocks until it reaches a
    /// terminal state.
    ///
    /// A run ending in failure is surfaced as an error with the platform's
    /// reason; a completed run is returned with its outputs populated.
    pub async fn run_function(&self, spec: RunSpec) -> Result<RunHandle, PlatformError> {
        if !self.functions.iter().any(|f| f.name == spec.function) {
            return Err(PlatformError::FunctionNotRegistered(spec.function));
        }

        if let Some(selector) = &spec.selector {
            tracing::info!(
                function = %spec.function,
                selector = %selector,
                "Submitting hyperparameter run"
            );
        } else {
            tracing::info!(function = %spec.function, local = spec.local, "Submitting run");
        }

        let path = format!("/api/v1/projects/{}/runs", self.name);
        let status: RunStatus = self.client.post_json(&path, &spec).await?;

        let mut handle = RunHandle::new(self.client.clone(), self.name.clone(), status);
        handle.wait_for_completion().await?;

        tracing::info!(
            run_uid = %handle.uid(),
            state = %handle.state(),
            outputs = handle.outputs().len(),
            "Run finished"
        );

        Ok(handle)
    }

    /// Lists the models in the project's registry.
    pub async fn list_models(&self) -> Result<Vec<ModelEntry>, PlatformError> {
        let path = format!("/api/v1/projects/{}/models", self.name);
        let response: ModelListResponse = self.client.get_json(&path).await?;
        Ok(response.models)
    }

    /// Access to the underlying client.
    pub fn client(&self) -> &PlatformClient {
        &self.client
    }
}

/// Extracts the function name from a `hub://<name>` URI.
fn parse_hub_name(uri: &str) -> Result<&str, PlatformError> {
    let name = uri
        .strip_prefix(HUB_SCHEME)
        .ok_or_else(|| PlatformError::InvalidHubUri(uri.to_string()))?;
    if name.is_empty() || name.contains('/') {
        return Err(PlatformError::InvalidHubUri(uri.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hub_name() {
        assert_eq!(parse_hub_name("hub://describe").expect("parse"), "describe");
    }

    #[test]
    fn test_parse_hub_name_rejects_other_scheme() {
        assert!(parse_hub_name("v3io://describe").is_err());
        assert!(parse_hub_name("describe").is_err());
    }

    #[test]
    fn test_parse_hub_name_rejects_empty_and_nested() {
        assert!(parse_hub_name("hub://").is_err());
        assert!(parse_hub_name("hub://a/b").is_err());
    }

    #[test]
    fn test_model_entry_deserialization() {
        let entry: ModelEntry = serde_json::from_str(
            r#"{"uri": "v3io://projects/demo/model.pkl", "key": "model", "metrics": {"accuracy": 0.97}}"#,
        )
        .expect("deserialize");
        assert_eq!(entry.key, "model");
        assert_eq!(entry.metrics.get("accuracy"), Some(&0.97));
    }

    #[test]
    fn test_model_entry_metrics_default_empty() {
        let entry: ModelEntry =
            serde_json::from_str(r#"{"uri": "v3io://m", "key": "model"}"#).expect("deserialize");
        assert!(entry.metrics.is_empty());
    }
}
