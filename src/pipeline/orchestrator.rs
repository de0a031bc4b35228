//! Pipeline orchestrator.
//!
//! Sequences the remote stages end to end: data generation, exploratory
//! description, training, hyperparameter search, serving deployment with a
//! sample inference, and the platform-native workflow. The sequence is
//! strictly linear; each stage reads its inputs from the previous stage's
//! outputs, and the first failure aborts the run (failures are the
//! platform's to report, not ours to recover).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

use thiserror::Error;

use crate::config::ConfigError;
use crate::error::{ArtifactError, PlatformError, ServingError, WorkflowError};
use crate::platform::{
    FunctionSpec, InferenceRequest, InferenceResponse, PlatformClient, Project, RunHandle,
    RunSpec, ServingFunction, WorkflowSpec,
};

use super::config::PipelineConfig;
use super::sample::sample_inputs;

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Platform API error.
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Artifact access error.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Serving error.
    #[error("Serving error: {0}")]
    Serving(#[from] ServingError),

    /// Workflow error.
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Record of a single executed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    /// Stage name.
    pub stage: String,
    /// Run uid, for stages backed by a remote run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_uid: Option<String>,
    /// Final state reported for the stage.
    pub state: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Key outputs of the stage (artifact URLs, endpoint, response).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
}

/// Summary of a pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Client-side identifier of this execution.
    pub execution_id: Uuid,
    /// Project the pipeline ran against.
    pub project: String,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// Executed stages, in order.
    pub stages: Vec<StageRecord>,
}

impl PipelineReport {
    fn new(project: &str) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            project: project.to_string(),
            started_at: Utc::now(),
            stages: Vec::new(),
        }
    }

    /// Total wall-clock time across stages, in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.stages.iter().map(|s| s.duration_ms).sum()
    }

    /// Renders the report as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn push_run_stage(&mut self, stage: &str, handle: &RunHandle, started: Instant) {
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            run_uid: Some(handle.uid().to_string()),
            state: handle.state().to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            outputs: handle.outputs().clone(),
        });
    }

    fn push_stage(
        &mut self,
        stage: &str,
        state: &str,
        started: Instant,
        outputs: BTreeMap<String, String>,
    ) {
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            run_uid: None,
            state: state.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            outputs,
        });
    }
}

/// Coordinates the end-to-end pipeline against the platform.
pub struct PipelineOrchestrator {
    client: PlatformClient,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator after validating the configuration.
    pub fn new(client: PlatformClient, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline: project setup, data generation, description,
    /// training, hyperparameter search, model listing, serving with a
    /// sample inference, and (unless disabled) the workflow.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::new(&self.config.project);
        tracing::info!(
            execution_id = %report.execution_id,
            project = %report.project,
            "Starting pipeline"
        );

        let mut project = self.setup_project(&mut report).await?;
        let dataset_url = self.generate_data(&project, &mut report).await?;
        self.describe(&mut project, &dataset_url, &mut report).await?;
        self.train(&project, &dataset_url, &mut report).await?;
        let model_path = self
            .hyperparameter_search(&project, &dataset_url, &mut report)
            .await?;
        self.list_models(&project, &mut report).await?;
        self.serve(&project, &model_path, &sample_inputs(), &mut report)
            .await?;

        if self.config.run_workflow {
            self.workflow(&project, &mut report).await?;
        } else {
            tracing::info!("Workflow stage disabled, skipping");
        }

        tracing::info!(
            project = %report.project,
            stages = report.stages.len(),
            total_ms = report.total_duration_ms(),
            "Pipeline finished"
        );

        Ok(report)
    }

    /// Runs the training portion only: setup, data generation, description,
    /// training, hyperparameter search, and model listing.
    pub async fn run_training(&self) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::new(&self.config.project);

        let mut project = self.setup_project(&mut report).await?;
        let dataset_url = self.generate_data(&project, &mut report).await?;
        self.describe(&mut project, &dataset_url, &mut report).await?;
        self.train(&project, &dataset_url, &mut report).await?;
        self.hyperparameter_search(&project, &dataset_url, &mut report)
            .await?;
        self.list_models(&project, &mut report).await?;

        Ok(report)
    }

    /// Deploys the serving function against an existing model artifact and
    /// posts an inference batch (the bundled sample when none is given).
    pub async fn run_serving(
        &self,
        model_path: &str,
        inputs: Option<InferenceRequest>,
    ) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::new(&self.config.project);

        let mut project = Project::create(&self.client, &self.config.project).await?;
        project
            .set_function(
                FunctionSpec::serving(
                    &self.config.serving_function,
                    &self.config.serving_source,
                    &self.config.image,
                )
                .with_auto_mount(),
            )
            .await?;

        let inputs = inputs.unwrap_or_else(sample_inputs);
        self.serve(&project, model_path, &inputs, &mut report).await?;
        Ok(report)
    }

    /// Submits the workflow definition alone.
    pub async fn run_workflow_only(&self) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::new(&self.config.project);
        let project = Project::create(&self.client, &self.config.project).await?;
        self.workflow(&project, &mut report).await?;
        Ok(report)
    }

    /// Stage 1: ensure the project exists, register the batch and serving
    /// functions, and persist the project.
    async fn setup_project(&self, report: &mut PipelineReport) -> Result<Project, PipelineError> {
        let started = Instant::now();
        let config = &self.config;

        let mut project = Project::create(&self.client, &config.project).await?;

        project
            .set_function(
                FunctionSpec::job(&config.gen_function, &config.gen_source, &config.image)
                    .with_auto_mount(),
            )
            .await?;
        project
            .set_function(
                FunctionSpec::job(&config.trainer_function, &config.trainer_source, &config.image)
                    .with_handler(&config.trainer_handler)
                    .with_auto_mount(),
            )
            .await?;
        project
            .set_function(
                FunctionSpec::serving(
                    &config.serving_function,
                    &config.serving_source,
                    &config.image,
                )
                .with_auto_mount(),
            )
            .await?;
        project.save().await?;

        report.push_stage(
            "project-setup",
            "completed",
            started,
            BTreeMap::from([("project".to_string(), project.name().to_string())]),
        );
        Ok(project)
    }

    /// Stage 2: run the data generator and preview the dataset artifact.
    async fn generate_data(
        &self,
        project: &Project,
        report: &mut PipelineReport,
    ) -> Result<String, PipelineError> {
        let started = Instant::now();

        let run = project
            .run_function(
                RunSpec::new(&self.config.gen_function)
                    .with_param("format", self.config.data_format.as_str()),
            )
            .await?;

        let dataset_url = run.output("dataset")?.to_string();
        let artifact = run.artifact("dataset")?;
        tracing::info!(url = %artifact.url, "Dataset artifact ready");

        let preview = artifact
            .as_data_item(&self.client)
            .preview_csv(self.config.preview_rows)
            .await?;
        println!("{}", preview);

        report.push_run_stage("generate-data", &run, started);
        Ok(dataset_url)
    }

    /// Stage 3: import the hub description function and run it over the
    /// dataset.
    async fn describe(
        &self,
        project: &mut Project,
        dataset_url: &str,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let started = Instant::now();

        let describe = project.import_function(&self.config.describe_uri).await?;
        let run = project
            .run_function(
                RunSpec::new(&describe.name)
                    .with_param("label_column", self.config.label_column.as_str())
                    .with_input("table", dataset_url),
            )
            .await?;

        report.push_run_stage("describe", &run, started);
        Ok(())
    }

    /// Stage 4: single training run with fixed parameters.
    async fn train(
        &self,
        project: &Project,
        dataset_url: &str,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let started = Instant::now();

        let mut spec =
            RunSpec::new(&self.config.trainer_function).with_input("dataset", dataset_url);
        for (name, value) in &self.config.train_params {
            spec = spec.with_param(name, value.clone());
        }

        let run = project.run_function(spec).await?;
        report.push_run_stage("train", &run, started);
        Ok(())
    }

    /// Stage 5: hyperparameter sweep over the trainer; returns the winning
    /// run's model artifact URL.
    async fn hyperparameter_search(
        &self,
        project: &Project,
        dataset_url: &str,
        report: &mut PipelineReport,
    ) -> Result<String, PipelineError> {
        let started = Instant::now();

        let run = project
            .run_function(
                RunSpec::new(&self.config.trainer_function)
                    .with_input("dataset", dataset_url)
                    .with_hyperparams(
                        self.config.hyperparams.clone(),
                        self.config.selector.clone(),
                    ),
            )
            .await?;

        let model_path = run.output("model")?.to_string();
        tracing::info!(
            selector = %self.config.selector,
            model = %model_path,
            "Hyperparameter search selected a model"
        );

        report.push_run_stage("hyperparameter-search", &run, started);
        Ok(model_path)
    }

    /// Stage 6: list the project's models with their metrics.
    async fn list_models(
        &self,
        project: &Project,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let started = Instant::now();

        let models = project.list_models().await?;
        for model in &models {
            tracing::info!(uri = %model.uri, metrics = ?model.metrics, "Registered model");
        }

        report.push_stage(
            "list-models",
            "completed",
            started,
            BTreeMap::from([("count".to_string(), models.len().to_string())]),
        );
        Ok(())
    }

    /// Stage 7: build and deploy the serving function, then post the given
    /// batch to the versioned inference route.
    async fn serve(
        &self,
        project: &Project,
        model_path: &str,
        inputs: &InferenceRequest,
        report: &mut PipelineReport,
    ) -> Result<InferenceResponse, PipelineError> {
        let started = Instant::now();
        let config = &self.config;

        let spec = FunctionSpec::serving(
            &config.serving_function,
            &config.serving_source,
            &config.image,
        )
        .with_auto_mount();

        let mut serving = ServingFunction::from_spec(&self.client, project.name(), spec);
        serving.add_model(&config.model_name, model_path, &config.model_class)?;
        serving.deploy().await?;

        let response = serving.infer(&config.model_name, inputs).await?;
        tracing::info!(
            model = %config.model_name,
            response = %response.outputs,
            "Sample inference succeeded"
        );

        let mut outputs = BTreeMap::from([
            ("model".to_string(), model_path.to_string()),
            ("response".to_string(), response.outputs.to_string()),
        ]);
        if let Some(endpoint) = serving.endpoint() {
            outputs.insert("endpoint".to_string(), endpoint.to_string());
        }

        report.push_stage("serve", "deployed", started, outputs);
        Ok(response)
    }

    /// Stage 8: submit the workflow definition and wait for the DAG.
    async fn workflow(
        &self,
        project: &Project,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let started = Instant::now();

        let run = project
            .run_workflow(
                WorkflowSpec::new(&self.config.workflow_path)
                    .with_argument(
                        "model_name",
                        self.config.workflow_model_name.as_str(),
                    )
                    .watch(),
            )
            .await?;

        report.push_stage(
            "workflow",
            &run.state.to_string(),
            started,
            BTreeMap::from([("run_id".to_string(), run.id)]),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;

    fn orchestrator() -> PipelineOrchestrator {
        let client = PlatformClient::new(PlatformConfig::new("http://localhost:8080"));
        PipelineOrchestrator::new(client, PipelineConfig::default()).expect("valid config")
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let client = PlatformClient::new(PlatformConfig::new("http://localhost:8080"));
        let config = PipelineConfig::default().with_project("");
        assert!(matches!(
            PipelineOrchestrator::new(client, config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_report_total_duration() {
        let mut report = PipelineReport::new("demo");
        report.push_stage("a", "completed", Instant::now(), BTreeMap::new());
        report.push_stage("b", "completed", Instant::now(), BTreeMap::new());
        assert_eq!(report.stages.len(), 2);
        // Freshly-started instants measure near-zero durations
        assert!(report.total_duration_ms() < 1000);
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = PipelineReport::new("demo");
        report.push_stage(
            "serve",
            "deployed",
            Instant::now(),
            BTreeMap::from([("endpoint".to_string(), "http://svc".to_string())]),
        );
        let json = report.to_json_pretty().expect("serialize");
        assert!(json.contains("\"project\": \"demo\""));
        assert!(json.contains("\"stage\": \"serve\""));
        assert!(json.contains("\"endpoint\": \"http://svc\""));
        // Stages without a run uid omit the field entirely
        assert!(!json.contains("run_uid"));
    }

    #[test]
    fn test_orchestrator_exposes_config() {
        let orchestrator = orchestrator();
        assert_eq!(orchestrator.config().project, "breast-cancer");
    }
}
