//! Pipeline configuration.
//!
//! Defaults describe the bundled breast-cancer classifier demo: a data
//! generation job, the hub `describe` function, a trainer run plus a
//! hyperparameter sweep over it, a serving deployment, and a workflow
//! definition. Every value can be overridden programmatically; the common
//! ones also read from the environment.

use serde_json::json;
use std::collections::BTreeMap;

use crate::config::ConfigError;
use crate::platform::{HyperParamGrid, Selector};

/// Configuration for the pipeline orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Project settings
    /// Project namespace on the platform.
    pub project: String,
    /// Container image the functions run in.
    pub image: String,

    // Function settings
    /// Name of the data-generation function.
    pub gen_function: String,
    /// Source file of the data-generation function.
    pub gen_source: String,
    /// Output format requested from the data generator.
    pub data_format: String,
    /// Marketplace URI of the exploratory description function.
    pub describe_uri: String,
    /// Name of the trainer function.
    pub trainer_function: String,
    /// Source file of the trainer function.
    pub trainer_source: String,
    /// Handler entry point inside the trainer source.
    pub trainer_handler: String,
    /// Name of the serving function.
    pub serving_function: String,
    /// Source file of the serving function.
    pub serving_source: String,

    // Training settings
    /// Label column of the generated dataset.
    pub label_column: String,
    /// Fixed parameters for the single training run.
    pub train_params: BTreeMap<String, serde_json::Value>,
    /// Grid for the hyperparameter sweep.
    pub hyperparams: HyperParamGrid,
    /// Selection criterion for the sweep.
    pub selector: Selector,

    // Serving settings
    /// Name the model is served under.
    pub model_name: String,
    /// Handler class that loads and applies the model.
    pub model_class: String,

    // Workflow settings
    /// Path of the workflow definition file.
    pub workflow_path: String,
    /// Model name argument passed to the workflow.
    pub workflow_model_name: String,
    /// Whether the end-to-end run submits the workflow.
    pub run_workflow: bool,

    // Console settings
    /// Number of dataset rows previewed after data generation.
    pub preview_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // Project defaults
            project: "breast-cancer".to_string(),
            image: "mlops/base".to_string(),

            // Function defaults
            gen_function: "gen-cancer-data".to_string(),
            gen_source: "gen_cancer_data.py".to_string(),
            data_format: "csv".to_string(),
            describe_uri: "hub://describe".to_string(),
            trainer_function: "trainer".to_string(),
            trainer_source: "trainer.py".to_string(),
            trainer_handler: "train".to_string(),
            serving_function: "serving".to_string(),
            serving_source: "serving.py".to_string(),

            // Training defaults
            label_column: "label".to_string(),
            train_params: BTreeMap::from([
                ("n_estimators".to_string(), json!(100)),
                ("learning_rate".to_string(), json!(0.1)),
                ("max_depth".to_string(), json!(3)),
            ]),
            hyperparams: HyperParamGrid::new()
                .with_values("n_estimators", vec![json!(10), json!(100), json!(1000)])
                .with_values("learning_rate", vec![json!(0.1), json!(0.001)])
                .with_values("max_depth", vec![json!(2), json!(8)]),
            selector: Selector::max("accuracy"),

            // Serving defaults
            model_name: "cancer-classifier".to_string(),
            model_class: "ClassifierModel".to_string(),

            // Workflow defaults
            workflow_path: "./workflow.py".to_string(),
            workflow_model_name: "breast_cancer_classifier".to_string(),
            run_workflow: true,

            // Console defaults
            preview_rows: 5,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables over the defaults.
    ///
    /// # Environment Variables
    ///
    /// - `MLPIPE_PROJECT`: Project namespace (default: breast-cancer)
    /// - `MLPIPE_IMAGE`: Function container image (default: mlops/base)
    /// - `MLPIPE_SELECTOR`: Sweep selection criterion (default: max.accuracy)
    /// - `MLPIPE_WORKFLOW_PATH`: Workflow definition path (default: ./workflow.py)
    /// - `MLPIPE_SKIP_WORKFLOW`: Skip the workflow stage when set to "1" or "true"
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MLPIPE_PROJECT") {
            config.project = val;
        }

        if let Ok(val) = std::env::var("MLPIPE_IMAGE") {
            config.image = val;
        }

        if let Ok(val) = std::env::var("MLPIPE_SELECTOR") {
            config.selector = Selector::parse(&val).map_err(|e| ConfigError::InvalidValue {
                key: "MLPIPE_SELECTOR".to_string(),
                message: e.to_string(),
            })?;
        }

        if let Ok(val) = std::env::var("MLPIPE_WORKFLOW_PATH") {
            config.workflow_path = val;
        }

        if let Ok(val) = std::env::var("MLPIPE_SKIP_WORKFLOW") {
            config.run_workflow = !matches!(val.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the project namespace.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Sets the function container image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Disables the workflow stage of the end-to-end run.
    pub fn skip_workflow(mut self) -> Self {
        self.run_workflow = false;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "project must not be empty".to_string(),
            ));
        }
        if self.image.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "image must not be empty".to_string(),
            ));
        }
        if self.hyperparams.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "hyperparameter grid must not be empty".to_string(),
            ));
        }
        if self.run_workflow && self.workflow_path.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "workflow_path must not be empty when the workflow stage is enabled".to_string(),
            ));
        }
        if self.preview_rows == 0 {
            return Err(ConfigError::ValidationFailed(
                "preview_rows must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.selector.to_string(), "max.accuracy");
        assert_eq!(config.hyperparams.combinations(), 12);
    }

    #[test]
    fn test_default_train_params() {
        let config = PipelineConfig::default();
        assert_eq!(config.train_params.get("n_estimators"), Some(&json!(100)));
        assert_eq!(config.train_params.get("learning_rate"), Some(&json!(0.1)));
        assert_eq!(config.train_params.get("max_depth"), Some(&json!(3)));
    }

    #[test]
    fn test_builder_methods() {
        let config = PipelineConfig::new()
            .with_project("demo")
            .with_image("mlops/custom")
            .skip_workflow();
        assert_eq!(config.project, "demo");
        assert_eq!(config.image, "mlops/custom");
        assert!(!config.run_workflow);
    }

    #[test]
    fn test_validate_rejects_empty_project() {
        let config = PipelineConfig::new().with_project("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_grid() {
        let mut config = PipelineConfig::new();
        config.hyperparams = HyperParamGrid::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_workflow_path() {
        let mut config = PipelineConfig::new();
        config.workflow_path = "  ".to_string();
        assert!(config.validate().is_err());

        config.run_workflow = false;
        assert!(config.validate().is_ok());
    }
}
