//! Pipeline orchestration.
//!
//! The pipeline is a linear sequence of remote platform calls:
//!
//! 1. **Project setup**: register the data-generation, trainer, and
//!    serving functions and save the project
//! 2. **Data generation**: run the generator, preview the dataset
//! 3. **Description**: run the hub `describe` function over the dataset
//! 4. **Training**: one run with fixed parameters
//! 5. **Hyperparameter search**: sweep the grid, selected by criterion
//! 6. **Model listing**: log the registry's models and metrics
//! 7. **Serving**: deploy the winning model and post a sample inference
//! 8. **Workflow**: submit the platform-native DAG and wait
//!
//! There is no branching or recovery between stages; the first error
//! aborts the sequence and propagates to the caller.

pub mod config;
pub mod orchestrator;
pub mod sample;

// Re-export main types for convenience
pub use config::PipelineConfig;
pub use orchestrator::{PipelineError, PipelineOrchestrator, PipelineReport, StageRecord};
pub use sample::{sample_inputs, FEATURE_COUNT};
