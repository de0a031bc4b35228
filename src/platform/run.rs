//! Run submission and tracking.
//!
//! A run is a single remote execution of a registered function. The
//! platform schedules it, stores its outputs as named artifacts, and for
//! hyperparameter runs sweeps the submitted grid and reports the winner
//! selected by the given criterion. Locally a run is only a handle: a uid,
//! a state to poll, and an outputs map to read.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::{ArtifactError, PlatformError};
use crate::platform::artifact::{to_store_url, ArtifactRef};
use crate::platform::client::PlatformClient;

/// Direction of a hyperparameter selection criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Best {
    /// Pick the trial maximizing the metric.
    Max,
    /// Pick the trial minimizing the metric.
    Min,
}

/// Selection criterion for a hyperparameter sweep, e.g. `max.accuracy`.
///
/// The criterion is parsed for validation and logging only; trial selection
/// itself happens on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Whether the metric is maximized or minimized.
    pub direction: Best,
    /// Name of the result metric the platform compares.
    pub metric: String,
}

impl Selector {
    /// Picks the trial with the highest value of `metric`.
    pub fn max(metric: impl Into<String>) -> Self {
        Self {
            direction: Best::Max,
            metric: metric.into(),
        }
    }

    /// Picks the trial with the lowest value of `metric`.
    pub fn min(metric: impl Into<String>) -> Self {
        Self {
            direction: Best::Min,
            metric: metric.into(),
        }
    }

    /// Parses the platform's dotted form (`max.accuracy`, `min.loss`).
    pub fn parse(input: &str) -> Result<Self, PlatformError> {
        let (direction, metric) =
            input
                .split_once('.')
                .ok_or_else(|| PlatformError::InvalidSelector {
                    input: input.to_string(),
                    reason: "expected '<max|min>.<metric>'".to_string(),
                })?;

        let direction = match direction {
            "max" => Best::Max,
            "min" => Best::Min,
            other => {
                return Err(PlatformError::InvalidSelector {
                    input: input.to_string(),
                    reason: format!("unknown direction '{}'", other),
                })
            }
        };

        if metric.is_empty() {
            return Err(PlatformError::InvalidSelector {
                input: input.to_string(),
                reason: "metric name is empty".to_string(),
            });
        }

        Ok(Self {
            direction,
            metric: metric.to_string(),
        })
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = match self.direction {
            Best::Max => "max",
            Best::Min => "min",
        };
        write!(f, "{}.{}", direction, self.metric)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Selector::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Hyperparameter grid: parameter name to candidate values.
///
/// The grid is sent to the platform verbatim; it is never expanded locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperParamGrid(pub BTreeMap<String, Vec<serde_json::Value>>);

impl HyperParamGrid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter with its candidate values.
    pub fn with_values(
        mut self,
        name: impl Into<String>,
        values: Vec<serde_json::Value>,
    ) -> Self {
        self.0.insert(name.into(), values);
        self
    }

    /// Whether the grid has no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of trial combinations the platform will sweep.
    pub fn combinations(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(|v| v.len().max(1)).product()
    }
}

/// Specification of a remote run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSpec {
    /// Name of the registered function to execute.
    pub function: String,
    /// Scalar parameters passed to the function.
    pub params: BTreeMap<String, serde_json::Value>,
    /// Input artifacts, keyed by input name, valued by artifact URL.
    pub inputs: BTreeMap<String, String>,
    /// Hyperparameter grid for sweep runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperparams: Option<HyperParamGrid>,
    /// Selection criterion for sweep runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
    /// Whether to execute locally on the platform's client node instead of
    /// scheduling a remote job.
    pub local: bool,
}

impl RunSpec {
    /// Creates a remote run spec for the given function.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            params: BTreeMap::new(),
            inputs: BTreeMap::new(),
            hyperparams: None,
            selector: None,
            local: false,
        }
    }

    /// Adds a scalar parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Adds an input artifact by URL.
    pub fn with_input(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), url.into());
        self
    }

    /// Attaches a hyperparameter grid and its selection criterion.
    pub fn with_hyperparams(mut self, grid: HyperParamGrid, selector: Selector) -> Self {
        self.hyperparams = Some(grid);
        self.selector = Some(selector);
        self
    }

    /// Requests local execution.
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }
}

/// State of a remote run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Accepted but not yet scheduled.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
    /// Cancelled before completion.
    Aborted,
    /// State string the client does not recognize.
    #[serde(other)]
    Unknown,
}

impl RunState {
    /// Whether the run has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Error | RunState::Aborted)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Error => write!(f, "error"),
            RunState::Aborted => write!(f, "aborted"),
            RunState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Status payload returned by the platform for a run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunStatus {
    /// Unique run identifier.
    pub uid: String,
    /// Current state.
    pub state: RunState,
    /// Named outputs, valued by artifact URL. Populated on completion.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Named result metrics (e.g. accuracy) reported by the function.
    #[serde(default)]
    pub results: BTreeMap<String, serde_json::Value>,
    /// Platform-reported failure reason, if any.
    #[serde(default)]
    pub error: Option<String>,
}

/// Handle on a submitted run.
///
/// Exposes completion state and named outputs; refreshing and waiting go
/// back through the platform API.
#[derive(Debug, Clone)]
pub struct RunHandle {
    client: PlatformClient,
    project: String,
    status: RunStatus,
}

impl RunHandle {
    pub(crate) fn new(client: PlatformClient, project: impl Into<String>, status: RunStatus) -> Self {
        Self {
            client,
            project: project.into(),
            status,
        }
    }

    /// Unique run identifier.
    pub fn uid(&self) -> &str {
        &self.status.uid
    }

    /// Last observed state.
    pub fn state(&self) -> RunState {
        self.status.state
    }

    /// Named outputs, valued by artifact URL.
    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.status.outputs
    }

    /// Named result metrics reported by the function.
    pub fn results(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.status.results
    }

    /// URL of a single named output.
    pub fn output(&self, name: &str) -> Result<&str, ArtifactError> {
        self.status
            .outputs
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ArtifactError::OutputNotFound(name.to_string()))
    }

    /// Resolves a named output into an [`ArtifactRef`] with a normalized
    /// store URL.
    pub fn artifact(&self, name: &str) -> Result<ArtifactRef, ArtifactError> {
        let raw = self.output(name)?;
        Ok(ArtifactRef::new(name, to_store_url(raw)))
    }

    /// Re-reads the run status from the platform.
    pub async fn refresh(&mut self) -> Result<(), PlatformError> {
        let path = format!(
            "/api/v1/projects/{}/runs/{}",
            self.project, self.status.uid
        );
        self.status = self.client.get_json(&path).await?;
        Ok(())
    }

    /// Polls the run until it reaches a terminal state.
    ///
    /// A run ending in `error` or `aborted` is returned as an error carrying
    /// the platform's failure reason; there is no local recovery.
    pub async fn wait_for_completion(&mut self) -> Result<(), PlatformError> {
        let started = Instant::now();
        let timeout = self.client.run_timeout();
        let interval = self.client.poll_interval();

        loop {
            if self.status.state.is_terminal() {
                break;
            }
            if started.elapsed() >= timeout {
                return Err(PlatformError::RunTimeout {
                    uid: self.status.uid.clone(),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(interval).await;
            self.refresh().await?;
            tracing::debug!(
                run_uid = %self.status.uid,
                state = %self.status.state,
                "Polled run status"
            );
        }

        match self.status.state {
            RunState::Completed => Ok(()),
            state => Err(PlatformError::RunFailed {
                uid: self.status.uid.clone(),
                state: state.to_string(),
                reason: self
                    .status
                    .error
                    .clone()
                    .unwrap_or_else(|| "no failure reason reported".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_parse_max() {
        let selector = Selector::parse("max.accuracy").expect("parse");
        assert_eq!(selector.direction, Best::Max);
        assert_eq!(selector.metric, "accuracy");
    }

    #[test]
    fn test_selector_parse_min() {
        let selector = Selector::parse("min.loss").expect("parse");
        assert_eq!(selector.direction, Best::Min);
        assert_eq!(selector.metric, "loss");
    }

    #[test]
    fn test_selector_parse_rejects_missing_dot() {
        assert!(Selector::parse("accuracy").is_err());
    }

    #[test]
    fn test_selector_parse_rejects_unknown_direction() {
        let err = Selector::parse("best.accuracy").unwrap_err();
        assert!(matches!(err, PlatformError::InvalidSelector { .. }));
    }

    #[test]
    fn test_selector_parse_rejects_empty_metric() {
        assert!(Selector::parse("max.").is_err());
    }

    #[test]
    fn test_selector_display_round_trip() {
        let selector = Selector::max("accuracy");
        assert_eq!(selector.to_string(), "max.accuracy");
        assert_eq!(Selector::parse(&selector.to_string()).expect("parse"), selector);
    }

    #[test]
    fn test_selector_serializes_as_string() {
        let json = serde_json::to_string(&Selector::min("loss")).expect("serialize");
        assert_eq!(json, "\"min.loss\"");
    }

    #[test]
    fn test_grid_combinations() {
        let grid = HyperParamGrid::new()
            .with_values("n_estimators", vec![json!(10), json!(100), json!(1000)])
            .with_values("learning_rate", vec![json!(0.1), json!(0.001)])
            .with_values("max_depth", vec![json!(2), json!(8)]);
        assert_eq!(grid.combinations(), 12);
    }

    #[test]
    fn test_grid_empty() {
        let grid = HyperParamGrid::new();
        assert!(grid.is_empty());
        assert_eq!(grid.combinations(), 0);
    }

    #[test]
    fn test_run_spec_serialization_omits_empty_sweep() {
        let spec = RunSpec::new("trainer")
            .with_param("n_estimators", 100)
            .with_input("dataset", "v3io://projects/demo/dataset.csv");
        let json = serde_json::to_string(&spec).expect("serialize");
        assert!(json.contains("\"function\":\"trainer\""));
        assert!(json.contains("\"local\":false"));
        assert!(!json.contains("hyperparams"));
        assert!(!json.contains("selector"));
    }

    #[test]
    fn test_run_spec_serialization_with_sweep() {
        let spec = RunSpec::new("trainer").with_hyperparams(
            HyperParamGrid::new().with_values("max_depth", vec![json!(2), json!(8)]),
            Selector::max("accuracy"),
        );
        let json = serde_json::to_string(&spec).expect("serialize");
        assert!(json.contains("\"selector\":\"max.accuracy\""));
        assert!(json.contains("\"max_depth\":[2,8]"));
    }

    #[test]
    fn test_run_state_terminal() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Error.is_terminal());
        assert!(RunState::Aborted.is_terminal());
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn test_run_state_unknown_string() {
        let state: RunState = serde_json::from_str("\"created\"").expect("deserialize");
        assert_eq!(state, RunState::Unknown);
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_run_status_defaults() {
        let status: RunStatus =
            serde_json::from_str(r#"{"uid": "abc", "state": "running"}"#).expect("deserialize");
        assert_eq!(status.uid, "abc");
        assert_eq!(status.state, RunState::Running);
        assert!(status.outputs.is_empty());
        assert!(status.results.is_empty());
        assert!(status.error.is_none());
    }
}
