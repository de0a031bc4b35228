//! Integration tests for the pipeline against a mocked platform API.
//!
//! Every remote capability is stubbed with httpmock; the tests assert the
//! orchestrator's call sequence, output threading, and failure propagation.

use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

use mlpipe::config::PlatformConfig;
use mlpipe::pipeline::{PipelineConfig, PipelineOrchestrator};
use mlpipe::platform::PlatformClient;

fn test_client(server: &MockServer) -> PlatformClient {
    PlatformClient::new(
        PlatformConfig::new(server.base_url())
            .with_artifact_base(server.url("/store"))
            .with_poll_interval(Duration::from_millis(20))
            .with_run_timeout(Duration::from_secs(5)),
    )
}

/// Stubs the project, function, and save endpoints.
fn mock_project_setup(server: &MockServer, project: &str) {
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/projects");
        then.status(200).json_body(json!({ "name": project }));
    });
    for function in ["gen-cancer-data", "trainer", "serving", "describe"] {
        server.mock(|when, then| {
            when.method(POST).path(format!(
                "/api/v1/projects/{}/functions/{}",
                project, function
            ));
            then.status(200).json_body(json!({}));
        });
    }
    server.mock(|when, then| {
        when.method(PUT).path(format!("/api/v1/projects/{}", project));
        then.status(200).json_body(json!({}));
    });
}

#[tokio::test]
async fn test_full_pipeline_happy_path() {
    let server = MockServer::start();
    let project = "breast-cancer";
    mock_project_setup(&server, project);

    // Hub resolution for the describe function
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/hub/functions/describe");
        then.status(200).json_body(json!({
            "name": "describe",
            "source": "describe.py",
            "image": "mlops/base",
            "kind": "job",
            "auto_mount": true
        }));
    });

    // Every run completes immediately with both outputs populated
    let runs = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/api/v1/projects/{}/runs", project));
        then.status(200).json_body(json!({
            "uid": "run-1",
            "state": "completed",
            "outputs": {
                "dataset": "/v3io/projects/breast-cancer/dataset.csv",
                "model": "v3io://projects/breast-cancer/model.pkl"
            },
            "results": { "accuracy": 0.97 }
        }));
    });

    // Dataset preview fetch through the artifact gateway
    server.mock(|when, then| {
        when.method(GET)
            .path("/store/projects/breast-cancer/dataset.csv");
        then.status(200)
            .body("mean_radius,mean_texture,label\n13.71,20.83,0\n13.08,15.71,1\n");
    });

    // Model registry listing
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/api/v1/projects/{}/models", project));
        then.status(200).json_body(json!({
            "models": [{
                "uri": "v3io://projects/breast-cancer/model.pkl",
                "key": "model",
                "metrics": { "accuracy": 0.97 }
            }]
        }));
    });

    // Serving deploy reports ready immediately, endpoint on this server
    server.mock(|when, then| {
        when.method(POST).path(format!(
            "/api/v1/projects/{}/functions/serving/deploy",
            project
        ));
        then.status(200).json_body(json!({
            "state": "ready",
            "endpoint": server.url("/serving")
        }));
    });

    // Versioned inference route
    let infer = server.mock(|when, then| {
        when.method(POST)
            .path("/serving/v2/models/cancer-classifier/infer")
            .body_contains("13.71");
        then.status(200).json_body(json!({
            "id": "req-1",
            "model_name": "cancer-classifier",
            "outputs": [0, 1]
        }));
    });

    // Workflow submission succeeds synchronously
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/api/v1/projects/{}/workflows", project));
        then.status(200)
            .json_body(json!({ "id": "wf-1", "state": "succeeded" }));
    });

    let orchestrator =
        PipelineOrchestrator::new(test_client(&server), PipelineConfig::default())
            .expect("valid config");
    let report = orchestrator.run().await.expect("pipeline should succeed");

    let stages: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(
        stages,
        vec![
            "project-setup",
            "generate-data",
            "describe",
            "train",
            "hyperparameter-search",
            "list-models",
            "serve",
            "workflow"
        ]
    );

    // Four remote runs: generate, describe, train, sweep
    runs.assert_hits(4);
    // The sample batch reached the endpoint exactly once
    infer.assert_hits(1);

    let serve = report
        .stages
        .iter()
        .find(|s| s.stage == "serve")
        .expect("serve stage");
    assert_eq!(
        serve.outputs.get("model").map(String::as_str),
        Some("v3io://projects/breast-cancer/model.pkl")
    );
    assert_eq!(serve.outputs.get("response").map(String::as_str), Some("[0,1]"));
}

#[tokio::test]
async fn test_run_polls_until_terminal_state() {
    let server = MockServer::start();
    let project = "breast-cancer";
    mock_project_setup(&server, project);

    // Submission answers "running"; the status endpoint answers "completed"
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/api/v1/projects/{}/runs", project));
        then.status(200)
            .json_body(json!({ "uid": "run-7", "state": "running" }));
    });
    let poll = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/api/v1/projects/{}/runs/run-7", project));
        then.status(200).json_body(json!({
            "uid": "run-7",
            "state": "completed",
            "outputs": { "dataset": "v3io://projects/breast-cancer/dataset.csv" }
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/store/projects/breast-cancer/dataset.csv");
        then.status(200).body("id,label\n1,0\n");
    });

    let orchestrator =
        PipelineOrchestrator::new(test_client(&server), PipelineConfig::default())
            .expect("valid config");

    // Drive only the stages up to data generation via the training path.
    // The describe stage fails on the missing hub mock; the poll must
    // already have happened by then.
    let result = orchestrator.run_training().await;
    assert!(result.is_err());
    assert!(poll.hits() >= 1, "run status should have been polled");
}

#[tokio::test]
async fn test_failed_run_aborts_pipeline() {
    let server = MockServer::start();
    let project = "breast-cancer";
    mock_project_setup(&server, project);

    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/api/v1/projects/{}/runs", project));
        then.status(200).json_body(json!({
            "uid": "run-9",
            "state": "error",
            "error": "generator crashed"
        }));
    });

    let orchestrator =
        PipelineOrchestrator::new(test_client(&server), PipelineConfig::default())
            .expect("valid config");
    let err = orchestrator.run().await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("run-9"), "unexpected error: {}", message);
    assert!(
        message.contains("generator crashed"),
        "unexpected error: {}",
        message
    );
}

#[tokio::test]
async fn test_deploy_polls_status_until_ready() {
    let server = MockServer::start();
    let project = "breast-cancer";
    mock_project_setup(&server, project);

    // Deploy starts in "deploying"; the status endpoint reports "ready"
    server.mock(|when, then| {
        when.method(POST).path(format!(
            "/api/v1/projects/{}/functions/serving/deploy",
            project
        ));
        then.status(200).json_body(json!({ "state": "deploying" }));
    });
    let status = server.mock(|when, then| {
        when.method(GET).path(format!(
            "/api/v1/projects/{}/functions/serving/deploy/status",
            project
        ));
        then.status(200).json_body(json!({
            "state": "ready",
            "endpoint": server.url("/serving")
        }));
    });
    let infer = server.mock(|when, then| {
        when.method(POST)
            .path("/serving/v2/models/cancer-classifier/infer");
        then.status(200).json_body(json!({ "outputs": [1] }));
    });

    let orchestrator =
        PipelineOrchestrator::new(test_client(&server), PipelineConfig::default())
            .expect("valid config");
    let report = orchestrator
        .run_serving("v3io://projects/breast-cancer/model.pkl", None)
        .await
        .expect("serving should deploy");

    status.assert_hits(1);
    infer.assert_hits(1);
    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].stage, "serve");
    assert_eq!(report.stages[0].state, "deployed");
}

#[tokio::test]
async fn test_failed_workflow_surfaces_error() {
    let server = MockServer::start();
    let project = "breast-cancer";
    mock_project_setup(&server, project);

    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/api/v1/projects/{}/workflows", project));
        then.status(200)
            .json_body(json!({ "id": "wf-2", "state": "failed" }));
    });

    let orchestrator =
        PipelineOrchestrator::new(test_client(&server), PipelineConfig::default())
            .expect("valid config");
    let err = orchestrator.run_workflow_only().await.unwrap_err();
    assert!(err.to_string().contains("wf-2"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_platform_error_body_is_surfaced() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/api/v1/projects");
        then.status(400)
            .json_body(json!({ "detail": "project name is reserved" }));
    });

    let orchestrator =
        PipelineOrchestrator::new(test_client(&server), PipelineConfig::default())
            .expect("valid config");
    let err = orchestrator.run().await.unwrap_err();
    assert!(
        err.to_string().contains("project name is reserved"),
        "unexpected error: {}",
        err
    );
}
