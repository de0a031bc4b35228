//! Command-line interface for mlpipe.
//!
//! Provides commands for running the end-to-end pipeline, the training
//! portion alone, serving deployment, and workflow submission.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
