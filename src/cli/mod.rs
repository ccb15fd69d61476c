//! Command-line interface for ci-pilot.
//!
//! Provides the `run` command that executes the full bootstrap-and-build
//! sequence against a local Docker daemon and a Jenkins control plane.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
