//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use courier::reactor::ReactorError;
use courier::resolver::ResolveError;
use courier::telemetry::TelemetryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("invalid server address: {0}")]
    InvalidAddress(#[from] ResolveError),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] ReactorError),
    #[error("failed to write output: {0}")]
    WriteOutput(#[from] io::Error),
}
