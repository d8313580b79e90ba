// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for cropsim-environment.

use thiserror::Error;

/// Environment errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Pipeline operation (catalog, encoding, ingestion, store) failed.
    #[error(transparent)]
    Core(#[from] cropsim_core::Error),

    /// Launching or running an external program failed.
    #[error("Runner error: {0}")]
    Runner(#[from] crate::runner::RunnerError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was not found (never submitted, or failed and deleted).
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    /// The run's output files failed validation.
    #[error("Output rejected: {0}")]
    OutputRejected(String),

    /// Request validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The run's growth output file never appeared.
    #[error("Telemetry not found for run {0}")]
    TelemetryNotFound(i64),
}

/// Result type using Environment Error.
pub type Result<T> = std::result::Result<T, Error>;
