// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner trait definitions.
//!
//! Defines the abstract interface for launching the external model programs.

use std::path::PathBuf;

use async_trait::async_trait;
use cropsim_core::Crop;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from runner operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// Binary executable was not found.
    #[error("Binary not found: {0}")]
    BinaryNotFound(String),

    /// Process failed to start.
    #[error("Process start failed: {0}")]
    StartFailed(String),

    /// Process exited with non-zero code.
    #[error("Exit code {exit_code}: {stderr}")]
    ExitCode {
        /// Exit code from the process.
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// External program a run launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// Soil grid generator (`CreateSoilFiles.exe`), producing `{site}.grd`.
    GridGenerator,
    /// Crop model executable for the crop.
    CropModel(Crop),
}

/// Options for launching a program.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run the program belongs to
    pub run_id: i64,
    /// What to launch
    pub program: Program,
    /// Site name; base name of the layer, grid and run files
    pub site: String,
    /// Soil profile name
    pub soil: String,
    /// Absolute working directory, also the process cwd
    pub workdir: PathBuf,
}

impl LaunchOptions {
    /// Absolute path of the run file handed to the crop model.
    pub fn run_file(&self) -> PathBuf {
        self.workdir.join(format!("Run{}.dat", self.site))
    }
}

/// Result of a completed launch.
#[derive(Debug, Clone)]
pub struct LaunchResult {
    /// Number of stdout lines the program printed.
    pub stdout_lines: u64,
    /// Execution duration in milliseconds.
    pub duration_ms: u64,
}

/// Trait for program runners.
///
/// Runners are PURE execution engines - they do NOT access the database.
/// Status updates derived from the output are handled by the caller.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Runner type identifier (e.g., "native", "mock")
    fn runner_type(&self) -> &'static str;

    /// Run a program to completion.
    ///
    /// Each stdout line is sent to `stdout` if given; the sender is dropped
    /// when the program exits so a receiver loop ends with it. A non-zero
    /// exit is [`RunnerError::ExitCode`].
    async fn run(
        &self,
        options: &LaunchOptions,
        stdout: Option<mpsc::UnboundedSender<String>>,
    ) -> Result<LaunchResult>;
}
