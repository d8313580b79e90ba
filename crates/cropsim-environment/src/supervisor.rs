// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run supervisor.
//!
//! Drives one run through its phases as an independent tokio task:
//!
//! ```text
//! QUEUED ─► PREPARING ─► GRID-GENERATING ─► RUNNING (0..=100) ─► VALIDATING ─► COMPLETE
//!              │                │                  │                  │
//!              └────────────────┴──────────────────┴──────────────────┴──► FAILED
//!                                                         (outputs purged, run row deleted)
//! ```
//!
//! The working directory is removed when the run ends, whatever the outcome.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use cropsim_core::output::remove_outputs;
use cropsim_core::{
    AgronomicCatalog, IngestOptions, IngestOutcome, RunInputs, RunRecord, RunStatus, RunStore,
    encode, ingest_run, install_assets,
};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::runner::{LaunchOptions, Program, Runner};

/// Percent complete announced by a crop model stdout line.
///
/// Only lines containing `Progress` count. The first number on the line,
/// integer or decimal, is truncated and clamped to `0..=100`.
pub fn parse_progress(line: &str) -> Option<u8> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();

    if !line.contains("Progress") {
        return None;
    }
    let number = NUMBER
        .get_or_init(|| Regex::new(r"[-+]?\d*\.\d+|\d+").expect("progress pattern is valid"))
        .find(line)?;
    let value: f64 = number.as_str().parse().ok()?;
    Some(value.trunc().clamp(0.0, 100.0) as u8)
}

/// Ids of runs currently owned by a supervisor task.
#[derive(Debug, Default)]
pub struct ActiveRuns {
    ids: Mutex<HashSet<i64>>,
}

impl ActiveRuns {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<i64>> {
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True while a supervisor task owns `run_id`.
    pub fn contains(&self, run_id: i64) -> bool {
        self.lock().contains(&run_id)
    }

    /// Number of runs being supervised.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no run is being supervised.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn claim(self: &Arc<Self>, run_id: i64) -> Option<ActiveClaim> {
        self.lock().insert(run_id).then(|| ActiveClaim {
            runs: Arc::clone(self),
            run_id,
        })
    }
}

/// Releases the run id when dropped.
pub(crate) struct ActiveClaim {
    runs: Arc<ActiveRuns>,
    run_id: i64,
}

impl Drop for ActiveClaim {
    fn drop(&mut self) {
        self.runs.lock().remove(&self.run_id);
    }
}

/// How a supervised run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Outputs stored, status 101.
    Complete,
    /// Run deleted; the message is the error that ended it.
    Failed(String),
}

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Parent of per-run working directories (`{run_dir}/{run_id}`).
    pub run_dir: PathBuf,
    /// Static model assets.
    pub store_dir: PathBuf,
    /// Ingestion switches. Output files are removed after the run is marked
    /// complete.
    pub ingest: IngestOptions,
}

/// Executes runs: prepares inputs, launches the programs, ingests outputs.
pub struct RunSupervisor {
    store: Arc<dyn RunStore>,
    catalog: Arc<dyn AgronomicCatalog>,
    runner: Arc<dyn Runner>,
    config: SupervisorConfig,
    active: Arc<ActiveRuns>,
}

impl RunSupervisor {
    /// Create a new supervisor.
    pub fn new(
        store: Arc<dyn RunStore>,
        catalog: Arc<dyn AgronomicCatalog>,
        runner: Arc<dyn Runner>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            runner,
            config,
            active: Arc::new(ActiveRuns::default()),
        }
    }

    /// Runs currently being supervised.
    pub fn active_runs(&self) -> Arc<ActiveRuns> {
        Arc::clone(&self.active)
    }

    /// Working directory of a run.
    pub fn workdir(&self, run_id: i64) -> PathBuf {
        self.config.run_dir.join(run_id.to_string())
    }

    /// Execute `run` on its own task and return immediately.
    ///
    /// Fails with [`Error::InvalidRequest`] if the run is already being supervised.
    pub fn spawn(self: &Arc<Self>, run: RunRecord) -> Result<JoinHandle<RunOutcome>> {
        let claim = self.claim(run.id)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.supervise(run, claim).await }))
    }

    /// Execute `run` to completion on the current task.
    pub async fn execute(&self, run: RunRecord) -> Result<RunOutcome> {
        let claim = self.claim(run.id)?;
        Ok(self.supervise(run, claim).await)
    }

    fn claim(&self, run_id: i64) -> Result<ActiveClaim> {
        self.active
            .claim(run_id)
            .ok_or_else(|| Error::InvalidRequest(format!("run {run_id} is already running")))
    }

    async fn supervise(&self, run: RunRecord, _claim: ActiveClaim) -> RunOutcome {
        let run_id = run.id;
        let crop = run.spec.treatment.crop;
        let workdir = self.workdir(run_id);
        info!(run_id, crop = %crop, treatment = %run.spec.treatment, "Starting run");

        let outcome = match self.try_execute(&run, &workdir).await {
            Ok(()) => {
                info!(run_id, crop = %crop, "Run complete");
                RunOutcome::Complete
            }
            Err(e) => {
                error!(run_id, crop = %crop, error = %e, "Run failed");
                self.discard(&run).await;
                RunOutcome::Failed(e.to_string())
            }
        };

        match tokio::fs::remove_dir_all(&workdir).await {
            Ok(()) => debug!(run_id, workdir = %workdir.display(), "Removed working directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(run_id, workdir = %workdir.display(), error = %e, "Failed to remove working directory")
            }
        }
        outcome
    }

    async fn try_execute(&self, run: &RunRecord, workdir: &Path) -> Result<()> {
        let run_id = run.id;
        let spec = &run.spec;
        let crop = spec.treatment.crop;

        self.advance(run_id, RunStatus::Preparing).await?;
        match tokio::fs::remove_dir_all(workdir).await {
            Ok(()) => debug!(run_id, "Removed stale working directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(workdir).await?;
        let workdir = std::path::absolute(workdir)?;

        let inputs = RunInputs::gather(self.catalog.as_ref(), spec, &workdir).await?;
        let encoded = encode(&inputs)?;
        encoded.write_to(&workdir).await?;
        install_assets(&self.config.store_dir, &workdir, crop, encoded.first_layer_sand).await?;

        let launch = |program| LaunchOptions {
            run_id,
            program,
            site: spec.site.clone(),
            soil: spec.soil.clone(),
            workdir: workdir.clone(),
        };

        self.advance(run_id, RunStatus::GridGenerating).await?;
        self.runner.run(&launch(Program::GridGenerator), None).await?;

        self.advance(run_id, RunStatus::Running(0)).await?;
        let model = launch(Program::CropModel(crop));
        let (tx, rx) = mpsc::unbounded_channel();
        let (result, ()) = tokio::join!(self.runner.run(&model, Some(tx)), self.track_progress(run_id, rx));
        let result = result?;
        debug!(run_id, lines = result.stdout_lines, duration_ms = result.duration_ms, "Crop model finished");

        self.advance(run_id, RunStatus::Validating).await?;
        let outcome = ingest_run(
            self.store.as_ref(),
            run_id,
            crop,
            &spec.site,
            &workdir,
            IngestOptions {
                remove_output_files: false,
            },
        )
        .await?;
        if let IngestOutcome::Rejected(report) = outcome {
            return Err(Error::OutputRejected(report.to_string()));
        }

        self.advance(run_id, RunStatus::Complete).await?;
        if self.config.ingest.remove_output_files {
            remove_outputs(crop, &spec.site, &workdir).await;
        }
        Ok(())
    }

    async fn track_progress(&self, run_id: i64, mut lines: mpsc::UnboundedReceiver<String>) {
        let mut last = None;
        while let Some(line) = lines.recv().await {
            let Some(percent) = parse_progress(&line) else {
                continue;
            };
            if last == Some(percent) {
                continue;
            }
            last = Some(percent);
            if let Err(e) = self.store.set_status(run_id, RunStatus::Running(percent)).await {
                warn!(run_id, percent, error = %e, "Failed to record progress");
            }
        }
    }

    /// Record a phase transition; a vanished run row ends the run.
    async fn advance(&self, run_id: i64, status: RunStatus) -> Result<()> {
        if !self.store.set_status(run_id, status).await? {
            return Err(Error::RunNotFound(run_id));
        }
        info!(run_id, phase = status.label(), code = status.code(), "Run phase");
        Ok(())
    }

    async fn discard(&self, run: &RunRecord) {
        let crop = run.spec.treatment.crop;
        if let Err(e) = self.store.purge_run_outputs(run.id, crop).await {
            warn!(run_id = run.id, error = %e, "Failed to purge run outputs");
        }
        if let Err(e) = self.store.delete_run(run.id).await {
            warn!(run_id = run.id, error = %e, "Failed to delete run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_lines() {
        assert_eq!(parse_progress(" Progress: 42.7 %"), Some(42));
        assert_eq!(parse_progress("Progress 7"), Some(7));
        assert_eq!(parse_progress("Progress .5"), Some(0));
        assert_eq!(parse_progress("Progress: 250"), Some(100));
        assert_eq!(parse_progress("Progress: 99.99"), Some(99));
    }

    #[test]
    fn test_non_progress_lines_ignored() {
        assert_eq!(parse_progress("Reading weather 42"), None);
        assert_eq!(parse_progress("Progress: pending"), None);
    }

    #[test]
    fn test_claims_are_exclusive_and_released() {
        let runs = Arc::new(ActiveRuns::default());

        let claim = runs.claim(3).unwrap();
        assert!(runs.contains(3));
        assert!(runs.claim(3).is_none());

        drop(claim);
        assert!(!runs.contains(3));
        assert!(runs.is_empty());
    }
}
