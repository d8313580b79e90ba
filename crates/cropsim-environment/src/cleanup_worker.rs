// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background worker for cleaning up orphaned run directories.
//!
//! The supervisor removes a run's working directory (`{run_dir}/{run_id}/`)
//! when the run ends. A directory can only outlive its run if the process
//! stopped mid-run, so this worker periodically removes directories older
//! than the configured age whose run is not being supervised.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::supervisor::ActiveRuns;

/// Configuration for the cleanup worker.
#[derive(Debug, Clone)]
pub struct CleanupWorkerConfig {
    /// Parent of the per-run working directories.
    pub run_dir: PathBuf,
    /// How often to scan for old directories.
    pub poll_interval: Duration,
    /// Maximum age of run directories before cleanup.
    pub max_age: Duration,
}

impl Default for CleanupWorkerConfig {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from(".data/run"),
            poll_interval: Duration::from_secs(3600), // 1 hour
            max_age: Duration::from_secs(24 * 3600),  // 24 hours
        }
    }
}

/// Background worker that cleans up orphaned run directories.
pub struct CleanupWorker {
    config: CleanupWorkerConfig,
    active: Arc<ActiveRuns>,
    shutdown: Arc<Notify>,
}

impl CleanupWorker {
    /// Create a new cleanup worker that leaves `active` runs alone.
    pub fn new(config: CleanupWorkerConfig, active: Arc<ActiveRuns>) -> Self {
        Self {
            config,
            active,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the cleanup worker loop.
    ///
    /// The loop exits when the shutdown signal is received.
    pub async fn run(&self) {
        info!(
            run_dir = %self.config.run_dir.display(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_age_hours = self.config.max_age.as_secs() / 3600,
            "Cleanup worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Cleanup worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.cleanup_old_directories().await {
                        error!(error = %e, "Failed to cleanup old directories");
                    }
                }
            }
        }

        info!("Cleanup worker stopped");
    }

    /// Scan for and remove old run directories.
    ///
    /// Returns the number of directories removed.
    pub async fn cleanup_old_directories(&self) -> std::io::Result<u64> {
        let Some(cutoff) = chrono::Duration::from_std(self.config.max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let mut cleaned = 0u64;
        let mut errors = 0u64;

        let mut run_dirs = match tokio::fs::read_dir(&self.config.run_dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Run directory does not exist, nothing to clean");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        while let Some(entry) = run_dirs.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            // Only `{run_id}` directories belong to runs
            let Some(run_id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<i64>().ok())
            else {
                continue;
            };
            if self.active.contains(run_id) {
                continue;
            }

            let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        error = %e,
                        "Failed to get modification time"
                    );
                    errors += 1;
                    continue;
                }
            };

            // Skip if too recent
            if modified > cutoff {
                continue;
            }

            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    debug!(
                        run_id,
                        path = %path.display(),
                        age_hours = (Utc::now() - modified).num_hours(),
                        "Removed orphaned run directory"
                    );
                    cleaned += 1;
                }
                Err(e) => {
                    warn!(
                        run_id,
                        path = %path.display(),
                        error = %e,
                        "Failed to remove orphaned run directory"
                    );
                    errors += 1;
                }
            }
        }

        if cleaned > 0 || errors > 0 {
            info!(cleaned, errors, "Cleanup cycle completed");
        } else {
            debug!("Cleanup cycle completed, no old directories found");
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn worker(run_dir: PathBuf, max_age: Duration) -> CleanupWorker {
        CleanupWorker::new(
            CleanupWorkerConfig {
                run_dir,
                poll_interval: Duration::from_secs(1),
                max_age,
            },
            Arc::new(ActiveRuns::default()),
        )
    }

    #[test]
    fn test_config_default() {
        let config = CleanupWorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3600));
        assert_eq!(config.max_age, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_shutdown_handle() {
        let worker = worker(PathBuf::from(".data/run"), Duration::from_secs(1));
        let handle = worker.shutdown_handle();
        assert!(Arc::strong_count(&handle) >= 2);
    }

    #[tokio::test]
    async fn test_cleanup_nonexistent_run_dir() {
        let worker = worker(
            PathBuf::from("/nonexistent/path/that/does/not/exist"),
            Duration::from_secs(1),
        );

        assert_eq!(worker.cleanup_old_directories().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_old_run_directories() {
        let temp_dir = TempDir::new().unwrap();
        let old_run = temp_dir.path().join("42");
        tokio::fs::create_dir_all(&old_run).await.unwrap();
        tokio::fs::write(old_run.join("Beltsville.g01"), "jday\n")
            .await
            .unwrap();

        let worker = worker(temp_dir.path().to_path_buf(), Duration::from_secs(0));

        assert_eq!(worker.cleanup_old_directories().await.unwrap(), 1);
        assert!(!old_run.exists());
        assert!(temp_dir.path().exists());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_and_foreign_directories() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(temp_dir.path().join("7"))
            .await
            .unwrap();
        tokio::fs::create_dir_all(temp_dir.path().join("scratch"))
            .await
            .unwrap();

        let recent = worker(temp_dir.path().to_path_buf(), Duration::from_secs(3600));
        assert_eq!(recent.cleanup_old_directories().await.unwrap(), 0);
        assert!(temp_dir.path().join("7").exists());

        let immediate = worker(temp_dir.path().to_path_buf(), Duration::from_secs(0));
        immediate.cleanup_old_directories().await.unwrap();
        assert!(temp_dir.path().join("scratch").exists());
    }

    #[tokio::test]
    async fn test_cleanup_skips_supervised_runs() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(temp_dir.path().join("5"))
            .await
            .unwrap();
        let active = Arc::new(ActiveRuns::default());
        let _claim = active.claim(5).unwrap();

        let worker = CleanupWorker::new(
            CleanupWorkerConfig {
                run_dir: temp_dir.path().to_path_buf(),
                poll_interval: Duration::from_secs(1),
                max_age: Duration::from_secs(0),
            },
            active,
        );

        assert_eq!(worker.cleanup_old_directories().await.unwrap(), 0);
        assert!(temp_dir.path().join("5").exists());
    }
}
