// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for cropsim-environment.
//!
//! This module provides [`CropsimRuntime`] which allows embedding the run
//! environment into an existing tokio application instead of running it as
//! a standalone server.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cropsim_core::{SqliteStore, StaticCatalog};
//! use cropsim_environment::runner::{NativeRunner, NativeRunnerConfig};
//! use cropsim_environment::runtime::CropsimRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(SqliteStore::connect("sqlite:cropsim.db?mode=rwc").await?);
//!     let catalog = Arc::new(StaticCatalog::from_path("catalog.json").await?);
//!     let runner = Arc::new(NativeRunner::new(NativeRunnerConfig {
//!         bin_dir: "bin".into(),
//!         grid_launcher: Some("mono".into()),
//!     }));
//!
//!     let runtime = CropsimRuntime::builder()
//!         .store(store)
//!         .catalog(catalog)
//!         .runner(runner)
//!         .bind_addr("0.0.0.0:8010".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cropsim_core::{AgronomicCatalog, IngestOptions, RunStore};
use tokio::net::TcpListener;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cleanup_worker::{CleanupWorker, CleanupWorkerConfig};
use crate::runner::Runner;
use crate::server::{AppState, serve};
use crate::supervisor::{RunSupervisor, SupervisorConfig};
use crate::telemetry::TelemetryConfig;

/// Builder for creating a [`CropsimRuntime`].
pub struct CropsimRuntimeBuilder {
    store: Option<Arc<dyn RunStore>>,
    catalog: Option<Arc<dyn AgronomicCatalog>>,
    runner: Option<Arc<dyn Runner>>,
    bind_addr: SocketAddr,
    run_dir: PathBuf,
    store_dir: PathBuf,
    remove_output_files: bool,
    telemetry: TelemetryConfig,
    cleanup_poll_interval: Duration,
    cleanup_max_age: Duration,
}

impl Default for CropsimRuntimeBuilder {
    fn default() -> Self {
        Self {
            store: None,
            catalog: None,
            runner: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8010)),
            run_dir: PathBuf::from(".data/run"),
            store_dir: PathBuf::from(".data/store"),
            remove_output_files: false,
            telemetry: TelemetryConfig::default(),
            cleanup_poll_interval: Duration::from_secs(3600), // 1 hour
            cleanup_max_age: Duration::from_secs(24 * 3600),  // 24 hours
        }
    }
}

impl CropsimRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run store (required).
    pub fn store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the agronomic catalog (required).
    pub fn catalog(mut self, catalog: Arc<dyn AgronomicCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the program runner (required).
    pub fn runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Set the HTTP bind address.
    ///
    /// Default: `0.0.0.0:8010`
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the parent of per-run working directories.
    ///
    /// Default: `.data/run`
    pub fn run_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_dir = path.into();
        self
    }

    /// Set the static asset directory.
    ///
    /// Default: `.data/store`
    pub fn store_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_dir = path.into();
        self
    }

    /// Delete output files once their rows are stored.
    ///
    /// Default: false
    pub fn remove_output_files(mut self, remove: bool) -> Self {
        self.remove_output_files = remove;
        self
    }

    /// Set the bounded wait for a run's growth file.
    ///
    /// Default: 10 seconds
    pub fn telemetry_wait(mut self, wait: Duration) -> Self {
        self.telemetry.initial_wait = wait;
        self
    }

    /// Set the cleanup worker poll interval.
    ///
    /// Default: 1 hour
    pub fn cleanup_poll_interval(mut self, interval: Duration) -> Self {
        self.cleanup_poll_interval = interval;
        self
    }

    /// Set the age after which orphaned run directories are removed.
    ///
    /// Default: 24 hours
    pub fn cleanup_max_age(mut self, max_age: Duration) -> Self {
        self.cleanup_max_age = max_age;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<CropsimRuntimeConfig> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let catalog = self
            .catalog
            .ok_or_else(|| anyhow::anyhow!("catalog is required"))?;
        let runner = self
            .runner
            .ok_or_else(|| anyhow::anyhow!("runner is required"))?;

        Ok(CropsimRuntimeConfig {
            store,
            catalog,
            runner,
            bind_addr: self.bind_addr,
            run_dir: self.run_dir,
            store_dir: self.store_dir,
            remove_output_files: self.remove_output_files,
            telemetry: self.telemetry,
            cleanup_poll_interval: self.cleanup_poll_interval,
            cleanup_max_age: self.cleanup_max_age,
        })
    }
}

/// Configuration for a [`CropsimRuntime`].
pub struct CropsimRuntimeConfig {
    store: Arc<dyn RunStore>,
    catalog: Arc<dyn AgronomicCatalog>,
    runner: Arc<dyn Runner>,
    bind_addr: SocketAddr,
    run_dir: PathBuf,
    store_dir: PathBuf,
    remove_output_files: bool,
    telemetry: TelemetryConfig,
    cleanup_poll_interval: Duration,
    cleanup_max_age: Duration,
}

impl CropsimRuntimeConfig {
    /// Start the runtime, spawning the HTTP server and cleanup worker tasks.
    pub async fn start(self) -> Result<CropsimRuntime> {
        tokio::fs::create_dir_all(&self.run_dir).await?;

        let supervisor = Arc::new(RunSupervisor::new(
            self.store.clone(),
            self.catalog.clone(),
            self.runner.clone(),
            SupervisorConfig {
                run_dir: self.run_dir.clone(),
                store_dir: self.store_dir,
                ingest: IngestOptions {
                    remove_output_files: self.remove_output_files,
                },
            },
        ));

        let cleanup_worker = CleanupWorker::new(
            CleanupWorkerConfig {
                run_dir: self.run_dir,
                poll_interval: self.cleanup_poll_interval,
                max_age: self.cleanup_max_age,
            },
            supervisor.active_runs(),
        );
        let cleanup_shutdown = cleanup_worker.shutdown_handle();

        // Start cleanup worker task
        let cleanup_handle = tokio::spawn(async move {
            cleanup_worker.run().await;
        });

        let state = Arc::new(AppState {
            store: self.store,
            catalog: self.catalog,
            supervisor,
            telemetry: self.telemetry,
        });

        // Bind before spawning so the actual address is known (port 0 in tests)
        let listener = TcpListener::bind(self.bind_addr).await?;
        let bind_addr = listener.local_addr()?;
        let (server_shutdown_tx, server_shutdown_rx) = watch::channel(false);
        let server_handle = tokio::spawn(serve(listener, state.clone(), server_shutdown_rx));

        info!(
            bind_addr = %bind_addr,
            runner = self.runner.runner_type(),
            "CropsimRuntime started"
        );

        Ok(CropsimRuntime {
            server_handle,
            cleanup_handle,
            server_shutdown_tx,
            cleanup_shutdown,
            state,
            bind_addr,
        })
    }
}

/// A running cropsim environment that can be embedded in an application.
///
/// The runtime manages:
/// - HTTP server for run submission, status and telemetry
/// - Cleanup worker for removing orphaned run directories
///
/// Runs started through the API execute on their own tasks and are not
/// awaited by [`shutdown`](Self::shutdown).
pub struct CropsimRuntime {
    server_handle: JoinHandle<std::io::Result<()>>,
    cleanup_handle: JoinHandle<()>,
    server_shutdown_tx: watch::Sender<bool>,
    cleanup_shutdown: Arc<Notify>,
    state: Arc<AppState>,
    bind_addr: SocketAddr,
}

impl CropsimRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> CropsimRuntimeBuilder {
        CropsimRuntimeBuilder::new()
    }

    /// Get the bound address of the HTTP server.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Get a reference to the shared handler state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Gracefully shut down the runtime.
    ///
    /// This signals the HTTP server and cleanup worker to stop, then waits
    /// for them to complete.
    pub async fn shutdown(self) -> Result<()> {
        info!("CropsimRuntime shutting down...");

        // Signal server shutdown
        let _ = self.server_shutdown_tx.send(true);

        // Signal cleanup worker shutdown
        self.cleanup_shutdown.notify_one();

        // Wait for cleanup worker
        if let Err(e) = self.cleanup_handle.await {
            error!("Cleanup worker task panicked: {}", e);
        }

        // Wait for server
        match self.server_handle.await {
            Ok(Ok(())) => {
                info!("CropsimRuntime shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("CropsimRuntime server error during shutdown: {}", e);
                Err(e.into())
            }
            Err(e) => {
                error!("CropsimRuntime server task panicked: {}", e);
                Err(anyhow::anyhow!("server task panicked: {}", e))
            }
        }
    }

    /// Check if the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.server_handle.is_finished() && !self.cleanup_handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::MockRunner;
    use cropsim_core::{SqliteStore, StaticCatalog};

    const CATALOG: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../cropsim-core/tests/fixtures/catalog.json"
    );

    #[test]
    fn test_build_requires_store() {
        let err = CropsimRuntime::builder()
            .runner(Arc::new(MockRunner::new()))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("store is required"));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::from_path(dir.path().join("cropsim.db"))
            .await
            .expect("Failed to open store");
        let catalog = StaticCatalog::from_path(CATALOG)
            .await
            .expect("Failed to load catalog fixture");

        let runtime = CropsimRuntime::builder()
            .store(Arc::new(store))
            .catalog(Arc::new(catalog))
            .runner(Arc::new(MockRunner::new()))
            .bind_addr("127.0.0.1:0".parse().unwrap())
            .run_dir(dir.path().join("run"))
            .build()
            .unwrap()
            .start()
            .await
            .unwrap();

        assert!(runtime.is_running());
        assert_ne!(runtime.bind_addr().port(), 0);
        assert!(dir.path().join("run").is_dir());

        runtime.shutdown().await.unwrap();
    }
}
