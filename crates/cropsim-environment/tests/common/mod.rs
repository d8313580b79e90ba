// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cropsim_core::{IngestOptions, RunSpec, SqliteStore, StaticCatalog};
use cropsim_environment::runner::MockRunner;
use cropsim_environment::server::AppState;
use cropsim_environment::supervisor::{RunSupervisor, SupervisorConfig};
use cropsim_environment::telemetry::TelemetryConfig;
use tempfile::TempDir;

pub const CATALOG: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../cropsim-core/tests/fixtures/catalog.json"
);

/// Store, catalog and supervisor rooted in a temporary directory.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub catalog: Arc<StaticCatalog>,
    pub runner: Arc<MockRunner>,
    pub supervisor: Arc<RunSupervisor>,
}

impl Harness {
    pub async fn new(runner: MockRunner) -> Self {
        Self::with_ingest(runner, IngestOptions::default()).await
    }

    pub async fn with_ingest(runner: MockRunner, ingest: IngestOptions) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store_dir = dir.path().join("store");
        std::fs::create_dir_all(&store_dir).unwrap();
        std::fs::write(store_dir.join("Water.DAT"), "water -1.00000E+005\n").unwrap();
        std::fs::write(store_dir.join("WaterBound.DAT"), "bound\n").unwrap();
        std::fs::write(store_dir.join("fallow.var"), "fallow\n").unwrap();

        let store = Arc::new(
            SqliteStore::from_path(dir.path().join("cropsim.db"))
                .await
                .expect("Failed to open store"),
        );
        let catalog = Arc::new(
            StaticCatalog::from_path(CATALOG)
                .await
                .expect("Failed to load catalog fixture"),
        );
        let runner = Arc::new(runner);
        let supervisor = Arc::new(RunSupervisor::new(
            store.clone(),
            catalog.clone(),
            runner.clone(),
            SupervisorConfig {
                run_dir: dir.path().join("run"),
                store_dir,
                ingest,
            },
        ));

        Self {
            dir,
            store,
            catalog,
            runner,
            supervisor,
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        self.dir.path().join("run")
    }

    /// Handler state with short telemetry waits.
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            store: self.store.clone(),
            catalog: self.catalog.clone(),
            supervisor: self.supervisor.clone(),
            telemetry: fast_telemetry(),
        })
    }
}

pub fn fast_telemetry() -> TelemetryConfig {
    TelemetryConfig {
        initial_wait: Duration::from_secs(2),
        wait_poll: Duration::from_millis(10),
        poll_interval: Duration::from_millis(20),
    }
}

pub fn spec(treatment: &str) -> RunSpec {
    RunSpec {
        site: "Beltsville".into(),
        soil: "LoamProfile".into(),
        station: "BARC".into(),
        station_type: "barc".into(),
        treatment: treatment.parse().expect("valid treatment key"),
        water_stress: 1,
        nitrogen_stress: 1,
        temperature_delta: 0.0,
        rain_delta: 0.0,
        co2_override: 0.0,
        start_label: "2024".into(),
        end_label: "2024".into(),
    }
}
