// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cropsim Environment - Simulation Run Server
//!
//! An HTTP server responsible for:
//! - Run submission and status
//! - Run supervision (input encoding, grid generation, crop model, ingestion)
//! - Live telemetry over server-sent events

use std::sync::Arc;
use tracing::{info, warn};

use cropsim_core::{SqliteStore, StaticCatalog};
use cropsim_environment::config::Config;
use cropsim_environment::runner::{NativeRunner, NativeRunnerConfig, Runner};
use cropsim_environment::runtime::CropsimRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cropsim_environment=info,cropsim_core=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        run_dir = %config.run_dir.display(),
        bin_dir = %config.bin_dir.display(),
        "Starting Cropsim Environment"
    );

    // Open the run store (migrations run on connect)
    let store = match config.database_path() {
        Some(path) => SqliteStore::from_path(path).await?,
        None => SqliteStore::connect(&config.database_url).await?,
    };
    let store = Arc::new(store);
    info!("Connected to database");

    let catalog = Arc::new(StaticCatalog::from_path(&config.catalog_path).await?);

    let runner = Arc::new(NativeRunner::new(NativeRunnerConfig {
        bin_dir: config.bin_dir.clone(),
        grid_launcher: config.grid_launcher.clone(),
    }));
    info!(runner_type = runner.runner_type(), "Runner initialized");

    // Start the runtime
    let runtime = CropsimRuntime::builder()
        .store(store)
        .catalog(catalog)
        .runner(runner)
        .bind_addr(config.http_addr)
        .run_dir(&config.run_dir)
        .store_dir(&config.store_dir)
        .remove_output_files(config.remove_output_files)
        .telemetry_wait(config.telemetry_wait)
        .cleanup_max_age(config.cleanup_max_age)
        .build()?
        .start()
        .await?;

    info!(addr = %runtime.bind_addr(), "Cropsim server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Graceful shutdown
    runtime.shutdown().await?;

    info!("Cropsim Environment shut down");

    Ok(())
}
