// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cropsim Environment - Simulation Run Execution
//!
//! This crate executes crop simulation runs. It accepts runs over HTTP,
//! supervises each one through input preparation, grid generation, the crop
//! model and output ingestion, and streams the model's growth rows to
//! clients while it runs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           HTTP Clients                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                 │ POST /runs, /runs/{id}/start          ▲ SSE telemetry
//!                 ▼                                       │
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 cropsim-environment (This Crate)                        │
//! │                           Port 8010                                     │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │   Server    │  │ Supervisor  │  │  Telemetry  │  │   Cleanup   │     │
//! │  │   (axum)    │  │ (per run)   │  │  (tail g01) │  │   Worker    │     │
//! │  └─────────────┘  └──────┬──────┘  └─────────────┘  └─────────────┘     │
//! └──────────────────────────┼──────────────────────────────────────────────┘
//!                            │ Spawn
//!           ┌────────────────┴────────────────┐
//!           ▼                                 ▼
//! ┌───────────────────┐            ┌──────────────────────────┐
//! │  CreateSoilFiles  │            │ maizsim / spudsim /      │
//! │  (grid generator) │            │ glycim / gossym          │
//! └───────────────────┘            └──────────────────────────┘
//!                            │
//!                            ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                     SQLite (cropsim-core RunStore)                    │
//! │                 (runs, per-crop output tables, geometry)              │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # HTTP API
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/runs` | Submit a batch of runs, returns `{data: [ids]}` |
//! | POST | `/runs/{id}/start` | Validate and start a queued run |
//! | GET | `/runs/{id}` | Run record with status code and label |
//! | GET | `/runs/{id}/telemetry` | Server-sent events with growth rows |
//! | GET | `/health` | Liveness |
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CROPSIM_DATABASE_URL` | `sqlite:.data/cropsim.db?mode=rwc` | Run store |
//! | `CROPSIM_HTTP_PORT` | `8010` | HTTP listen port |
//! | `CROPSIM_CATALOG_PATH` | `catalog.json` | Agronomic catalog snapshot |
//! | `CROPSIM_RUN_DIR` | `.data/run` | Per-run working directories |
//! | `CROPSIM_STORE_DIR` | `.data/store` | Static model assets |
//! | `CROPSIM_BIN_DIR` | `.data/bin` | Model executables |
//! | `CROPSIM_GRID_LAUNCHER` | `mono` | Grid generator interpreter (empty = direct) |
//! | `CROPSIM_REMOVE_OUTPUT_FILES` | `false` | Delete outputs after ingestion |
//! | `CROPSIM_TELEMETRY_WAIT_MS` | `10000` | Wait for the growth file |
//! | `CROPSIM_CLEANUP_MAX_AGE_SECS` | `86400` | Orphaned directory age limit |

#![deny(missing_docs)]

/// Server configuration loaded from environment variables.
pub mod config;

/// Error types for Environment operations.
pub mod error;

/// Program execution backends (native processes, mock).
pub mod runner;

/// Per-run phase state machine.
pub mod supervisor;

/// Growth file tailing for live telemetry.
pub mod telemetry;

/// HTTP API.
pub mod server;

/// Background worker for cleaning up orphaned run directories.
pub mod cleanup_worker;

/// Embeddable runtime (server plus background workers).
pub mod runtime;

pub use error::{Error, Result};
pub use runtime::CropsimRuntime;
pub use supervisor::{RunOutcome, RunSupervisor};
