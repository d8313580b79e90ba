// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cropsim Core - Simulation Run Pipeline
//!
//! This crate holds everything about a crop simulation run that does not
//! involve launching a process: what a run is, how its agronomic
//! configuration is compiled into model input files, and how the model's
//! output files are validated and stored.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │  AgronomicCatalog    │─────►│   RunInputs::gather  │
//! │  (sites, soils, ...) │      └──────────┬───────────┘
//! └──────────────────────┘                 │
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │   encoder::encode    │  pure, byte-identical
//!                               └──────────┬───────────┘
//!                                          │ write_to(workdir)
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │  crop model (extern) │  cropsim-environment
//!                               └──────────┬───────────┘
//!                                          │ .g01 / .G03 ... / *.crp
//!                                          ▼
//!                               ┌──────────────────────┐      ┌─────────────┐
//!                               │  output::ingest_run  │─────►│  RunStore   │
//!                               └──────────────────────┘      │  (SQLite)   │
//!                                                             └─────────────┘
//! ```
//!
//! # Status codes
//!
//! | Status | Code |
//! |--------|------|
//! | Queued | 1000 |
//! | Preparing | 1001 |
//! | Grid generating | 1002 |
//! | Running | 0-100 (percent) |
//! | Validating | 1003 |
//! | Complete | 101 |
//!
//! A failed run has no status: its record and every output row are deleted.

pub mod catalog;
pub mod crop;
pub mod encoder;
pub mod error;
pub mod output;
pub mod run;
pub mod store;
pub mod timeline;

pub use catalog::{AgronomicCatalog, CatalogSnapshot, StaticCatalog};
pub use crop::{Crop, OutputKind};
pub use encoder::{EncodedInputs, RunInputs, encode, install_assets};
pub use error::{Error, Result};
pub use output::{IngestOptions, IngestOutcome, ValidationReport, ingest_run};
pub use run::{RunRecord, RunSpec, RunStatus};
pub use store::{RunStore, SqliteStore};
pub use timeline::{Timeline, TreatmentKey};
