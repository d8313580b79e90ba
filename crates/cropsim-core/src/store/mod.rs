// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run store interface and backends.
//!
//! The store holds run records and every output table. All writes and purges
//! are scoped by run id, so concurrent runs never touch each other's rows.

pub mod sqlite;

pub use self::sqlite::SqliteStore;

use async_trait::async_trait;

use crate::crop::Crop;
use crate::error::Result;
use crate::output::OutputTable;
use crate::run::{RunRecord, RunSpec, RunStatus};

/// Persistence used by the run pipeline.
#[allow(missing_docs)]
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a QUEUED run and return it with its assigned id.
    async fn create_run(&self, spec: &RunSpec) -> Result<RunRecord>;

    async fn get_run(&self, id: i64) -> Result<Option<RunRecord>>;

    async fn list_runs(&self) -> Result<Vec<RunRecord>>;

    /// Returns false when the run no longer exists.
    async fn set_status(&self, id: i64, status: RunStatus) -> Result<bool>;

    /// Returns false when the run did not exist.
    async fn delete_run(&self, id: i64) -> Result<bool>;

    /// Append rows tagged with `run_id`, creating or widening the table first.
    async fn append_rows(&self, run_id: i64, table: &OutputTable) -> Result<u64>;

    /// Delete every output row of `run_id` from the crop's tables and `geometry`.
    async fn purge_run_outputs(&self, run_id: i64, crop: Crop) -> Result<u64>;

    /// Rows of `run_id` in `table`; 0 when the table does not exist.
    async fn count_rows(&self, table: &str, run_id: i64) -> Result<i64>;
}
