// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed run store.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use super::RunStore;
use crate::crop::Crop;
use crate::error::Result;
use crate::output::{CellValue, GEOMETRY_TABLE, OutputTable};
use crate::run::{RunRecord, RunSpec, RunStatus};
use crate::timeline::TreatmentKey;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Host parameter limit of the bundled SQLite.
const BIND_LIMIT: usize = 32_766;

/// SQLite-backed run store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    /// Held while output tables are created or widened.
    schema: Arc<Mutex<()>>,
}

/// Quote an identifier taken from an output file header.
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn record_from_row(row: &SqliteRow) -> Result<RunRecord> {
    let id: i64 = row.try_get("id")?;
    let code: i64 = row.try_get("status")?;
    let status = RunStatus::from_code(code).ok_or_else(|| {
        sqlx::Error::Decode(format!("run {id} has unknown status code {code}").into())
    })?;
    let treatment: String = row.try_get("treatment")?;
    let treatment = treatment
        .parse::<TreatmentKey>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(RunRecord {
        id,
        spec: RunSpec {
            site: row.try_get("site")?,
            soil: row.try_get("soil")?,
            station: row.try_get("station")?,
            station_type: row.try_get("station_type")?,
            treatment,
            water_stress: row.try_get("water_stress")?,
            nitrogen_stress: row.try_get("nitrogen_stress")?,
            temperature_delta: row.try_get("temperature_delta")?,
            rain_delta: row.try_get("rain_delta")?,
            co2_override: row.try_get("co2_override")?,
            start_label: row.try_get("start_label")?,
            end_label: row.try_get("end_label")?,
        },
        status,
        created_at,
    })
}

impl SqliteStore {
    /// Create a store from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema: Arc::new(Mutex::new(())),
        }
    }

    /// Open (creating if needed) a database file and run migrations.
    ///
    /// ```ignore
    /// let store = SqliteStore::from_path(".data/cropsim.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        Self::connect(&format!("sqlite:{}?mode=rwc", path.to_string_lossy())).await
    }

    /// Connect to a SQLite URL and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        MIGRATOR.run(&pool).await?;

        Ok(Self::new(pool))
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Create the table if missing and add any column it does not have yet.
    ///
    /// Runs one at a time per store; concurrent runs would otherwise read the
    /// same column list and add the same column twice.
    async fn ensure_table(&self, table: &OutputTable) -> Result<()> {
        let _schema = self.schema.lock().await;
        let name = quote(&table.table);
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (run_id INTEGER NOT NULL)"
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {name} (run_id)",
            quote(&format!("idx_{}_run_id", table.table))
        ))
        .execute(&self.pool)
        .await?;

        let existing: HashSet<String> = sqlx::query(&format!("PRAGMA table_info({name})"))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.try_get::<String, _>("name").map(|n| n.to_lowercase()))
            .collect::<std::result::Result<_, _>>()?;

        for column in &table.columns {
            if existing.contains(&column.to_lowercase()) {
                continue;
            }
            sqlx::query(&format!("ALTER TABLE {name} ADD COLUMN {}", quote(column)))
                .execute(&self.pool)
                .await?;
            debug!(table = %table.table, column = %column, "Added output column");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RunStore for SqliteStore {
    async fn create_run(&self, spec: &RunSpec) -> Result<RunRecord> {
        let created_at = Utc::now();
        let status = RunStatus::Queued;
        let result = sqlx::query(
            r#"
            INSERT INTO runs (site, soil, station, station_type, treatment, water_stress,
                              nitrogen_stress, temperature_delta, rain_delta, co2_override,
                              start_label, end_label, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&spec.site)
        .bind(&spec.soil)
        .bind(&spec.station)
        .bind(&spec.station_type)
        .bind(spec.treatment.to_string())
        .bind(spec.water_stress)
        .bind(spec.nitrogen_stress)
        .bind(spec.temperature_delta)
        .bind(spec.rain_delta)
        .bind(spec.co2_override)
        .bind(&spec.start_label)
        .bind(&spec.end_label)
        .bind(status.code())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(RunRecord {
            id: result.last_insert_rowid(),
            spec: spec.clone(),
            status,
            created_at,
        })
    }

    async fn get_run(&self, id: i64) -> Result<Option<RunRecord>> {
        let row = sqlx::query("SELECT * FROM runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        sqlx::query("SELECT * FROM runs ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(record_from_row)
            .collect()
    }

    async fn set_status(&self, id: i64, status: RunStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE runs SET status = ? WHERE id = ?")
            .bind(status.code())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_run(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM runs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_rows(&self, run_id: i64, table: &OutputTable) -> Result<u64> {
        if table.rows.is_empty() {
            return Ok(0);
        }
        self.ensure_table(table).await?;

        let mut columns = vec!["run_id".to_string()];
        columns.extend(table.columns.iter().map(|c| quote(c)));
        let prefix = format!(
            "INSERT INTO {} ({}) ",
            quote(&table.table),
            columns.join(", ")
        );
        let rows_per_chunk = (BIND_LIMIT / columns.len()).max(1);

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for chunk in table.rows.chunks(rows_per_chunk) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(&prefix);
            builder.push_values(chunk, |mut values, row| {
                values.push_bind(run_id);
                for cell in row {
                    match cell {
                        CellValue::Real(v) => values.push_bind(*v),
                        CellValue::Text(s) => values.push_bind(s.as_str()),
                        CellValue::Null => values.push_bind(None::<f64>),
                    };
                }
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        debug!(run_id, table = %table.table, rows = inserted, "Appended output rows");
        Ok(inserted)
    }

    async fn purge_run_outputs(&self, run_id: i64, crop: Crop) -> Result<u64> {
        let mut tables = crop.tables();
        tables.push(GEOMETRY_TABLE.to_string());

        let mut purged = 0;
        for table in &tables {
            if !self.table_exists(table).await? {
                continue;
            }
            purged += sqlx::query(&format!("DELETE FROM {} WHERE run_id = ?", quote(table)))
                .bind(run_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }
        debug!(run_id, crop = %crop, rows = purged, "Purged run outputs");
        Ok(purged)
    }

    async fn count_rows(&self, table: &str, run_id: i64) -> Result<i64> {
        if !self.table_exists(table).await? {
            return Ok(0);
        }
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE run_id = ?", quote(table)))
                .bind(run_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create an in-memory SQLite pool for testing.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        MIGRATOR.run(&pool).await.expect("Failed to run migrations");

        pool
    }

    fn spec() -> RunSpec {
        RunSpec {
            site: "Beltsville".into(),
            soil: "Loam".into(),
            station: "BARC".into(),
            station_type: "barc".into(),
            treatment: "maize/Exp1/Irrigated".parse().unwrap(),
            water_stress: 0,
            nitrogen_stress: 1,
            temperature_delta: 2.0,
            rain_delta: -10.0,
            co2_override: 0.0,
            start_label: "2024".into(),
            end_label: "2024".into(),
        }
    }

    fn table(name: &str, columns: &[&str], rows: usize) -> OutputTable {
        OutputTable {
            table: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: (0..rows)
                .map(|i| {
                    columns
                        .iter()
                        .map(|_| CellValue::Real(i as f64))
                        .collect()
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let store = SqliteStore::new(test_pool().await);

        let created = store.create_run(&spec()).await.expect("Failed to create run");
        let fetched = store
            .get_run(created.id)
            .await
            .expect("Failed to get run")
            .expect("Run should exist");

        assert_eq!(fetched.spec, spec());
        assert_eq!(fetched.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_status_and_delete() {
        let store = SqliteStore::new(test_pool().await);
        let run = store.create_run(&spec()).await.unwrap();

        assert!(store.set_status(run.id, RunStatus::Running(42)).await.unwrap());
        let fetched = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RunStatus::Running(42));

        assert!(store.delete_run(run.id).await.unwrap());
        assert!(store.get_run(run.id).await.unwrap().is_none());
        assert!(!store.set_status(run.id, RunStatus::Complete).await.unwrap());
    }

    #[tokio::test]
    async fn test_append_widens_table() {
        let store = SqliteStore::new(test_pool().await);

        store
            .append_rows(1, &table("g01_maize", &["LAI", "Date_Time"], 3))
            .await
            .unwrap();
        store
            .append_rows(2, &table("g01_maize", &["LAI", "ETdmd", "Date_Time"], 2))
            .await
            .unwrap();

        assert_eq!(store.count_rows("g01_maize", 1).await.unwrap(), 3);
        assert_eq!(store.count_rows("g01_maize", 2).await.unwrap(), 2);
        assert_eq!(store.count_rows("g03_maize", 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_large_append_is_chunked() {
        let store = SqliteStore::new(test_pool().await);
        let columns: Vec<String> = (0..40).map(|i| format!("c{i}")).collect();
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();

        let inserted = store
            .append_rows(7, &table("g03_maize", &columns, 2_000))
            .await
            .unwrap();
        assert_eq!(inserted, 2_000);
    }

    #[tokio::test]
    async fn test_purge_is_scoped_to_run() {
        let store = SqliteStore::new(test_pool().await);
        for run_id in [1, 2] {
            store
                .append_rows(run_id, &table("g05_maize", &["Flux"], 4))
                .await
                .unwrap();
            store
                .append_rows(run_id, &table(GEOMETRY_TABLE, &["X", "Y"], 2))
                .await
                .unwrap();
        }

        let purged = store.purge_run_outputs(1, Crop::Maize).await.unwrap();
        assert_eq!(purged, 6);
        assert_eq!(store.count_rows("g05_maize", 1).await.unwrap(), 0);
        assert_eq!(store.count_rows("g05_maize", 2).await.unwrap(), 4);
        assert_eq!(store.count_rows(GEOMETRY_TABLE, 2).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_widen_table_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::from_path(dir.path().join("cropsim.db"))
            .await
            .unwrap();
        let columns: Vec<String> = (0..60).map(|i| format!("c{i}")).collect();
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();

        for round in 0..5 {
            let name = format!("g01_round{round}");
            let appends: Vec<_> = (1..=2)
                .map(|run_id| {
                    let store = store.clone();
                    let table = table(&name, &columns, 3);
                    tokio::spawn(async move { store.append_rows(run_id, &table).await })
                })
                .collect();
            for append in appends {
                assert_eq!(append.await.unwrap().unwrap(), 3);
            }
            assert_eq!(store.count_rows(&name, 1).await.unwrap(), 3);
            assert_eq!(store.count_rows(&name, 2).await.unwrap(), 3);
        }
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("Tr-Pot"), "\"Tr-Pot\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}
