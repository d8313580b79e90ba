// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! All-or-nothing ingestion of one run's output files.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, warn};

use super::geometry::{join_geometry, parse_grid};
use super::parse::parse_output;
use super::{FileReport, OutputTable, ValidationReport};
use crate::crop::{Crop, OutputKind};
use crate::error::Result;
use crate::store::RunStore;

/// Ingestion switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Delete the output files once their rows are stored.
    pub remove_output_files: bool,
}

/// Result of ingesting a run.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Every file was clean and all rows were appended.
    Stored {
        /// Tables written, geometry included.
        tables: usize,
        /// Rows appended across all tables.
        rows: u64,
    },
    /// At least one file was missing or had missing cells; nothing is stored
    /// for the run.
    Rejected(ValidationReport),
}

async fn read_output(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn absent(file: String) -> FileReport {
    FileReport {
        file,
        absent: true,
        columns: Vec::new(),
    }
}

/// Purge after a failure; the original error is what the caller sees.
async fn purge_quietly(store: &dyn RunStore, run_id: i64, crop: Crop) {
    if let Err(e) = store.purge_run_outputs(run_id, crop).await {
        warn!(run_id, crop = %crop, error = %e, "Failed to purge run outputs");
    }
}

/// Validate and store every output file of a run.
///
/// Nothing is appended unless every file is present and has no missing
/// cells. On rejection or on any error, rows the run may already own are
/// purged from every table of the crop and from `geometry`.
pub async fn ingest_run(
    store: &dyn RunStore,
    run_id: i64,
    crop: Crop,
    site: &str,
    workdir: &Path,
    options: IngestOptions,
) -> Result<IngestOutcome> {
    match collect(run_id, crop, site, workdir).await {
        Ok(Collected::Clean(tables)) => {
            let mut rows = 0;
            for table in &tables {
                match store.append_rows(run_id, table).await {
                    Ok(n) => rows += n,
                    Err(e) => {
                        purge_quietly(store, run_id, crop).await;
                        return Err(e);
                    }
                }
            }
            info!(run_id, crop = %crop, tables = tables.len(), rows, "Stored run outputs");

            if options.remove_output_files {
                remove_outputs(crop, site, workdir).await;
            }
            Ok(IngestOutcome::Stored {
                tables: tables.len(),
                rows,
            })
        }
        Ok(Collected::Dirty(report)) => {
            purge_quietly(store, run_id, crop).await;
            warn!(run_id, crop = %crop, files = report.files.len(), "Run outputs failed validation");
            Ok(IngestOutcome::Rejected(report))
        }
        Err(e) => {
            purge_quietly(store, run_id, crop).await;
            Err(e)
        }
    }
}

enum Collected {
    Clean(Vec<OutputTable>),
    Dirty(ValidationReport),
}

async fn collect(run_id: i64, crop: Crop, site: &str, workdir: &Path) -> Result<Collected> {
    let mut report = ValidationReport::default();
    let mut tables = Vec::new();
    let mut soil_layer = None;

    for &kind in crop.output_kinds() {
        let file = kind.file_name(site);
        let Some(bytes) = read_output(&workdir.join(&file)).await? else {
            report.files.push(absent(file));
            continue;
        };
        let parsed = parse_output(&bytes, &file, kind, crop)?;
        debug!(run_id, file = %file, rows = parsed.table.rows.len(), "Parsed output file");
        if !parsed.missing.is_empty() {
            report.files.push(FileReport {
                file,
                absent: false,
                columns: parsed.missing,
            });
        }
        tables.push(parsed.table);
        if kind == OutputKind::G03 {
            soil_layer = Some(bytes);
        }
    }

    let grid_file = format!("{site}.grd");
    let grid = read_output(&workdir.join(&grid_file)).await?;
    if grid.is_none() {
        report.files.push(absent(grid_file.clone()));
    }

    if !report.is_clean() {
        return Ok(Collected::Dirty(report));
    }

    if let (Some(grid), Some(soil_layer)) = (grid, soil_layer) {
        let grid = parse_grid(&String::from_utf8_lossy(&grid), &grid_file)?;
        tables.push(join_geometry(&grid, &soil_layer, &OutputKind::G03.file_name(site))?);
    }
    Ok(Collected::Clean(tables))
}

/// Delete a run's output files from `workdir`, logging files that could not
/// be removed.
pub async fn remove_outputs(crop: Crop, site: &str, workdir: &Path) {
    for kind in crop.output_kinds() {
        let path = workdir.join(kind.file_name(site));
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove output file");
        }
    }
}
