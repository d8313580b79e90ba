// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Output Validator & Ingestor.
//!
//! Crop model output files are comma separated text with padded labels.
//! Each file is reshaped into an [`OutputTable`] (timestamp normalised to a
//! `Date_Time` column, per-table columns pruned and renamed) and scanned for
//! missing values. Ingestion is all-or-nothing per run: if any file of the
//! run is missing or has a missing cell, nothing is stored and every row the
//! run may already own is purged.

mod geometry;
mod ingest;
mod parse;

pub use geometry::{GEOMETRY_TABLE, join_geometry, parse_grid};
pub use ingest::{IngestOutcome, IngestOptions, ingest_run, remove_outputs};
pub use parse::{ParsedOutput, TIMESTAMP_COLUMN, parse_output, soil_timestamp};

use std::fmt;

use serde::Serialize;

/// One stored cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Numeric cell.
    Real(f64),
    /// Any other text.
    Text(String),
    /// Missing value.
    Null,
}

impl CellValue {
    /// Classify one raw cell.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if is_missing(raw) {
            return CellValue::Null;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Real(v),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    /// True for a missing value.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

/// Blank cells and the usual not-a-number spellings.
fn is_missing(raw: &str) -> bool {
    raw.is_empty()
        || ["nan", "-nan", "+nan", "na", "n/a", "null", "#n/a", "none"]
            .iter()
            .any(|marker| raw.eq_ignore_ascii_case(marker))
}

/// Rows bound for one destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    /// Destination table.
    pub table: String,
    /// Column labels, already sanitised.
    pub columns: Vec<String>,
    /// Rows, one cell per column.
    pub rows: Vec<Vec<CellValue>>,
}

impl OutputTable {
    /// Index of a column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A column with missing values and the dates of the affected rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingColumn {
    /// Column label as written in the file.
    pub column: String,
    /// `MM/DD/YYYY` of each row with a missing value.
    pub dates: Vec<String>,
}

/// Problems found in one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Output file name.
    pub file: String,
    /// True when the file was not produced at all.
    pub absent: bool,
    /// Columns with missing values.
    pub columns: Vec<MissingColumn>,
}

impl FileReport {
    /// True when the file passed validation.
    pub fn is_clean(&self) -> bool {
        !self.absent && self.columns.is_empty()
    }
}

/// Validation report over every output file of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Files with problems; clean files are not listed.
    pub files: Vec<FileReport>,
}

impl ValidationReport {
    /// True when no file has a problem.
    pub fn is_clean(&self) -> bool {
        self.files.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            if file.absent {
                writeln!(f, "{}: file not produced", file.file)?;
                continue;
            }
            let columns: Vec<&str> = file.columns.iter().map(|c| c.column.as_str()).collect();
            writeln!(f, "{}: {}", file.file, columns.join(", "))?;
            for column in &file.columns {
                writeln!(f, "  {}: Date:{}", column.column, column.dates.join(", "))?;
            }
        }
        Ok(())
    }
}
