// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Static grid geometry: the generator's `.grd` node list joined with the
//! per-node soil columns of the first soil-layer output.

use std::collections::{HashMap, HashSet};

use super::parse::read_table;
use super::{CellValue, OutputTable};
use crate::error::{Error, Result};

/// Shared destination table for grid geometry.
pub const GEOMETRY_TABLE: &str = "geometry";

const HEADER_LINE: usize = 3;
const SECTION_END: &str = "ELEMENT INFORMATION";

/// Soil-layer columns that vary over time and are not part of the geometry.
const TRANSIENT_COLUMNS: &[&str] = &[
    "Date_time", "Date", "hNew", "thNew", "Vx", "Vy", "Q", "NO3N", "NH4N", "Temp", "CO2Conc",
    "O2Conc",
];

fn rename(label: &str) -> String {
    match label {
        "n" => "nodeNum",
        "x" => "X",
        "y" => "Y",
        "MatNum" => "Layer",
        other => other,
    }
    .to_string()
}

/// Parse the node section of a `.grd` file.
pub fn parse_grid(text: &str, file: &str) -> Result<OutputTable> {
    let mut lines = text.lines().skip(HEADER_LINE);
    let header = lines
        .next()
        .ok_or_else(|| Error::output(file, "grid file has no node header"))?;
    let columns: Vec<String> = header.split_whitespace().map(rename).collect();
    if columns.is_empty() {
        return Err(Error::output(file, "grid file has an empty node header"));
    }

    let rows = lines
        .take_while(|line| !line.contains(SECTION_END))
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut cells: Vec<CellValue> = line.split_whitespace().map(CellValue::parse).collect();
            cells.resize(columns.len(), CellValue::Null);
            cells
        })
        .collect();

    Ok(OutputTable {
        table: GEOMETRY_TABLE.to_string(),
        columns,
        rows,
    })
}

/// Coordinates compared at micro-unit resolution.
fn coordinate_key(row: &[CellValue], x: usize, y: usize) -> Option<(i64, i64)> {
    let x = row[x].as_f64()?;
    let y = row[y].as_f64()?;
    Some(((x * 1e6).round() as i64, (y * 1e6).round() as i64))
}

fn require(columns: &[String], name: &str, file: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| Error::output(file, format!("missing column '{name}'")))
}

/// Inner-join grid nodes with the static columns of the raw soil-layer file
/// on `(X, Y)`.
pub fn join_geometry(grid: &OutputTable, soil_layer: &[u8], file: &str) -> Result<OutputTable> {
    let (headers, rows) = read_table(soil_layer, file)?;

    let grid_x = require(&grid.columns, "X", "grid")?;
    let grid_y = require(&grid.columns, "Y", "grid")?;
    let soil_x = require(&headers, "X", file)?;
    let soil_y = require(&headers, "Y", file)?;

    let static_columns: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !TRANSIENT_COLUMNS.contains(&h.as_str()))
        .map(|(i, _)| i)
        .collect();
    let joined_columns: Vec<usize> = static_columns
        .iter()
        .copied()
        .filter(|&i| !grid.columns.contains(&headers[i]))
        .collect();

    let mut seen = HashSet::new();
    let mut by_node: HashMap<(i64, i64), Vec<Vec<CellValue>>> = HashMap::new();
    for row in &rows {
        let projected: Vec<CellValue> = static_columns.iter().map(|&i| row[i].clone()).collect();
        if !seen.insert(format!("{projected:?}")) {
            continue;
        }
        if let Some(key) = coordinate_key(row, soil_x, soil_y) {
            by_node
                .entry(key)
                .or_default()
                .push(joined_columns.iter().map(|&i| row[i].clone()).collect());
        }
    }

    let mut columns = grid.columns.clone();
    columns.extend(joined_columns.iter().map(|&i| headers[i].clone()));

    let mut joined = Vec::new();
    for node in &grid.rows {
        let Some(matches) = coordinate_key(node, grid_x, grid_y).and_then(|k| by_node.get(&k)) else {
            continue;
        };
        for extra in matches {
            let mut row = node.clone();
            row.extend(extra.iter().cloned());
            joined.push(row);
        }
    }

    Ok(OutputTable {
        table: GEOMETRY_TABLE.to_string(),
        columns,
        rows: joined,
    })
}
