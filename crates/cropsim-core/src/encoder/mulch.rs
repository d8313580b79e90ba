// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mulch file (`MulchGeo.mul`).

use super::InputFile;
use super::record::{compact, compact_trimmed};
use crate::catalog::ModelDefaults;
use crate::error::{Error, Result};

fn geometry_row(values: &[f64]) -> String {
    values.iter().map(|v| format!("{:<10}", compact(*v))).collect()
}

fn decomposition_row(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:<10}", compact_trimmed(*v, 4)))
        .collect()
}

pub(crate) fn mulch_file(defaults: &ModelDefaults, residue_type: &str) -> Result<InputFile> {
    let mulch = defaults
        .mulch
        .get(residue_type)
        .ok_or_else(|| Error::config(format!("no mulch parameters for residue type '{residue_type}'")))?;
    let g = &mulch.geometry;
    let d = &mulch.decomposition;

    let lines = [
        "*** Mulch Material information ****  based on g, m^3, J and oC".to_string(),
        "[Basic_Mulch_Configuration]".to_string(),
        "********The mulch grid configuration********".to_string(),
        "Minimal Grid Size for Horizontal Element".to_string(),
        geometry_row(&g[0..1]),
        "********Simulation Specifications (1=Yes; 0=No)********".to_string(),
        "Only_Diffusive_Flux     Neglect_LongWave_Radiation      Include_Mulch_Decomputions".to_string(),
        geometry_row(&g[1..4]),
        "[Mulch_Radiation]".to_string(),
        "********Mulch Radiation Properties********".to_string(),
        "DeltaRshort DeltaRlong  Omega   epsilon_mulch   alpha_mulch".to_string(),
        geometry_row(&g[4..9]),
        "[Numerical_Controls]".to_string(),
        "********Picard Iteration COntrol********".to_string(),
        "Max Iteration Step (before time step shrinkage) Tolerence for Convergence (%)".to_string(),
        geometry_row(&g[9..11]),
        "[Mulch_Mass_Properties]".to_string(),
        "********Some Basic Information such as density, porosity and empirical parameters********".to_string(),
        "VRho_Mulch g/m3  Pore_Space  Max Held Ponding Depth".to_string(),
        geometry_row(&g[11..14]),
        "[Mulch_Decomposition]".to_string(),
        "********Overall Factors********".to_string(),
        "Contacting_Fraction Feeding_Coef".to_string(),
        decomposition_row(&d[0..2]),
        "The Fraction of Three Carbon Formats (Initial Value)".to_string(),
        "Carbonhydrate(CARB)    Holo-Cellulose (CEL)   Lignin (LIG)".to_string(),
        decomposition_row(&d[2..5]),
        "The Fraction of N in Three Carbon Formats (Initial Value)".to_string(),
        " Carbonhydrate(CARB)    Holo-Cellulose (CEL)   Lignin (LIG)".to_string(),
        decomposition_row(&d[5..8]),
        "The Intrinsic Decomposition Speed of Three Carbon Formats (day^-1)".to_string(),
        " Carbonhydrate(CARB)    Holo-Cellulose (CEL)   Lignin (LIG)".to_string(),
        decomposition_row(&d[8..11]),
    ];
    let mut contents = lines.join("\n");
    contents.push('\n');
    Ok(InputFile::new("MulchGeo.mul", contents))
}
