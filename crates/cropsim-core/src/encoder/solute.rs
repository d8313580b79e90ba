// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Solute mover (`NitrogenDefault.sol`) and gas movement (`GasID.gas`) files.

use super::InputFile;
use super::record::{Col, F14_6, I14, RecordWriter, cell, trimmed};
use crate::catalog::{ModelDefaults, SoilProfile};
use crate::error::{Error, Result};

/// USDA soil texture class from sand and clay percentages.
pub fn texture_class(sand: f64, clay: f64) -> &'static str {
    let silt = 100.0 - sand - clay;
    if silt + 1.5 * clay < 15.0 {
        "sand"
    } else if silt + 2.0 * clay < 30.0 {
        "loamy sand"
    } else if clay >= 40.0 && silt >= 40.0 {
        "silty clay"
    } else if clay >= 40.0 && sand <= 45.0 {
        "clay"
    } else if clay >= 35.0 && sand > 45.0 {
        "sandy clay"
    } else if clay >= 27.0 && sand <= 20.0 {
        "silty clay loam"
    } else if clay >= 27.0 && sand <= 45.0 {
        "clay loam"
    } else if clay >= 20.0 && silt < 28.0 && sand > 45.0 {
        "sandy clay loam"
    } else if silt >= 80.0 && clay < 12.0 {
        "silt"
    } else if silt >= 50.0 {
        "silt loam"
    } else if clay >= 7.0 && silt >= 28.0 && sand <= 52.0 {
        "loam"
    } else {
        "sandy loam"
    }
}

fn dispersivity(defaults: &ModelDefaults, texture: &str) -> Result<f64> {
    defaults
        .dispersivity
        .iter()
        .find(|(class, _)| class.eq_ignore_ascii_case(texture))
        .map(|(_, alpha)| *alpha)
        .ok_or_else(|| Error::config(format!("no dispersivity for texture class '{texture}'")))
}

pub(crate) fn solute_file(soil: &SoilProfile, defaults: &ModelDefaults) -> Result<InputFile> {
    let solute = &defaults.solute;
    let mut w = RecordWriter::new();
    w.line("*** SOLUTE MOVER PARAMETER INFORMATION ***")
        .line("Number of solutes")
        .line("1")
        .line("Computational parameters")
        .line("EPSI        lUpW             CourMax")
        .cells(&[
            trimmed(solute.epsi, 6),
            cell(solute.iupw, I14),
            cell(solute.cour_max, F14_6),
        ])
        .line("Material Information")
        .line("Solute#, Ionic/molecular diffusion coefficients of solutes")
        .uniform(&[1.0, solute.diffusion_coeff], F14_6)
        .line("Solute#, Layer#, Longitudinal Dispersivity, Transversal Dispersivity (units are cm)");

    for (index, layer) in soil.layers.iter().enumerate() {
        let alpha = dispersivity(defaults, texture_class(layer.sand, layer.clay))?;
        w.cells(&[
            cell(1_i64, Col::right_plain(9)),
            cell(index as i64 + 1, I14),
            cell(alpha, F14_6),
            cell(alpha / 2.0, F14_6),
        ]);
    }
    w.line("");
    Ok(InputFile::new("NitrogenDefault.sol", w.finish()))
}

pub(crate) fn gas_file(defaults: &ModelDefaults) -> Result<InputFile> {
    let [co2, o2, methane, ..] = defaults.gases.as_slice() else {
        return Err(Error::config(format!(
            "gas movement needs CO2, oxygen and methane, {} gases configured",
            defaults.gases.len()
        )));
    };
    let mut w = RecordWriter::new();
    w.line("*** Gas Movement Parameters Information ***")
        .line("Number of gases")
        .record([(defaults.gases.len() as i64, I14)])
        .line("Computational parameters")
        .line("EPSI")
        .uniform(&[co2.epsi], F14_6)
        .line("Reduced tortuosity rate change with water content (bTort)")
        .line("for entire soil domain")
        .uniform(&[co2.btort], F14_6)
        .line("Gas diffusion coefficients in air at standard conditions, cm2/day")
        .line("Gas # 1 (CO2) Gas # 2 (Oxygen) Gas # 3 (Methane)")
        .uniform(
            &[co2.diffusion_coeff, o2.diffusion_coeff, methane.diffusion_coeff],
            F14_6,
        )
        .line("");
    Ok(InputFile::new("GasID.gas", w.finish()))
}
