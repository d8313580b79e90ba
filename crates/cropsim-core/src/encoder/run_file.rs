// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run file (`Run{site}.dat`): absolute paths of every model input and output.

use std::path::Path;

use super::InputFile;
use crate::crop::Crop;
use crate::run::RunSpec;

pub(crate) fn run_file(spec: &RunSpec, cultivar: &str, workdir: &Path) -> InputFile {
    let site = spec.site.as_str();
    let station = spec.station_type.as_str();
    let crop = spec.treatment.crop;

    let mut names = vec![
        format!("{station}.wea"),
        format!("{site}.tim"),
        "BiologyDefault.bio".to_string(),
        format!("{station}.cli"),
        format!("{site}.nit"),
        "NitrogenDefault.sol".to_string(),
        "GasID.gas".to_string(),
        format!("{}.soi", spec.soil),
        "MulchGeo.mul".to_string(),
        format!("{site}.man"),
        format!("{site}.irr"),
        format!("{site}.drp"),
        "WatMovParam.dat".to_string(),
        "Water3.DAT".to_string(),
        format!("{site}.ini"),
        format!("{cultivar}.var"),
        format!("{site}.grd"),
        format!("{site}.nod"),
        "MassBI.dat".to_string(),
        format!("{site}.g01"),
    ];
    if matches!(crop, Crop::Maize | Crop::Soybean) {
        names.push(format!("{site}.g02"));
    } else {
        names.push("plantstress.crp".to_string());
    }
    for ext in ["G03", "G04", "G05", "G06", "G07"] {
        names.push(format!("{site}.{ext}"));
    }
    names.extend(
        ["MassBI.out", "MassBlRunOff.out", "MassBlMulch.out", "runoffmassbl.txt"].map(String::from),
    );
    if crop == Crop::Cotton {
        names.extend(["Cotton.out", "Cotton.sum"].map(String::from));
    }

    let dir = workdir.display();
    let contents: String = names.iter().map(|name| format!("{dir}/{name}\n")).collect();
    InputFile::new(format!("Run{site}.dat"), contents)
}
