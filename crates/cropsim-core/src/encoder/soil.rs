// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Soil files: hydraulics (`.soi`), texture summary (`{site}.dat`),
//! nitrogen constants (`.nit`) and the grid generator layer file (`.lyr`).

use super::InputFile;
use super::record::{Col, F14_3, I14, RecordWriter, cell, py_float};
use crate::catalog::SoilProfile;

const SOI: Col = Col::left(9, 6);
const DAT: Col = Col::left(8, 3);

pub(crate) fn hydraulics_file(soil: &SoilProfile) -> InputFile {
    let mut w = RecordWriter::new();
    w.line("           *** Material information ****                                                                   g/g")
        .line("   thr       ths         tha       th      Alfa      n        Ks         Kk       thk       BulkD     OM    Sand    Silt");
    for l in &soil.layers {
        w.uniform(
            &[
                l.thr,
                l.ths,
                l.tha,
                l.th,
                l.alfa,
                l.n,
                l.ks,
                l.kk,
                l.thk,
                l.bd,
                l.om_pct / 100.0,
                l.sand,
                l.silt,
            ],
            SOI,
        );
    }
    InputFile::new(format!("{}.soi", soil.name), w.finish())
}

pub(crate) fn texture_file(site: &str, soil: &SoilProfile) -> InputFile {
    let mut w = RecordWriter::new();
    w.line(" Matnum      sand     silt    clay     bd     om   TH33       TH1500 ");
    for (index, l) in soil.layers.iter().enumerate() {
        let mut cells = vec![cell(index as i64 + 1, Col::left_plain(5))];
        cells.extend(
            [l.sand, l.silt, l.clay, l.bd, l.om_pct / 100.0, l.th33, l.th1500]
                .into_iter()
                .map(|v| cell(v, DAT)),
        );
        w.cells(&cells);
    }
    InputFile::new(format!("{site}.dat"), w.finish())
}

pub(crate) fn nitrogen_file(site: &str, soil: &SoilProfile, row_spacing: f64) -> InputFile {
    let mut w = RecordWriter::new();
    w.line(" *** SoilNit parameters for location ***")
        .line("ROW SPACING (m)")
        .line(py_float(row_spacing / 100.0))
        .line("                             Potential rate constants:       Ratios and fractions:")
        .line("m      kh     kL       km       kn        kd             fe   fh    r0   rL    rm   fa    nq   cs");
    for (index, l) in soil.layers.iter().enumerate() {
        w.cells(&[
            cell(index as i64 + 1, Col::left_plain(14)),
            cell(l.kh, Col::left(14, 5)),
            cell(l.kl, Col::left(14, 3)),
            cell(l.km, Col::left(14, 6)),
            cell(l.kn, Col::left(14, 1)),
            cell(l.kd, Col::left(14, 5)),
            cell(l.fe, Col::left(14, 1)),
            cell(l.fh, Col::left(14, 1)),
            cell(l.r0, Col::left(14, 6)),
            cell(l.rl, Col::left(14, 6)),
            cell(l.rm, Col::left(14, 6)),
            cell(l.fa, Col::left(14, 1)),
            cell(l.nq, Col::left(14, 6)),
            cell(l.cs, Col::left(14, 5)),
        ]);
    }
    InputFile::new(format!("{site}.nit"), w.finish())
}

pub(crate) fn layer_file(
    site: &str,
    soil: &SoilProfile,
    row_spacing: f64,
    root_weight_per_slab: f64,
) -> InputFile {
    let mut w = RecordWriter::new();
    w.line("surface ratio    internal ratio: ratio of the distance between two neighboring nodes");
    for g in &soil.grid_ratios {
        w.cells(&[
            cell(g.sr1, Col::bare(6)),
            cell(g.sr2, F14_3),
            cell(g.ir1, F14_3),
            cell(g.ir2, F14_3),
        ]);
    }
    w.line("RowSpacing").cells(&[cell(row_spacing, Col::bare(6))]);

    w.line(" Planting Depth  X limit for roots");
    for g in &soil.grid_ratios {
        w.cells(&[
            cell(g.planting_depth, Col::bare(6)),
            cell(g.x_limit_root, F14_3),
            cell(root_weight_per_slab, F14_3),
        ]);
    }

    w.line("Surface water Boundary Code  surface and bottom Gas boundary codes(for all bottom nodes) 1 constant -2 seepage face, 7 drainage, 4 atmospheric")
        .line("water boundary code for bottom layer, gas BC for the surface and bottom layers");
    for g in &soil.grid_ratios {
        w.cells(&[
            g.bottom_bc.to_string(),
            cell(g.gas_bc_top, I14),
            cell(g.gas_bc_bottom, I14),
        ]);
    }

    w.line(concat!(
        " Bottom depth   Init Type  OM (%/100)   Humus_C    Humus_N    Litter_C    Litter_N    Manure_C    Manure_N  no3(ppm)  NH4  ",
        "                        hNew  Tmpr     CO2     O2    N2O    Sand     Silt    Clay     BD     TH33     TH1500  thr ths tha th  Alfa    n   Ks  Kk  thk",
    ))
    .line(concat!(
        " cm         w/m       Frac      ppm    ppm    ppm    ppm   ppm    ppm   ppm     ppm   cm     0C     ppm   ppm  ----  fraction---     ",
        "                        g/cm3    cm3/cm3   cm3/cm3",
    ));

    for l in &soil.layers {
        let init_type = if l.init_type == 1 { "'m'" } else { "'w'" };
        let mut cells = vec![
            (l.bottom_depth as i64).to_string(),
            cell(init_type, Col::right_plain(14)),
        ];
        cells.extend(
            [
                l.om_pct / 100.0,
                -1.0,
                -1.0,
                0.0,
                0.0,
                0.0,
                0.0,
                l.no3,
                l.nh4,
                l.h_new,
                l.tmpr,
                l.co2,
                l.o2,
                l.n2o,
                l.sand / 100.0,
                l.silt / 100.0,
                l.clay / 100.0,
                l.bd,
                l.th33,
                l.th1500,
                l.thr,
                l.ths,
                l.tha,
                l.th,
                l.alfa,
                l.n,
                l.ks,
                l.kk,
                l.thk,
            ]
            .into_iter()
            .map(|v| cell(v, F14_3)),
        );
        w.cells(&cells);
    }
    InputFile::new(format!("{site}.lyr"), w.finish())
}
