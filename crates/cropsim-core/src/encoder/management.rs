// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Management file (`{site}.man`): fertilizer, growth regulator, residue and
//! tillage blocks.

use super::InputFile;
use super::record::{Col, RecordWriter, cell};
use crate::crop::Crop;
use crate::timeline::{Action, FertilizerClass, SurfaceResidue, Timeline, TillageImplement};

/// Residue type assumed when the timeline has no Surface Residue operation.
pub const DEFAULT_RESIDUE: &str = "Rye";

const L14_6: Col = Col::left(14, 6);
const L14: Col = Col::left_plain(14);

/// The `.man` file plus the residue type that selects mulch parameters.
#[derive(Debug, Clone)]
pub(crate) struct Management {
    pub file: InputFile,
    pub residue_type: String,
}

pub(crate) fn management_file(site: &str, crop: Crop, timeline: &Timeline, row_spacing: f64) -> Management {
    // kg/ha to mg per half-row slab
    let factor = (row_spacing / 2.0) / 10_000.0 * 100.0;

    let mut fertilizers = Vec::new();
    let mut regulators = Vec::new();
    let mut residue: Option<(&str, &SurfaceResidue)> = None;
    let mut tillage: Option<(&str, TillageImplement)> = None;
    for op in &timeline.operations {
        match &op.action {
            Action::Fertilizer(f) => fertilizers.push((op.date.as_str(), f)),
            Action::GrowthRegulator(g) => regulators.push((op.date.as_str(), g)),
            Action::SurfaceResidue(r) => residue = Some((op.date.as_str(), r)),
            Action::Tillage { implement } => tillage = Some((op.date.as_str(), *implement)),
            _ => {}
        }
    }

    let mut w = RecordWriter::new();
    w.line("*** Script for management practices fertilizer, residue and tillage")
        .line("[N Fertilizer]")
        .line("****Script for chemical application module  *******mg/cm2= kg/ha* 0.01*rwsp*eomult*100")
        .line("Number of Fertilizer applications (max=25) mappl is in total mg N applied to grid (1 kg/ha = 1 mg/m2/width of application) application divided by width of grid in cm is kg ha-1")
        .record([(fertilizers.len() as i64, L14)])
        .line("mAppl is manure, lAppl is litter. Apply as mg/cm2 of slab same units as N")
        .line("tAppl(i)  AmtAppl(i) depth(i) lAppl_C(i) lAppl_N(i)  mAppl_C(i) mAppl_N(i)  (repeat these 3 lines for the number of fertilizer applications)");
    for (date, f) in &fertilizers {
        let carbon = f.carbon * factor;
        let nitrogen = f.nitrogen * factor;
        // (total N, litter C, litter N, manure C, manure N)
        let (total, litter_c, litter_n, manure_c, manure_n) = match f.class {
            FertilizerClass::Nitrogen => (nitrogen, 0.0, 0.0, 0.0, 0.0),
            FertilizerClass::Litter => (0.0, carbon, nitrogen, 0.0, 0.0),
            FertilizerClass::Manure => (0.0, 0.0, 0.0, carbon, nitrogen),
        };
        let mut cells = vec![format!("'{date}' ")];
        cells.extend(
            [total, f.depth, litter_c, litter_n, manure_c, manure_n]
                .into_iter()
                .map(|v| cell(v, L14_6)),
        );
        w.cells(&cells);
    }

    if crop == Crop::Cotton {
        w.line("[PGR]")
            .line("Number of PGR applications; 0: No PGR")
            .record([(regulators.len() as i64, L14)])
            .line("pgrDate\t\tBrand\tAppl_Method\tBand_Width Appl_Rate\tAppl_Unit");
        for (date, g) in &regulators {
            w.cells(&[
                format!("'{date}' '{}' ", g.chemical),
                cell(g.method_code, L14),
                cell(g.band_width, L14_6),
                cell(g.rate, L14_6),
                cell(g.unit_code, L14),
            ]);
        }
    }

    w.line("[Residue]")
        .line("****Script for residue/mulch application module")
        .line("**** Residue amount can be thickness ('t') or mass ('m')   ***")
        .line("application  1 or 0, 1(yes) 0(no)");
    match residue {
        None => {
            w.line("0");
        }
        Some((date, r)) => {
            let amount = if r.is_mass() { r.amount / 1000.0 } else { r.amount };
            let unit = r
                .application_type
                .chars()
                .next()
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or('t');
            w.line("1")
                .line("tAppl_R (i)    't' or 'm'      Mass (gr/m2) or thickness (cm)    vertical layers")
                .line("---either thickness  or Mass")
                .cells(&[
                    format!("'{date}'  '{unit}'  "),
                    cell(amount, L14_6),
                    "       3".to_string(),
                ]);
        }
    }

    w.line("[Tillage]").line("1: Tillage, 0: No till");
    match tillage.and_then(|(date, implement)| implement.depth_cm().map(|depth| (date, depth))) {
        None => {
            w.line("0");
        }
        Some((date, depth)) => {
            w.line("1")
                .line("Till Date Till Depth (cm)")
                .cells(&[format!("'{date}'  "), cell(depth, L14_6)]);
        }
    }

    let residue_type = residue
        .map(|(_, r)| r.residue_type.clone())
        .unwrap_or_else(|| DEFAULT_RESIDUE.to_string());
    Management {
        file: InputFile::new(format!("{site}.man"), w.finish()),
        residue_type,
    }
}
