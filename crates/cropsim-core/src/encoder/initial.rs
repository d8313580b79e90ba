// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Initialization file (`{site}.ini`).
//!
//! Besides the file itself this step yields the row spacing and root weight
//! per slab that the nitrogen and layer files need.

use chrono::{Days, NaiveDate};

use super::InputFile;
use super::record::{F14_6, I14, RecordWriter, cell, py_float};
use crate::catalog::{Site, SoilProfile};
use crate::crop::Crop;
use crate::error::{Error, Result};
use crate::run::RunSpec;
use crate::timeline::{DATE_FORMAT, OperationKind, Timeline};

const ROW_ANGLE: f64 = 0.0;
const TIME_STEP_MINUTES: i64 = 60;
/// Fallow runs push the crop dates past the season so no crop is ever planted.
const FALLOW_SOWING_OFFSET_DAYS: u64 = 370;
const FALLOW_END_OFFSET_DAYS: u64 = 365;

/// The `.ini` file and the values derived while writing it.
#[derive(Debug, Clone)]
pub(crate) struct Initialization {
    pub file: InputFile,
    pub row_spacing: f64,
    pub root_weight_per_slab: f64,
}

fn date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn initialization_file(
    spec: &RunSpec,
    timeline: &Timeline,
    site: &Site,
    soil: &SoilProfile,
) -> Result<Initialization> {
    let crop = spec.treatment.crop;
    let init = timeline.initial_conditions()?;
    let row_spacing = init.row_spacing;
    let pop_row = row_spacing / 100.0 * init.population;
    let y_seed = soil.max_depth() - init.y_seed;

    let mut w = RecordWriter::new();
    w.line("***Initialization data for location")
        .line("POPROW  ROWSP  Plant Density      ROWANG  xSeed  ySeed         CEC    EOMult")
        .uniform(
            &[
                pop_row,
                row_spacing,
                init.population,
                ROW_ANGLE,
                init.x_seed,
                y_seed,
                init.cec,
                init.eomult,
            ],
            F14_6,
        )
        .line("Latitude longitude altitude")
        .uniform(&[site.latitude, site.longitude, site.altitude], F14_6);

    let auto_irrigation = py_float(init.auto_irrigation);
    let root_weight_per_slab = match crop {
        Crop::Maize | Crop::Fallow => {
            let (sowing, end) = if crop == Crop::Fallow {
                let start = timeline.require_date(OperationKind::SimulationStart)?;
                let end = timeline.require_date(OperationKind::SimulationEnd)?;
                let (Some(sowing), Some(end)) = (
                    start.checked_add_days(Days::new(FALLOW_SOWING_OFFSET_DAYS)),
                    end.checked_add_days(Days::new(FALLOW_END_OFFSET_DAYS)),
                ) else {
                    return Err(Error::config("simulation dates are out of range"));
                };
                (sowing, end)
            } else {
                (
                    timeline.require_date(OperationKind::Sowing)?,
                    timeline.require_date(OperationKind::SimulationEnd)?,
                )
            };
            w.line("AutoIrrigate")
                .line(&auto_irrigation)
                .line("Planting          Emergence           End           TimeStep(m)    sowing and end dates for fallow are set in the future so the soil model will not call a crop")
                .line(format!("'{}'  '{}'  {TIME_STEP_MINUTES}", date(sowing), date(end)));
            0.0
        }
        Crop::Potato => {
            let sowing = timeline.require_date(OperationKind::Sowing)?;
            let emergence = timeline.require_date(OperationKind::Emergence)?;
            let end = timeline.require_date(OperationKind::SimulationEnd)?;
            w.line("Seed  Depth  Length  Bigleaf")
                .cells(&[
                    cell(init.seedpiece_mass, F14_6),
                    cell(init.y_seed, F14_6),
                    cell(init.x_seed, F14_6),
                    cell(1_i64, I14),
                ])
                .line("Planting          Emergence          End\tTimeStep(m)")
                .line(format!(
                    "'{}'  '{}'  '{}'  {TIME_STEP_MINUTES}",
                    date(sowing),
                    date(emergence),
                    date(end)
                ))
                .line("AutoIrrigate")
                .line(&auto_irrigation)
                .line("Stresses (Nitrogen, Water stress: 1-nonlimiting, 2-limiting): Simulation Type (1-meteorological, 2-physiological)")
                .line("Nstressoff  Wstressoff  Water-stress-simulation-method")
                .line(format!("{}    {}    0", spec.water_stress, spec.nitrogen_stress));
            let pop_slab = row_spacing / 100.0 * 0.5 * 0.01 * init.population;
            init.seedpiece_mass * 0.25 * pop_slab
        }
        Crop::Soybean => {
            let sowing = timeline.require_date(OperationKind::Sowing)?;
            let emergence = timeline.require_date(OperationKind::Emergence)?;
            let end = timeline.require_date(OperationKind::SimulationEnd)?;
            w.line("AutoIrrigate")
                .line(&auto_irrigation)
                .line("Sowing          Emergence          End\tTimeStep(m)")
                .line(format!(
                    "'{}'  '{}'  '{}'  {TIME_STEP_MINUTES}",
                    date(sowing),
                    date(emergence),
                    date(end)
                ));
            let pop_slab = row_spacing / 100.0 * init.eomult * 0.01 * init.population;
            0.0275 * pop_slab
        }
        Crop::Cotton => {
            let emergence = timeline.require_date(OperationKind::Emergence)?;
            let harvest = timeline.require_date(OperationKind::Harvest)?;
            w.line("AutoIrrigate")
                .line(&auto_irrigation)
                .line("Emergence          End\tTimeStep(m)")
                .line(format!(
                    "'{}'  '{}'  {TIME_STEP_MINUTES}",
                    date(emergence),
                    date(harvest)
                ));
            let pop_slab = row_spacing / 100.0 * init.eomult * 0.01 * init.population;
            0.2 * pop_slab
        }
    };

    w.line("output soils data (g03, g04, g05 and g06 files) 1 if true")
        .line("no soil files        output soil files")
        .line("    0                   1");

    Ok(Initialization {
        file: InputFile::new(format!("{}.ini", spec.site), w.finish()),
        row_spacing,
        root_weight_per_slab,
    })
}
