// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agronomic timelines: the dated field operations of one treatment.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::crop::Crop;
use crate::error::{Error, Result};

/// Date format used by timelines and every encoded file.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Parse an operation date (`MM/DD/YYYY`, ISO dates accepted too).
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| Error::config(format!("invalid date '{value}'")))
}

/// `crop/experiment/treatment` identifier of a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreatmentKey {
    /// Crop simulated.
    pub crop: Crop,
    /// Experiment name.
    pub experiment: String,
    /// Treatment name within the experiment.
    pub treatment: String,
}

impl FromStr for TreatmentKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(crop), Some(experiment), Some(treatment))
                if !experiment.is_empty() && !treatment.is_empty() =>
            {
                Ok(Self {
                    crop: crop.parse()?,
                    experiment: experiment.to_string(),
                    treatment: treatment.to_string(),
                })
            }
            _ => Err(Error::config(format!(
                "treatment key '{s}' is not crop/experiment/treatment"
            ))),
        }
    }
}

impl TryFrom<String> for TreatmentKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TreatmentKey> for String {
    fn from(key: TreatmentKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for TreatmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.crop, self.experiment, self.treatment)
    }
}

/// Operation kind without its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Start of the simulated period, carries initial conditions.
    SimulationStart,
    /// Sowing or planting.
    Sowing,
    /// Crop emergence.
    Emergence,
    /// Soil tillage.
    Tillage,
    /// Fertilizer, manure or litter application.
    Fertilizer,
    /// Plant growth regulator application.
    GrowthRegulator,
    /// Residue left on the surface.
    SurfaceResidue,
    /// Irrigation event.
    Irrigation,
    /// Harvest.
    Harvest,
    /// End of the simulated period.
    SimulationEnd,
}

impl OperationKind {
    /// Human readable label, as used in launch validation messages.
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::SimulationStart => "Simulation Start",
            OperationKind::Sowing => "Sowing",
            OperationKind::Emergence => "Emergence",
            OperationKind::Tillage => "Tillage",
            OperationKind::Fertilizer => "Fertilizer",
            OperationKind::GrowthRegulator => "Plant Growth Regulator",
            OperationKind::SurfaceResidue => "Surface Residue",
            OperationKind::Irrigation => "Irrigation",
            OperationKind::Harvest => "Harvest",
            OperationKind::SimulationEnd => "Simulation End",
        }
    }
}

/// Initial conditions recorded on the Simulation Start operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialConditions {
    /// Plants per square metre.
    pub population: f64,
    /// 1.0 when the model irrigates automatically.
    #[serde(default)]
    pub auto_irrigation: f64,
    /// Horizontal seed position (cm).
    pub x_seed: f64,
    /// Seed depth below the surface (cm).
    pub y_seed: f64,
    /// Cation exchange capacity.
    pub cec: f64,
    /// Fraction of the slab width represented by the grid.
    pub eomult: f64,
    /// Row spacing (cm).
    pub row_spacing: f64,
    /// Cultivar name; required to launch.
    #[serde(default)]
    pub cultivar: Option<String>,
    /// Seed piece mass (g), potato only.
    #[serde(default)]
    pub seedpiece_mass: f64,
}

/// Tillage implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TillageImplement {
    /// 15 cm.
    #[serde(rename = "Moldboard plow")]
    MoldboardPlow,
    /// 10 cm.
    #[serde(rename = "Chisel plow")]
    ChiselPlow,
    /// 5 cm.
    #[serde(rename = "Vertical tillage")]
    VerticalTillage,
    /// No soil disturbance.
    #[serde(rename = "No tillage")]
    NoTillage,
}

impl TillageImplement {
    /// Working depth (cm), `None` for no tillage.
    pub fn depth_cm(self) -> Option<f64> {
        match self {
            TillageImplement::MoldboardPlow => Some(15.0),
            TillageImplement::ChiselPlow => Some(10.0),
            TillageImplement::VerticalTillage => Some(5.0),
            TillageImplement::NoTillage => None,
        }
    }
}

/// Fertilizer product class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FertilizerClass {
    /// Mineral nitrogen.
    #[serde(rename = "Fertilizer-N")]
    Nitrogen,
    /// Manure (carbon and nitrogen).
    Manure,
    /// Plant litter (carbon and nitrogen).
    Litter,
}

/// Fertilizer application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fertilizer {
    /// Product class.
    pub class: FertilizerClass,
    /// Application depth (cm).
    pub depth: f64,
    /// Carbon applied (kg/ha).
    #[serde(default)]
    pub carbon: f64,
    /// Nitrogen applied (kg/ha).
    #[serde(default)]
    pub nitrogen: f64,
}

/// Plant growth regulator application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthRegulator {
    /// Brand or chemical name.
    pub chemical: String,
    /// Application method code.
    pub method_code: i64,
    /// Band width (cm).
    pub band_width: f64,
    /// Application rate.
    pub rate: f64,
    /// Rate unit code.
    pub unit_code: i64,
}

/// Residue placed on the soil surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceResidue {
    /// Residue type, selects the mulch parameter set.
    pub residue_type: String,
    /// Either `Mass (kg/ha)` or a thickness label.
    pub application_type: String,
    /// Amount in the unit of `application_type`.
    pub amount: f64,
}

impl SurfaceResidue {
    /// True when the amount is a mass rather than a thickness.
    pub fn is_mass(&self) -> bool {
        self.application_type == "Mass (kg/ha)"
    }
}

/// Irrigation sub-types; each lands in its own block of the irrigation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all_fields = "camelCase")]
pub enum Irrigation {
    /// Sprinkler application.
    Sprinkler {
        /// Amount (mm/day).
        amount: i64,
    },
    /// Flood irrigation held at a ponding depth.
    #[serde(rename = "FloodH")]
    FloodDepth {
        /// Ponding depth (cm).
        pond_depth: f64,
        /// Start date.
        start_date: String,
        /// Start hour.
        start_hour: String,
        /// Stop date.
        stop_date: String,
        /// Stop hour.
        stop_hour: String,
    },
    /// Flood irrigation applied at a rate.
    #[serde(rename = "FloodR")]
    FloodRate {
        /// Ponding depth (cm).
        pond_depth: f64,
        /// Rate (cm/day).
        rate: i64,
        /// Start date.
        start_date: String,
        /// Start hour.
        start_hour: String,
        /// Stop date.
        stop_date: String,
        /// Stop hour.
        stop_hour: String,
    },
}

/// Operation payload, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Action {
    /// Simulation start with initial conditions.
    #[serde(rename = "Simulation Start")]
    SimulationStart(InitialConditions),
    /// Sowing.
    Sowing,
    /// Emergence.
    Emergence,
    /// Tillage.
    Tillage {
        /// Implement used.
        implement: TillageImplement,
    },
    /// Fertilizer.
    Fertilizer(Fertilizer),
    /// Plant growth regulator.
    #[serde(rename = "Plant Growth Regulator")]
    GrowthRegulator(GrowthRegulator),
    /// Surface residue.
    #[serde(rename = "Surface Residue")]
    SurfaceResidue(SurfaceResidue),
    /// Irrigation.
    Irrigation(Irrigation),
    /// Harvest.
    Harvest,
    /// Simulation end.
    #[serde(rename = "Simulation End")]
    SimulationEnd,
}

impl Action {
    /// Kind of this action.
    pub fn kind(&self) -> OperationKind {
        match self {
            Action::SimulationStart(_) => OperationKind::SimulationStart,
            Action::Sowing => OperationKind::Sowing,
            Action::Emergence => OperationKind::Emergence,
            Action::Tillage { .. } => OperationKind::Tillage,
            Action::Fertilizer(_) => OperationKind::Fertilizer,
            Action::GrowthRegulator(_) => OperationKind::GrowthRegulator,
            Action::SurfaceResidue(_) => OperationKind::SurfaceResidue,
            Action::Irrigation(_) => OperationKind::Irrigation,
            Action::Harvest => OperationKind::Harvest,
            Action::SimulationEnd => OperationKind::SimulationEnd,
        }
    }
}

/// One dated operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// `MM/DD/YYYY`.
    pub date: String,
    /// What happens on that date.
    #[serde(flatten)]
    pub action: Action,
}

/// Ordered operations of one treatment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    /// Operations in their recorded order.
    pub operations: Vec<Operation>,
}

impl Timeline {
    /// Create a timeline from operations.
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// First operation of a kind.
    pub fn first(&self, kind: OperationKind) -> Option<&Operation> {
        self.operations.iter().find(|op| op.action.kind() == kind)
    }

    /// Date string of the first operation of a kind.
    pub fn date_of(&self, kind: OperationKind) -> Option<&str> {
        self.first(kind).map(|op| op.date.as_str())
    }

    /// Date of the first operation of a kind, failing when it is absent.
    pub fn require_date(&self, kind: OperationKind) -> Result<NaiveDate> {
        let date = self
            .date_of(kind)
            .ok_or_else(|| Error::config(format!("timeline has no {} operation", kind.label())))?;
        parse_date(date)
    }

    /// Initial conditions of the Simulation Start operation.
    pub fn initial_conditions(&self) -> Result<&InitialConditions> {
        self.operations
            .iter()
            .find_map(|op| match &op.action {
                Action::SimulationStart(init) => Some(init),
                _ => None,
            })
            .ok_or_else(|| Error::config("timeline has no Simulation Start initial conditions"))
    }

    /// Earliest and latest operation dates.
    pub fn date_span(&self) -> Result<(NaiveDate, NaiveDate)> {
        let mut span: Option<(NaiveDate, NaiveDate)> = None;
        for op in &self.operations {
            let date = parse_date(&op.date)?;
            span = Some(match span {
                Some((lo, hi)) => (lo.min(date), hi.max(date)),
                None => (date, date),
            });
        }
        span.ok_or_else(|| Error::config("timeline has no operations"))
    }

    /// Reason the treatment cannot be launched, if any.
    ///
    /// Checks that a cultivar is set and that Simulation Start, Sowing,
    /// Harvest and Simulation End (those present) are in chronological order.
    pub fn launch_problem(&self) -> Option<String> {
        let has_cultivar = self
            .initial_conditions()
            .ok()
            .and_then(|init| init.cultivar.as_deref())
            .is_some_and(|c| !c.trim().is_empty());
        if !has_cultivar {
            return Some(
                "Please add cultivar for this experiment. Management-> experiment->treatment->cultivar."
                    .to_string(),
            );
        }

        let key_ops = [
            OperationKind::SimulationStart,
            OperationKind::Sowing,
            OperationKind::Harvest,
            OperationKind::SimulationEnd,
        ];
        let mut dated = Vec::with_capacity(key_ops.len());
        for kind in key_ops {
            if let Some(date) = self.date_of(kind) {
                match parse_date(date) {
                    Ok(parsed) => dated.push((kind, parsed)),
                    Err(_) => {
                        return Some(format!(
                            "Operation '{}' has invalid date: {date}",
                            kind.label()
                        ));
                    }
                }
            }
        }

        let wrong: Vec<String> = dated
            .windows(2)
            .filter(|pair| pair[1].1 < pair[0].1)
            .map(|pair| {
                format!(
                    "{} ({}) before {} ({})",
                    pair[0].0.label(),
                    pair[0].1.format(DATE_FORMAT),
                    pair[1].0.label(),
                    pair[1].1.format(DATE_FORMAT)
                )
            })
            .collect();

        if wrong.is_empty() {
            None
        } else {
            Some(format!(
                "The following operations are out of order: {}. Please ensure Simulation Start < Sowing < Harvest < Simulation End.",
                wrong.join("; ")
            ))
        }
    }
}
