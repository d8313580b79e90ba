// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Crop dispatch tables.
//!
//! Every crop-keyed decision in the pipeline (executable, output files,
//! destination tables, column pruning, telemetry columns) is a match over
//! [`Crop`] so adding a crop is checked for exhaustiveness by the compiler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Crop family simulated by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    /// Maize (MAIZSIM).
    Maize,
    /// Potato (SPUDSIM).
    Potato,
    /// Soybean (GLYCIM).
    Soybean,
    /// Cotton (GOSSYM).
    Cotton,
    /// Bare soil; runs the maize binary with crop dates pushed past the end.
    Fallow,
}

impl Crop {
    /// All crops, in a stable order.
    pub const ALL: [Crop; 5] = [
        Crop::Maize,
        Crop::Potato,
        Crop::Soybean,
        Crop::Cotton,
        Crop::Fallow,
    ];

    /// Lowercase tag used in treatment keys and table names.
    pub fn as_str(self) -> &'static str {
        match self {
            Crop::Maize => "maize",
            Crop::Potato => "potato",
            Crop::Soybean => "soybean",
            Crop::Cotton => "cotton",
            Crop::Fallow => "fallow",
        }
    }

    /// File name of the crop model executable.
    pub fn executable(self) -> &'static str {
        match self {
            Crop::Maize | Crop::Fallow => "maizsim",
            Crop::Potato => "spudsim",
            Crop::Soybean => "glycim",
            Crop::Cotton => "gossym",
        }
    }

    /// Output files the crop model produces that are ingested.
    pub fn output_kinds(self) -> &'static [OutputKind] {
        use OutputKind::*;
        match self {
            Crop::Maize | Crop::Cotton => &[Growth, G03, G04, G05, G07, PlantStress],
            Crop::Potato | Crop::Soybean => &[Growth, G03, G04, G05, G07, PlantStress, Nitrogen],
            Crop::Fallow => &[G03, G05, G07],
        }
    }

    /// Columns pushed to telemetry clients, `None` meaning every column.
    pub fn telemetry_columns(self) -> Option<&'static [&'static str]> {
        match self {
            Crop::Maize => Some(&["SoilT", "SolRad", "TotLeafDM", "ETdmd"]),
            Crop::Soybean => Some(&["LAI", "totalDM", "podDM", "Tr_act"]),
            Crop::Potato => Some(&["LAI", "totalDM", "tuberDM", "Tr-Pot"]),
            Crop::Cotton => Some(&["LAI", "PlantDM", "Yield", "Nodes"]),
            Crop::Fallow => None,
        }
    }

    /// Every destination table a run of this crop can write to, excluding `geometry`.
    pub fn tables(self) -> Vec<String> {
        self.output_kinds()
            .iter()
            .map(|kind| kind.table_name(self))
            .collect()
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Crop {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maize" => Ok(Crop::Maize),
            "potato" => Ok(Crop::Potato),
            "soybean" => Ok(Crop::Soybean),
            "cotton" => Ok(Crop::Cotton),
            "fallow" => Ok(Crop::Fallow),
            other => Err(Error::config(format!("unknown crop '{other}'"))),
        }
    }
}

/// How an output file encodes time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampConvention {
    /// `date` column (`M/D/YYYY`) plus integer `time` hour column.
    CalendarHour,
    /// `Date_time` fractional day count from 1899-12-30, rounded to the hour.
    DayOffset,
}

/// One ingested output file family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Primary per-timestep plant growth file (`.g01`), also the telemetry source.
    Growth,
    /// Nodal soil state (`.G03`).
    G03,
    /// Root and soil element file (`.G04`).
    G04,
    /// Surface water and flux balance (`.G05`).
    G05,
    /// Soil carbon and nitrogen pools (`.G07`).
    G07,
    /// Plant stress factors (`plantstress.crp`).
    PlantStress,
    /// Plant nitrogen balance (`nitrogen.crp`).
    Nitrogen,
}

impl OutputKind {
    /// File name inside the working directory.
    pub fn file_name(self, site: &str) -> String {
        match self {
            OutputKind::Growth => format!("{site}.g01"),
            OutputKind::G03 => format!("{site}.G03"),
            OutputKind::G04 => format!("{site}.G04"),
            OutputKind::G05 => format!("{site}.G05"),
            OutputKind::G07 => format!("{site}.G07"),
            OutputKind::PlantStress => "plantstress.crp".to_string(),
            OutputKind::Nitrogen => "nitrogen.crp".to_string(),
        }
    }

    /// Destination table for this file and crop.
    pub fn table_name(self, crop: Crop) -> String {
        let prefix = match self {
            OutputKind::Growth => "g01",
            OutputKind::G03 => "g03",
            OutputKind::G04 => "g04",
            OutputKind::G05 => "g05",
            OutputKind::G07 => "g07",
            OutputKind::PlantStress => "plantstress",
            OutputKind::Nitrogen => "nitrogen",
        };
        format!("{prefix}_{crop}")
    }

    /// Time encoding used by the file.
    pub fn convention(self) -> TimestampConvention {
        match self {
            OutputKind::Growth | OutputKind::PlantStress | OutputKind::Nitrogen => {
                TimestampConvention::CalendarHour
            }
            OutputKind::G03 | OutputKind::G04 | OutputKind::G05 | OutputKind::G07 => {
                TimestampConvention::DayOffset
            }
        }
    }

    /// Columns removed before storage, beyond the raw time columns.
    pub fn dropped_columns(self, crop: Crop) -> &'static [&'static str] {
        match (self, crop) {
            (OutputKind::G03, _) => &["Area", "Vx", "Vy"],
            (OutputKind::Nitrogen, Crop::Potato | Crop::Soybean)
            | (OutputKind::PlantStress, Crop::Potato | Crop::Soybean | Crop::Cotton)
            | (OutputKind::Growth, Crop::Cotton) => &["jday"],
            _ => &[],
        }
    }

    /// Explicit label renames applied before the generic `/` replacement.
    pub fn renamed_columns(self, crop: Crop) -> &'static [(&'static str, &'static str)] {
        match (self, crop) {
            (OutputKind::Nitrogen, Crop::Potato) => &[("Seed N", "seed_N")],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallow_reuses_maize_binary_with_fewer_outputs() {
        assert_eq!(Crop::Fallow.executable(), Crop::Maize.executable());
        assert_eq!(
            Crop::Fallow.output_kinds(),
            &[OutputKind::G03, OutputKind::G05, OutputKind::G07]
        );
    }

    #[test]
    fn test_nitrogen_only_for_potato_and_soybean() {
        for crop in Crop::ALL {
            let has_nitrogen = crop.output_kinds().contains(&OutputKind::Nitrogen);
            assert_eq!(has_nitrogen, matches!(crop, Crop::Potato | Crop::Soybean));
        }
    }

    #[test]
    fn test_table_names() {
        assert_eq!(OutputKind::Growth.table_name(Crop::Maize), "g01_maize");
        assert_eq!(OutputKind::G07.table_name(Crop::Fallow), "g07_fallow");
        assert_eq!(
            OutputKind::PlantStress.table_name(Crop::Cotton),
            "plantstress_cotton"
        );
    }

    #[test]
    fn test_parse_crop() {
        assert_eq!("Soybean".parse::<Crop>().unwrap(), Crop::Soybean);
        assert!("wheat".parse::<Crop>().is_err());
    }

    #[test]
    fn test_jday_pruning_is_explicit() {
        assert_eq!(OutputKind::Growth.dropped_columns(Crop::Cotton), &["jday"]);
        assert!(OutputKind::Growth.dropped_columns(Crop::Maize).is_empty());
        assert!(OutputKind::PlantStress.dropped_columns(Crop::Maize).is_empty());
    }
}
