// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read-only access to agronomic configuration.
//!
//! The pipeline never writes agronomic data; it reads sites, soils, weather,
//! cultivars, timelines and model defaults through [`AgronomicCatalog`].
//! [`StaticCatalog`] serves them from a JSON snapshot.

mod snapshot;

pub use snapshot::{CatalogSnapshot, StaticCatalog, TreatmentTimeline};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::crop::Crop;
use crate::error::Result;
use crate::timeline::{Timeline, TreatmentKey};

/// Field site location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Site name, also the base name of most input files.
    pub name: String,
    /// Decimal degrees.
    pub latitude: f64,
    /// Decimal degrees.
    pub longitude: f64,
    /// Metres above sea level.
    pub altitude: f64,
}

/// One soil layer with hydraulic, texture, nitrogen and initial-state fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    pub bottom_depth: f64,
    /// 1 when initial water is given as matric potential ('m'), otherwise content ('w').
    pub init_type: i64,
    pub om_pct: f64,
    pub no3: f64,
    pub nh4: f64,
    pub h_new: f64,
    pub tmpr: f64,
    pub co2: f64,
    pub o2: f64,
    pub n2o: f64,
    pub sand: f64,
    pub silt: f64,
    pub clay: f64,
    pub bd: f64,
    pub th33: f64,
    pub th1500: f64,
    pub thr: f64,
    pub ths: f64,
    pub tha: f64,
    pub th: f64,
    pub alfa: f64,
    pub n: f64,
    pub ks: f64,
    pub kk: f64,
    pub thk: f64,
    pub kh: f64,
    pub kl: f64,
    pub km: f64,
    pub kn: f64,
    pub kd: f64,
    pub fe: f64,
    pub fh: f64,
    pub r0: f64,
    pub rl: f64,
    pub rm: f64,
    pub fa: f64,
    pub nq: f64,
    pub cs: f64,
}

/// Grid spacing and boundary settings for the grid generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRatio {
    pub sr1: f64,
    pub sr2: f64,
    pub ir1: f64,
    pub ir2: f64,
    pub planting_depth: f64,
    pub x_limit_root: f64,
    pub bottom_bc: i64,
    pub gas_bc_top: i64,
    pub gas_bc_bottom: i64,
}

/// A named soil profile, layers ordered top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    pub name: String,
    pub layers: Vec<SoilLayer>,
    pub grid_ratios: Vec<GridRatio>,
}

impl SoilProfile {
    /// Depth of the deepest layer bottom (cm).
    pub fn max_depth(&self) -> f64 {
        self.layers
            .iter()
            .map(|layer| layer.bottom_depth)
            .fold(0.0, f64::max)
    }
}

/// Station constants written to the climate file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherMeta {
    pub latitude: f64,
    pub longitude: f64,
    pub bsolar: f64,
    pub btemp: f64,
    pub atemp: f64,
    pub bwind: f64,
    pub bir: f64,
    pub avg_wind: f64,
    pub avg_rain_rate: f64,
    pub chem_conc: f64,
    pub avg_co2: f64,
}

/// One daily or hourly weather observation. Optional channels may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub jday: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub hour: Option<i64>,
    #[serde(default)]
    pub srad: Option<f64>,
    #[serde(default)]
    pub tmax: Option<f64>,
    #[serde(default)]
    pub tmin: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub rain: Option<f64>,
    #[serde(default)]
    pub wind: Option<f64>,
    #[serde(default)]
    pub rh: Option<f64>,
    #[serde(default)]
    pub co2: Option<f64>,
}

/// A weather station series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStation {
    /// Station identifier.
    pub station: String,
    /// Station-type label; base name of the weather and climate files.
    pub station_type: String,
    pub meta: WeatherMeta,
    pub records: Vec<WeatherRecord>,
}

/// Cultivar genetic coefficients in the crop model's positional order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cultivar {
    pub crop: Crop,
    pub name: String,
    pub parameters: Vec<f64>,
}

/// Abiotic response parameters for the biology file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiologyDefaults {
    pub dth_h: f64,
    pub dth_l: f64,
    pub es: f64,
    pub th_m: f64,
    pub tb: f64,
    pub qt: f64,
    pub dth_d: f64,
    pub th_d: f64,
}

/// Solute mover parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoluteDefaults {
    pub epsi: f64,
    pub iupw: i64,
    pub cour_max: f64,
    pub diffusion_coeff: f64,
}

/// Gas movement parameters; the first three gases are CO2, O2 and methane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gas {
    pub name: String,
    pub epsi: f64,
    pub btort: f64,
    pub diffusion_coeff: f64,
}

/// Mulch parameters for one residue type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mulch {
    /// Grid, radiation, numerical and mass properties in file order.
    pub geometry: [f64; 14],
    /// Decomposition factors, carbon fractions, nitrogen fractions and rates.
    pub decomposition: [f64; 11],
}

/// Model-wide defaults shared by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefaults {
    pub biology: BiologyDefaults,
    pub solute: SoluteDefaults,
    pub gases: Vec<Gas>,
    /// Longitudinal dispersivity (cm) by USDA texture class.
    pub dispersivity: BTreeMap<String, f64>,
    /// Mulch parameters by residue type.
    pub mulch: BTreeMap<String, Mulch>,
}

/// Read-only source of agronomic configuration.
#[async_trait]
pub trait AgronomicCatalog: Send + Sync {
    /// Site by name.
    async fn site(&self, name: &str) -> Result<Site>;

    /// Soil profile by name.
    async fn soil(&self, name: &str) -> Result<SoilProfile>;

    /// Weather series for a station and station-type label.
    async fn weather(&self, station: &str, station_type: &str) -> Result<WeatherStation>;

    /// Cultivar parameters.
    async fn cultivar(&self, crop: Crop, name: &str) -> Result<Cultivar>;

    /// Timeline of a treatment.
    async fn timeline(&self, key: &TreatmentKey) -> Result<Timeline>;

    /// Model-wide defaults.
    async fn defaults(&self) -> Result<ModelDefaults>;
}
