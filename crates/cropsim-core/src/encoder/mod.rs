// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Format Encoder.
//!
//! Compiles agronomic configuration into the positional text files the crop
//! models read. Encoding is split in two steps:
//!
//! 1. [`RunInputs::gather`] pulls everything a run needs from the catalog
//!    into one owned snapshot.
//! 2. [`encode`] turns that snapshot into named file contents without
//!    touching the filesystem, so the same inputs always yield byte-identical
//!    files. [`EncodedInputs::write_to`] then writes them in one step.
//!
//! Static model files (`Water.DAT`, `WaterBound.DAT`, `fallow.var`) are
//! copied separately by [`install_assets`].

mod assets;
mod biology;
mod cultivar;
mod initial;
mod irrigation;
mod management;
mod mulch;
pub mod record;
mod run_file;
mod soil;
mod solute;
mod time;
mod weather;

pub use assets::install_assets;
pub use cultivar::parameter_count;
pub use management::DEFAULT_RESIDUE;
pub use solute::texture_class;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{AgronomicCatalog, Cultivar, ModelDefaults, Site, SoilProfile, WeatherStation};
use crate::crop::Crop;
use crate::error::{Error, Result};
use crate::run::RunSpec;
use crate::timeline::Timeline;

/// Cultivar name used for fallow runs; matches the stored `fallow.var`.
pub const FALLOW_CULTIVAR: &str = "fallow";

/// One generated input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// File name inside the working directory.
    pub name: String,
    /// Full text contents.
    pub contents: String,
}

impl InputFile {
    pub(crate) fn new(name: impl Into<String>, contents: String) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }
}

/// Everything needed to encode one run, gathered from the catalog.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub spec: RunSpec,
    /// Absolute working directory; written into the run file.
    pub workdir: PathBuf,
    pub timeline: Timeline,
    pub site: Site,
    pub soil: SoilProfile,
    pub weather: WeatherStation,
    /// `None` for fallow runs.
    pub cultivar: Option<Cultivar>,
    pub defaults: ModelDefaults,
}

impl RunInputs {
    /// Look up every catalog record a run refers to.
    pub async fn gather(
        catalog: &dyn AgronomicCatalog,
        spec: &RunSpec,
        workdir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let crop = spec.treatment.crop;
        let timeline = catalog.timeline(&spec.treatment).await?;
        let cultivar = if crop == Crop::Fallow {
            None
        } else {
            let name = timeline
                .initial_conditions()?
                .cultivar
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| Error::config(format!("treatment {} has no cultivar", spec.treatment)))?;
            Some(catalog.cultivar(crop, name).await?)
        };

        Ok(Self {
            spec: spec.clone(),
            workdir: workdir.into(),
            site: catalog.site(&spec.site).await?,
            soil: catalog.soil(&spec.soil).await?,
            weather: catalog.weather(&spec.station, &spec.station_type).await?,
            defaults: catalog.defaults().await?,
            timeline,
            cultivar,
        })
    }

    /// Cultivar file base name.
    pub fn cultivar_name(&self) -> &str {
        self.cultivar
            .as_ref()
            .map_or(FALLOW_CULTIVAR, |c| c.name.as_str())
    }
}

/// Encoded file set of one run plus values later steps need.
#[derive(Debug, Clone)]
pub struct EncodedInputs {
    /// Files in write order.
    pub files: Vec<InputFile>,
    /// Cultivar file base name.
    pub cultivar: String,
    /// Row spacing (cm).
    pub row_spacing: f64,
    /// Initial root weight per slab (g).
    pub root_weight_per_slab: f64,
    /// Sand percentage of the top soil layer.
    pub first_layer_sand: f64,
    /// True when the weather series is hourly.
    pub hourly_weather: bool,
    /// Layer file passed to the grid generator.
    pub layer_file: String,
    /// Run file passed to the crop model.
    pub run_file: String,
}

impl EncodedInputs {
    /// File by name.
    pub fn get(&self, name: &str) -> Option<&InputFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Write every file into `dir`.
    pub async fn write_to(&self, dir: &Path) -> Result<()> {
        for file in &self.files {
            tokio::fs::write(dir.join(&file.name), file.contents.as_bytes()).await?;
        }
        debug!(dir = %dir.display(), files = self.files.len(), "Wrote model input files");
        Ok(())
    }
}

/// Encode all input files of a run.
pub fn encode(inputs: &RunInputs) -> Result<EncodedInputs> {
    let spec = &inputs.spec;
    let site = spec.site.as_str();
    let crop = spec.treatment.crop;
    let mut files = Vec::with_capacity(20);

    files.push(soil::hydraulics_file(&inputs.soil));
    files.push(soil::texture_file(site, &inputs.soil));
    files.push(biology::biology_file(&inputs.defaults.biology));

    let init = initial::initialization_file(spec, &inputs.timeline, &inputs.site, &inputs.soil)?;
    files.push(init.file);
    if let Some(cultivar) = &inputs.cultivar {
        if cultivar.crop != crop {
            return Err(Error::config(format!(
                "cultivar '{}' is for {}, treatment is {crop}",
                cultivar.name, cultivar.crop
            )));
        }
        files.push(cultivar::cultivar_file(cultivar)?);
    }
    files.push(biology::drip_file(site));

    let weather = weather::weather_files(&inputs.weather, &inputs.timeline, spec)?;
    files.push(weather.wea);
    files.push(weather.cli);
    files.push(solute::solute_file(&inputs.soil, &inputs.defaults)?);
    files.push(solute::gas_file(&inputs.defaults)?);
    files.push(time::time_file(site, &inputs.timeline, weather.hourly)?);
    files.push(soil::nitrogen_file(site, &inputs.soil, init.row_spacing));

    let layer = soil::layer_file(site, &inputs.soil, init.row_spacing, init.root_weight_per_slab);
    let layer_file = layer.name.clone();
    files.push(layer);

    let management = management::management_file(site, crop, &inputs.timeline, init.row_spacing);
    files.push(management.file);
    files.push(mulch::mulch_file(&inputs.defaults, &management.residue_type)?);
    files.push(irrigation::irrigation_file(site, &inputs.timeline));

    let run = run_file::run_file(spec, inputs.cultivar_name(), &inputs.workdir);
    let run_file = run.name.clone();
    files.push(run);

    Ok(EncodedInputs {
        files,
        cultivar: inputs.cultivar_name().to_string(),
        row_spacing: init.row_spacing,
        root_weight_per_slab: init.root_weight_per_slab,
        first_layer_sand: inputs.soil.layers.first().map_or(0.0, |l| l.sand),
        hourly_weather: weather.hourly,
        layer_file,
        run_file,
    })
}
