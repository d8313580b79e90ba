// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! JSON snapshot backed catalog.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AgronomicCatalog, Cultivar, ModelDefaults, Site, SoilProfile, WeatherStation};
use crate::crop::Crop;
use crate::error::{Error, Result};
use crate::timeline::{Timeline, TreatmentKey};

/// Timeline of one treatment inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentTimeline {
    /// `crop/experiment/treatment`.
    pub key: TreatmentKey,
    /// Operations of the treatment.
    pub operations: Timeline,
}

/// Everything a catalog serves, as one serializable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub soils: Vec<SoilProfile>,
    #[serde(default)]
    pub weather: Vec<WeatherStation>,
    #[serde(default)]
    pub cultivars: Vec<Cultivar>,
    #[serde(default)]
    pub treatments: Vec<TreatmentTimeline>,
    pub defaults: ModelDefaults,
}

/// Catalog serving an in-memory snapshot.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    snapshot: CatalogSnapshot,
}

impl StaticCatalog {
    /// Wrap an existing snapshot.
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot from a JSON file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let snapshot: CatalogSnapshot = serde_json::from_slice(&raw)?;
        info!(
            path = %path.display(),
            sites = snapshot.sites.len(),
            soils = snapshot.soils.len(),
            treatments = snapshot.treatments.len(),
            "Loaded agronomic catalog"
        );
        Ok(Self::new(snapshot))
    }

    /// Borrow the underlying snapshot.
    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }
}

fn not_found(what: &str, name: impl std::fmt::Display) -> Error {
    Error::Catalog(format!("{what} '{name}' not found"))
}

#[async_trait]
impl AgronomicCatalog for StaticCatalog {
    async fn site(&self, name: &str) -> Result<Site> {
        self.snapshot
            .sites
            .iter()
            .find(|site| site.name == name)
            .cloned()
            .ok_or_else(|| not_found("site", name))
    }

    async fn soil(&self, name: &str) -> Result<SoilProfile> {
        self.snapshot
            .soils
            .iter()
            .find(|soil| soil.name == name)
            .cloned()
            .ok_or_else(|| not_found("soil", name))
    }

    async fn weather(&self, station: &str, station_type: &str) -> Result<WeatherStation> {
        self.snapshot
            .weather
            .iter()
            .find(|w| w.station == station && w.station_type == station_type)
            .cloned()
            .ok_or_else(|| not_found("weather station", format!("{station}/{station_type}")))
    }

    async fn cultivar(&self, crop: Crop, name: &str) -> Result<Cultivar> {
        self.snapshot
            .cultivars
            .iter()
            .find(|c| c.crop == crop && c.name == name)
            .cloned()
            .ok_or_else(|| not_found("cultivar", format!("{crop}/{name}")))
    }

    async fn timeline(&self, key: &TreatmentKey) -> Result<Timeline> {
        self.snapshot
            .treatments
            .iter()
            .find(|t| &t.key == key)
            .map(|t| t.operations.clone())
            .ok_or_else(|| not_found("treatment", key))
    }

    async fn defaults(&self) -> Result<ModelDefaults> {
        Ok(self.snapshot.defaults.clone())
    }
}
