// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Static model files copied from the store directory.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::crop::Crop;
use crate::error::{Error, Result};

/// Sand percentage above which the water file's pressure head limit is relaxed.
const SANDY_THRESHOLD: f64 = 75.0;

async fn read_asset(store_dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path = store_dir.join(name);
    tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::config(format!("asset '{}' is missing", path.display()))
        } else {
            Error::Io(e)
        }
    })
}

/// Copy `Water.DAT`, `WaterBound.DAT` (as `WatMovParam.dat`) and, for
/// fallow runs, `fallow.var` into `workdir`.
pub async fn install_assets(
    store_dir: &Path,
    workdir: &Path,
    crop: Crop,
    first_layer_sand: f64,
) -> Result<()> {
    let water = read_asset(store_dir, "Water.DAT").await?;
    let water = if first_layer_sand > SANDY_THRESHOLD {
        String::from_utf8_lossy(&water)
            .replace("-1.00000E+005", "-1.00000E+004")
            .into_bytes()
    } else {
        water
    };
    tokio::fs::write(workdir.join("Water.DAT"), water).await?;

    let bound = read_asset(store_dir, "WaterBound.DAT").await?;
    tokio::fs::write(workdir.join("WatMovParam.dat"), bound).await?;

    if crop == Crop::Fallow {
        let var = read_asset(store_dir, "fallow.var").await?;
        tokio::fs::write(workdir.join("fallow.var"), var).await?;
    }

    debug!(workdir = %workdir.display(), crop = %crop, "Installed static assets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sandy_soil_relaxes_water_file() {
        let store = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(store.path().join("Water.DAT"), "h -1.00000E+005\n").unwrap();
        std::fs::write(store.path().join("WaterBound.DAT"), "bound\n").unwrap();

        install_assets(store.path(), work.path(), Crop::Maize, 80.0)
            .await
            .unwrap();
        let water = std::fs::read_to_string(work.path().join("Water.DAT")).unwrap();
        assert_eq!(water, "h -1.00000E+004\n");
        assert!(work.path().join("WatMovParam.dat").exists());
        assert!(!work.path().join("fallow.var").exists());
    }

    #[tokio::test]
    async fn test_missing_fallow_var_is_config_error() {
        let store = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(store.path().join("Water.DAT"), "w\n").unwrap();
        std::fs::write(store.path().join("WaterBound.DAT"), "b\n").unwrap();

        let err = install_assets(store.path(), work.path(), Crop::Fallow, 10.0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
