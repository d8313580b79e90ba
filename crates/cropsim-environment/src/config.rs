// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for cropsim-environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL of the run store
    pub database_url: String,
    /// HTTP API listen address
    pub http_addr: SocketAddr,
    /// Agronomic catalog snapshot (JSON)
    pub catalog_path: PathBuf,
    /// Parent of the per-run working directories
    pub run_dir: PathBuf,
    /// Static model assets (`Water.DAT`, `WaterBound.DAT`, `fallow.var`)
    pub store_dir: PathBuf,
    /// Location of the model executables
    pub bin_dir: PathBuf,
    /// Interpreter the grid generator is launched through, `None` to run it directly
    pub grid_launcher: Option<String>,
    /// Delete output files once their rows are stored
    pub remove_output_files: bool,
    /// How long a telemetry request waits for the growth file to appear
    pub telemetry_wait: Duration,
    /// Age after which an unsupervised working directory is removed
    pub cleanup_max_age: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let database_url = var("CROPSIM_DATABASE_URL", "sqlite:.data/cropsim.db?mode=rwc");

        let port: u16 = var("CROPSIM_HTTP_PORT", "8010")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("CROPSIM_HTTP_PORT"))?;
        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let grid_launcher = var("CROPSIM_GRID_LAUNCHER", "mono");
        let grid_launcher = (!grid_launcher.trim().is_empty()).then(|| grid_launcher.trim().to_string());

        let remove_output_files = match var("CROPSIM_REMOVE_OUTPUT_FILES", "false").as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(ConfigError::InvalidValue("CROPSIM_REMOVE_OUTPUT_FILES")),
        };

        let telemetry_wait_ms: u64 = var("CROPSIM_TELEMETRY_WAIT_MS", "10000")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("CROPSIM_TELEMETRY_WAIT_MS"))?;

        let cleanup_max_age_secs: u64 = var("CROPSIM_CLEANUP_MAX_AGE_SECS", "86400")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("CROPSIM_CLEANUP_MAX_AGE_SECS"))?;

        Ok(Self {
            database_url,
            http_addr,
            catalog_path: PathBuf::from(var("CROPSIM_CATALOG_PATH", "catalog.json")),
            run_dir: PathBuf::from(var("CROPSIM_RUN_DIR", ".data/run")),
            store_dir: PathBuf::from(var("CROPSIM_STORE_DIR", ".data/store")),
            bin_dir: PathBuf::from(var("CROPSIM_BIN_DIR", ".data/bin")),
            grid_launcher,
            remove_output_files,
            telemetry_wait: Duration::from_millis(telemetry_wait_ms),
            cleanup_max_age: Duration::from_secs(cleanup_max_age_secs),
        })
    }

    /// File behind a `sqlite:` database URL, `None` for in-memory databases
    /// or URLs of another form.
    pub fn database_path(&self) -> Option<PathBuf> {
        let rest = self.database_url.strip_prefix("sqlite:")?;
        let path = rest.trim_start_matches("//");
        let path = path.split('?').next().unwrap_or_default();
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable has a value that cannot be used.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
