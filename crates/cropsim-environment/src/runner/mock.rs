// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock runner for testing.
//!
//! A runner implementation that simulates the grid generator and the crop
//! models by writing small, well-formed output files into the working
//! directory and printing progress lines, without running any process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cropsim_core::{Crop, OutputKind};
use tokio::sync::{Mutex, mpsc};

use super::traits::*;

const GROWTH_DAYS: [(u32, &str); 3] = [(119, "4/28/2024"), (120, "4/29/2024"), (121, "4/30/2024")];

const G03: &str = "\
Date_time, Date, X, Y, Area, hNew, thNew, Vx, Vy, Q, NO3N, NH4N, Temp, CO2Conc, O2Conc
45410.25, 04/28/2024, 0.0, 150.0, 12.5, -100, 0.30, 0, 0, 0, 25, 2, 12, 400, 206000
45410.25, 04/28/2024, 37.5, 150.0, 12.5, -110, 0.29, 0, 0, 0, 25, 2, 12, 400, 206000
45411.25, 04/29/2024, 0.0, 150.0, 12.5, -90, 0.31, 0, 0, 0, 24, 2, 13, 410, 205000
45411.25, 04/29/2024, 37.5, 150.0, 12.5, -95, 0.30, 0, 0, 0, 24, 2, 13, 410, 205000
";

const G04: &str = "\
Date_time, Date, X, Y, RDenT, RMassM
45410.25, 04/28/2024, 0.0, 150.0, 0.01, 0.002
45411.25, 04/29/2024, 0.0, 150.0, 0.02, 0.003
";

const G05: &str = "\
Date_time, Date, PSoilEvap, ActualTrans
45410.25, 04/28/2024, 0.12, 0.05
45411.25, 04/29/2024, 0.14, 0.06
";

const G07: &str = "\
Date_time, Date, X, Y, Humus_N, Litter_C
45410.25, 04/28/2024, 0.0, 150.0, 120.5, 30.1
45411.25, 04/29/2024, 0.0, 150.0, 120.4, 30.3
";

const PLANT_STRESS: &str = "\
jday, date, time, waterstress, N_stress
119, 4/28/2024, 6, 1.0, 0.9
120, 4/29/2024, 6, 1.0, 0.8
";

const NITROGEN: &str = "\
jday, date, time, Seed N, N_uptake
119, 4/28/2024, 6, 0.4, 1.1
120, 4/29/2024, 6, 0.4, 1.3
";

const GRID: &str = "\
***** GRID FOR MOCK *****
KodBound  NumNP  NumEl
2  3  1
 n     x       y      MatNum
 1    0.0    150.0     1
 2   37.5    150.0     1
 ELEMENT INFORMATION
 e  i  j  k  l  MatNum
 1  1  2  2  1  1
";

/// Growth file for `crop`, with the crop's telemetry columns plus `LA/pl`.
///
/// With `missing_cell` the last cell of the second day is left blank.
pub fn growth_file(crop: Crop, missing_cell: bool) -> String {
    let columns = crop
        .telemetry_columns()
        .unwrap_or(&["LAI", "TotLeafDM"])
        .iter()
        .copied()
        .chain(["LA/pl"])
        .collect::<Vec<_>>();

    let mut out = format!("jday, date, time, {}\n", columns.join(", "));
    for (day, (jday, date)) in GROWTH_DAYS.iter().enumerate() {
        let mut cells: Vec<String> = (0..columns.len())
            .map(|i| format!("{:.2}", (day + 1) as f64 * 1.5 + i as f64))
            .collect();
        if missing_cell && day == 1 {
            if let Some(last) = cells.last_mut() {
                last.clear();
            }
        }
        out.push_str(&format!("{jday}, {date}, 6, {}\n", cells.join(", ")));
    }
    out
}

/// Every output file a clean `crop` run writes, as `(file name, contents)`.
pub fn crop_outputs(crop: Crop, site: &str, missing_cell: bool) -> Vec<(String, String)> {
    crop.output_kinds()
        .iter()
        .map(|&kind| {
            let contents = match kind {
                OutputKind::Growth => growth_file(crop, missing_cell),
                OutputKind::G03 => G03.to_string(),
                OutputKind::G04 => G04.to_string(),
                OutputKind::G05 => G05.to_string(),
                OutputKind::G07 => G07.to_string(),
                OutputKind::PlantStress => PLANT_STRESS.to_string(),
                OutputKind::Nitrogen => NITROGEN.to_string(),
            };
            (kind.file_name(site), contents)
        })
        .collect()
}

/// Mock runner for testing.
pub struct MockRunner {
    launches: Arc<Mutex<Vec<LaunchOptions>>>,
    /// Optional delay to simulate execution time (in milliseconds)
    pub execution_delay_ms: u64,
    /// If true, every launch fails with a non-zero exit
    pub fail_by_default: bool,
    /// If true, the growth file is written with one blank cell
    pub missing_cell: bool,
    /// Progress values printed by the crop model
    pub progress: Vec<f64>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            launches: Arc::new(Mutex::new(Vec::new())),
            execution_delay_ms: 10,
            fail_by_default: false,
            missing_cell: false,
            progress: vec![0.0, 42.7, 100.0],
        }
    }

    /// Create a mock runner that fails by default.
    pub fn failing() -> Self {
        Self {
            fail_by_default: true,
            ..Self::new()
        }
    }

    /// Create a mock runner whose crop model output has a missing cell.
    pub fn with_missing_cell() -> Self {
        Self {
            missing_cell: true,
            ..Self::new()
        }
    }

    /// Every launch seen so far, in order.
    pub async fn launches(&self) -> Vec<LaunchOptions> {
        self.launches.lock().await.clone()
    }
}

#[async_trait]
impl Runner for MockRunner {
    fn runner_type(&self) -> &'static str {
        "mock"
    }

    async fn run(
        &self,
        options: &LaunchOptions,
        stdout: Option<mpsc::UnboundedSender<String>>,
    ) -> Result<LaunchResult> {
        let start = std::time::Instant::now();
        self.launches.lock().await.push(options.clone());

        if self.fail_by_default {
            if self.execution_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.execution_delay_ms)).await;
            }
            return Err(RunnerError::ExitCode {
                exit_code: 1,
                stderr: "Mock failure".to_string(),
            });
        }

        let mut stdout_lines = 0;
        match options.program {
            Program::GridGenerator => {
                tokio::fs::write(options.workdir.join(format!("{}.grd", options.site)), GRID)
                    .await?;
            }
            Program::CropModel(crop) => {
                let outputs = crop_outputs(crop, &options.site, self.missing_cell);
                // the growth file appears first so telemetry can attach while the model runs
                let (growth, rest): (Vec<_>, Vec<_>) = outputs
                    .into_iter()
                    .partition(|(name, _)| name.ends_with(".g01"));
                for (name, contents) in growth {
                    tokio::fs::write(options.workdir.join(name), contents).await?;
                }

                for percent in &self.progress {
                    if let Some(tx) = &stdout {
                        let _ = tx.send(format!(" Progress: {percent:.1} %"));
                    }
                    stdout_lines += 1;
                }
                if self.execution_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.execution_delay_ms)).await;
                }

                for (name, contents) in rest {
                    tokio::fs::write(options.workdir.join(name), contents).await?;
                }
            }
        }

        Ok(LaunchResult {
            stdout_lines,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
