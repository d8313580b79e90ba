// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run records and status codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timeline::TreatmentKey;

/// Configuration snapshot of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    /// Site name.
    pub site: String,
    /// Soil profile name.
    pub soil: String,
    /// Weather station identifier.
    pub station: String,
    /// Station-type label; base name of the weather and climate files.
    pub station_type: String,
    /// Treatment simulated.
    pub treatment: TreatmentKey,
    /// 0 when water stress is simulated, 1 when suppressed.
    pub water_stress: i64,
    /// 0 when nitrogen stress is simulated, 1 when suppressed.
    pub nitrogen_stress: i64,
    /// Added to every temperature value (°C).
    pub temperature_delta: f64,
    /// Rainfall change in percent.
    pub rain_delta: f64,
    /// CO2 concentration override (ppm); 0 keeps the station's values.
    pub co2_override: f64,
    /// Free-form start label from the submission.
    pub start_label: String,
    /// Free-form end label from the submission.
    pub end_label: String,
}

/// Status of a run as stored.
///
/// Progress while the crop model runs is stored as the percentage itself, so
/// the non-progress phases use codes outside `0..=101`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "progress", rename_all = "snake_case")]
pub enum RunStatus {
    /// Submitted, not started.
    Queued,
    /// Working directory and input files being prepared.
    Preparing,
    /// Soil grid generator running.
    GridGenerating,
    /// Crop model running, with percent complete.
    Running(u8),
    /// Output files being validated and ingested.
    Validating,
    /// Finished; output rows stored.
    Complete,
}

impl RunStatus {
    /// Stored integer code.
    pub fn code(self) -> i64 {
        match self {
            RunStatus::Queued => 1000,
            RunStatus::Preparing => 1001,
            RunStatus::GridGenerating => 1002,
            RunStatus::Running(percent) => i64::from(percent.min(100)),
            RunStatus::Validating => 1003,
            RunStatus::Complete => 101,
        }
    }

    /// Decode a stored code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1000 => Some(RunStatus::Queued),
            1001 => Some(RunStatus::Preparing),
            1002 => Some(RunStatus::GridGenerating),
            1003 => Some(RunStatus::Validating),
            101 => Some(RunStatus::Complete),
            0..=100 => Some(RunStatus::Running(code as u8)),
            _ => None,
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Preparing => "preparing",
            RunStatus::GridGenerating => "grid-generating",
            RunStatus::Running(_) => "running",
            RunStatus::Validating => "validating",
            RunStatus::Complete => "complete",
        }
    }

    /// True once the run has finished successfully.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Complete)
    }
}

/// A stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Store-assigned id; also the working directory name.
    pub id: i64,
    /// What to simulate.
    #[serde(flatten)]
    pub spec: RunSpec,
    /// Current status.
    pub status: RunStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
