// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | POST | `/runs` | submit a batch of runs |
//! | POST | `/runs/{id}/start` | validate and start a queued run |
//! | GET | `/runs/{id}` | run record with status |
//! | GET | `/runs/{id}/telemetry` | SSE stream of growth rows |
//! | GET | `/health` | liveness |

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cropsim_core::{AgronomicCatalog, RunRecord, RunSpec, RunStatus, RunStore, TreatmentKey};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::supervisor::RunSupervisor;
use crate::telemetry::{TelemetryConfig, TelemetryEvent, find_growth_file, tail_growth_file};

/// Shared handler state.
pub struct AppState {
    /// Run store.
    pub store: Arc<dyn RunStore>,
    /// Agronomic catalog, for launch validation.
    pub catalog: Arc<dyn AgronomicCatalog>,
    /// Supervisor that executes started runs.
    pub supervisor: Arc<RunSupervisor>,
    /// Telemetry timing.
    pub telemetry: TelemetryConfig,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::RunNotFound(_) | Error::TelemetryNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// A variance field: a number, a numeric string, or `"None"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Variance {
    /// Plain JSON number.
    Number(f64),
    /// Text as typed in the submission form.
    Text(String),
}

impl Default for Variance {
    fn default() -> Self {
        Variance::Number(0.0)
    }
}

impl Variance {
    fn value(&self, field: &str) -> Result<f64> {
        match self {
            Variance::Number(n) => Ok(*n),
            Variance::Text(text) => {
                let text = text.trim();
                if text.is_empty() || text.eq_ignore_ascii_case("none") {
                    return Ok(0.0);
                }
                text.parse()
                    .map_err(|_| Error::InvalidRequest(format!("{field} '{text}' is not a number")))
            }
        }
    }
}

/// One row of a batch submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRow {
    /// Crop tag, case-insensitive.
    pub crop: String,
    /// `experiment/treatment`
    pub experiment: String,
    /// Free-form start label.
    #[serde(default)]
    pub start_date: String,
    /// Free-form end label.
    #[serde(default)]
    pub end_date: String,
    /// `"Yes"` simulates water stress.
    #[serde(default)]
    pub water_stress: String,
    /// `"Yes"` simulates nitrogen stress.
    #[serde(default)]
    pub nitrogen_stress: String,
    /// Added to every temperature (°C).
    #[serde(default)]
    pub temp_variance: Variance,
    /// Rainfall change in percent.
    #[serde(default)]
    pub rain_variance: Variance,
    /// CO2 override in ppm; `"None"` keeps the station's values.
    #[serde(default)]
    pub co2_variance: Variance,
}

/// Batch submission: shared site and weather, one row per run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Site name.
    pub site: String,
    /// Station-type label.
    pub weather: String,
    /// Soil profile name.
    pub soil: String,
    /// Weather station identifier.
    pub station: String,
    /// One entry per run.
    pub rows: Vec<SubmitRow>,
}

fn stress_flag(value: &str) -> i64 {
    if value.trim() == "Yes" { 0 } else { 1 }
}

impl SubmitRequest {
    /// Run specs for every row, failing on the first invalid one.
    pub fn specs(&self) -> Result<Vec<RunSpec>> {
        self.rows
            .iter()
            .map(|row| {
                let treatment = format!("{}/{}", row.crop.trim(), row.experiment.trim())
                    .parse::<TreatmentKey>()
                    .map_err(|e| Error::InvalidRequest(e.to_string()))?;
                Ok(RunSpec {
                    site: self.site.clone(),
                    soil: self.soil.clone(),
                    station: self.station.clone(),
                    station_type: self.weather.clone(),
                    treatment,
                    water_stress: stress_flag(&row.water_stress),
                    nitrogen_stress: stress_flag(&row.nitrogen_stress),
                    temperature_delta: row.temp_variance.value("tempVariance")?,
                    rain_delta: row.rain_variance.value("rainVariance")?,
                    co2_override: row.co2_variance.value("co2Variance")?,
                    start_label: row.start_date.clone(),
                    end_label: row.end_date.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    data: Vec<i64>,
}

/// Reply to a start request; `id` is -1 when the run was not started.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    /// Run id, or -1.
    pub id: i64,
    /// Human readable outcome.
    pub message: String,
}

impl StartResponse {
    fn rejected(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                id: -1,
                message: message.into(),
            }),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunView {
    #[serde(flatten)]
    run: RunRecord,
    status_code: i64,
    status_label: &'static str,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn submit_runs(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    let specs = request.specs()?;
    let mut ids = Vec::with_capacity(specs.len());
    for spec in &specs {
        ids.push(state.store.create_run(spec).await?.id);
    }
    info!(runs = ids.len(), site = %request.site, "Queued runs");
    Ok(Json(SubmitResponse { data: ids }))
}

async fn start_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<StartResponse>)> {
    let run = state.store.get_run(id).await?.ok_or(Error::RunNotFound(id))?;
    if run.status != RunStatus::Queued {
        return Ok(StartResponse::rejected(format!(
            "Run {id} has already been started"
        )));
    }

    let problem = match state.catalog.timeline(&run.spec.treatment).await {
        Ok(timeline) => timeline.launch_problem(),
        Err(e) => Some(e.to_string()),
    };
    if let Some(message) = problem {
        info!(run_id = id, reason = %message, "Run not started");
        return Ok(StartResponse::rejected(message));
    }

    // detached; the supervisor owns the run from here
    state.supervisor.spawn(run)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            id,
            message: "Simulation started".to_string(),
        }),
    ))
}

async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<RunView>> {
    let run = state.store.get_run(id).await?.ok_or(Error::RunNotFound(id))?;
    Ok(Json(RunView {
        status_code: run.status.code(),
        status_label: run.status.label(),
        run,
    }))
}

fn sse_event(event: TelemetryEvent) -> Event {
    match event {
        TelemetryEvent::Row(row) => Event::default().data(serde_json::Value::Object(row).to_string()),
        TelemetryEvent::End(state) => Event::default().event("end").data(state.as_str()),
        TelemetryEvent::Error(message) => Event::default().event("error").data(message),
    }
}

async fn stream_telemetry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let crop = state
        .store
        .get_run(id)
        .await?
        .map(|run| run.spec.treatment.crop);
    let workdir = state.supervisor.workdir(id);
    let path = find_growth_file(&workdir, &state.telemetry)
        .await
        .ok_or(Error::TelemetryNotFound(id))?;

    info!(run_id = id, path = %path.display(), "Streaming telemetry");
    let events = tail_growth_file(Arc::clone(&state.store), id, crop, path, state.telemetry)
        .map(|event| Ok(sse_event(event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/runs", post(submit_runs))
        .route("/runs/{id}", get(get_run))
        .route("/runs/{id}/start", post(start_run))
        .route("/runs/{id}/telemetry", get(stream_telemetry))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` turns true.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
