// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the HTTP API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Harness, spec};
use cropsim_core::{RunStatus, RunStore};
use cropsim_environment::runner::MockRunner;
use cropsim_environment::server::{AppState, StartResponse, router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let body = tokio::time::timeout(Duration::from_secs(10), response.into_body().collect())
        .await
        .expect("response body did not finish")
        .unwrap()
        .to_bytes();
    (status, body.to_vec())
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(state, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post(state: &Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(state, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn start(state: &Arc<AppState>, id: i64) -> (StatusCode, StartResponse) {
    let (status, body) = post(state, &format!("/runs/{id}/start"), json!({})).await;
    (status, serde_json::from_value(body).unwrap())
}

async fn wait_for_status(h: &Harness, id: i64, wanted: Option<RunStatus>) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = h.store.get_run(id).await.unwrap().map(|run| run.status);
        if status == wanted {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "run {id} stuck at {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// `(event name, data)` for every event in an SSE body.
fn sse_events(body: &str) -> Vec<(Option<String>, String)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data = Some(value.trim().to_string());
                }
            }
            data.map(|data| (event, data))
        })
        .collect()
}

// ===== Submission and lookup =====

#[tokio::test]
async fn test_health() {
    let h = Harness::new(MockRunner::new()).await;
    let (status, body) = get(&h.app_state(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_submit_queues_one_run_per_row() {
    let h = Harness::new(MockRunner::new()).await;
    let state = h.app_state();
    let row = json!({
        "crop": "Maize",
        "experiment": "Exp1/Irrigated",
        "startDate": "2024",
        "endDate": "2024",
        "waterStress": "Yes",
        "nitrogenStress": "No",
        "tempVariance": 1.5,
        "rainVariance": "None",
        "co2Variance": "",
    });

    let (status, body) = post(
        &state,
        "/runs",
        json!({
            "site": "Beltsville",
            "weather": "barc",
            "soil": "LoamProfile",
            "station": "BARC",
            "rows": [row.clone(), row],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = serde_json::from_value(body["data"].clone()).unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    let run = h.store.get_run(ids[0]).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Queued);
    assert_eq!(run.spec.treatment.to_string(), "maize/Exp1/Irrigated");
    assert_eq!(run.spec.water_stress, 0);
    assert_eq!(run.spec.temperature_delta, 1.5);
}

#[tokio::test]
async fn test_submit_rejects_bad_row() {
    let h = Harness::new(MockRunner::new()).await;
    let (status, body) = post(
        &h.app_state(),
        "/runs",
        json!({
            "site": "Beltsville",
            "weather": "barc",
            "soil": "LoamProfile",
            "station": "BARC",
            "rows": [{ "crop": "rice", "experiment": "Exp1/Irrigated" }],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(h.store.list_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_run_reports_status() {
    let h = Harness::new(MockRunner::new()).await;
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();

    let (status, body) = get(&h.app_state(), &format!("/runs/{}", run.id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], run.id);
    assert_eq!(body["statusCode"], 1000);
    assert!(body["statusLabel"].is_string());
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let h = Harness::new(MockRunner::new()).await;
    let state = h.app_state();

    let (status, _) = get(&state, "/runs/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&state, "/runs/404/start", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ===== Starting runs =====

#[tokio::test]
async fn test_start_runs_to_completion() {
    let h = Harness::new(MockRunner::new()).await;
    let state = h.app_state();
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();

    let (status, reply) = start(&state, run.id).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(reply.id, run.id);
    assert_eq!(reply.message, "Simulation started");

    wait_for_status(&h, run.id, Some(RunStatus::Complete)).await;
    assert_eq!(h.store.count_rows("g01_maize", run.id).await.unwrap(), 3);

    let (status, reply) = start(&state, run.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.id, -1);
    assert!(reply.message.contains("already been started"));
}

#[tokio::test]
async fn test_start_without_cultivar_is_refused() {
    let h = Harness::new(MockRunner::new()).await;
    let run = h.store.create_run(&spec("maize/Exp1/NoCultivar")).await.unwrap();

    let (status, reply) = start(&h.app_state(), run.id).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.id, -1);
    assert!(reply.message.contains("cultivar"));
    // refused runs stay queued and nothing is launched
    let stored = h.store.get_run(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Queued);
    assert!(h.runner.launches().await.is_empty());
}

#[tokio::test]
async fn test_start_with_dates_out_of_order_is_refused() {
    let h = Harness::new(MockRunner::new()).await;
    let run = h.store.create_run(&spec("maize/Exp1/OutOfOrder")).await.unwrap();

    let (status, reply) = start(&h.app_state(), run.id).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.id, -1);
    assert!(!reply.message.is_empty());
    assert!(h.runner.launches().await.is_empty());
}

#[tokio::test]
async fn test_failed_run_disappears() {
    let h = Harness::new(MockRunner::with_missing_cell()).await;
    let state = h.app_state();
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();

    let (status, _) = start(&state, run.id).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for_status(&h, run.id, None).await;
    let (status, _) = get(&state, &format!("/runs/{}", run.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ===== Telemetry =====

#[tokio::test]
async fn test_telemetry_without_growth_file_is_not_found() {
    let h = Harness::new(MockRunner::new()).await;
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();

    let (status, body) = get(&h.app_state(), &format!("/runs/{}/telemetry", run.id)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_telemetry_streams_rows_until_complete() {
    let mut runner = MockRunner::new();
    runner.execution_delay_ms = 300;
    let h = Harness::new(runner).await;
    let state = h.app_state();
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();

    let (status, _) = start(&state, run.id).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let request = Request::get(format!("/runs/{}/telemetry", run.id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);

    let events = sse_events(&String::from_utf8(body).unwrap());
    let rows: Vec<Value> = events
        .iter()
        .filter(|(event, _)| event.is_none())
        .map(|(_, data)| serde_json::from_str(data).unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].get("SoilT").is_some());
    assert!(rows[0].get("LA/pl").is_none());
    assert_eq!(
        events.last(),
        Some(&(Some("end".to_string()), "complete".to_string()))
    );
}
