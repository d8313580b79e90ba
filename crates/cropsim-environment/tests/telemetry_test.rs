// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for growth file tailing.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use common::{Harness, fast_telemetry, spec};
use cropsim_core::{Crop, IngestOptions, RunStatus, RunStore};
use cropsim_environment::runner::MockRunner;
use cropsim_environment::runner::mock::growth_file;
use cropsim_environment::telemetry::{
    FinalState, TelemetryEvent, find_growth_file, tail_growth_file,
};
use futures::StreamExt;

async fn collect(
    store: Arc<dyn RunStore>,
    run_id: i64,
    crop: Option<Crop>,
    path: std::path::PathBuf,
) -> Vec<TelemetryEvent> {
    let events = tail_growth_file(store, run_id, crop, path, fast_telemetry()).collect::<Vec<_>>();
    tokio::time::timeout(Duration::from_secs(5), events)
        .await
        .expect("telemetry stream did not end")
}

fn rows(events: &[TelemetryEvent]) -> Vec<&serde_json::Map<String, serde_json::Value>> {
    events
        .iter()
        .filter_map(|event| match event {
            TelemetryEvent::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

// ===== Locating the growth file =====

#[tokio::test]
async fn test_growth_file_found_once_written() {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().join("9");
    let target = workdir.join("Beltsville.g01");

    let writer = tokio::spawn({
        let workdir = workdir.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::fs::create_dir_all(&workdir).await.unwrap();
            tokio::fs::write(workdir.join("Beltsville.g01"), "jday, date\n").await.unwrap();
        }
    });

    let found = find_growth_file(&workdir, &fast_telemetry()).await;
    writer.await.unwrap();
    assert_eq!(found, Some(target));
}

#[tokio::test]
async fn test_growth_file_wait_is_bounded() {
    let dir = tempfile::tempdir().unwrap();

    let started = std::time::Instant::now();
    let found = find_growth_file(&dir.path().join("404"), &fast_telemetry()).await;

    assert!(found.is_none());
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ===== Tailing =====

#[tokio::test]
async fn test_stream_emits_crop_columns_then_complete() {
    let h = Harness::new(MockRunner::new()).await;
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();
    h.store.set_status(run.id, RunStatus::Complete).await.unwrap();

    let path = h.dir.path().join("Beltsville.g01");
    std::fs::write(&path, growth_file(Crop::Maize, false)).unwrap();
    let remover = tokio::spawn({
        let path = path.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tokio::fs::remove_file(path).await.unwrap();
        }
    });

    let events = collect(h.store.clone(), run.id, Some(Crop::Maize), path).await;
    remover.await.unwrap();

    let rows = rows(&events);
    assert_eq!(rows.len(), 3);
    for row in &rows {
        let mut keys: Vec<&str> = row.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["ETdmd", "SoilT", "SolRad", "TotLeafDM"]);
        assert!(row["SoilT"].is_number());
    }
    assert_eq!(events.last(), Some(&TelemetryEvent::End(FinalState::Complete)));
}

#[tokio::test]
async fn test_partial_lines_wait_for_newline() {
    let h = Harness::new(MockRunner::new()).await;
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();

    let path = h.dir.path().join("Beltsville.g01");
    std::fs::write(&path, "jday, date, time, SoilT\n119, 4/28/2024, 6, 12.1\n120, 4/2").unwrap();

    let writer = tokio::spawn({
        let path = path.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"9/2024, 6, 12.8\n").unwrap();
            drop(file);
            tokio::time::sleep(Duration::from_millis(80)).await;
            tokio::fs::remove_file(path).await.unwrap();
        }
    });

    let events = collect(h.store.clone(), run.id, Some(Crop::Maize), path).await;
    writer.await.unwrap();

    let rows = rows(&events);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["SoilT"], serde_json::json!(12.8));
    // run still queued when the file went away
    assert_eq!(events.last(), Some(&TelemetryEvent::End(FinalState::Unknown)));
}

#[tokio::test]
async fn test_deleted_run_ends_as_failed() {
    let h = Harness::new(MockRunner::new()).await;
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();
    h.store.delete_run(run.id).await.unwrap();

    let path = h.dir.path().join("Beltsville.g01");
    std::fs::write(&path, growth_file(Crop::Maize, false)).unwrap();
    let remover = tokio::spawn({
        let path = path.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            tokio::fs::remove_file(path).await.unwrap();
        }
    });

    let events = collect(h.store.clone(), run.id, None, path).await;
    remover.await.unwrap();

    // unknown crop streams every column
    assert_eq!(rows(&events)[0].len(), 8);
    assert_eq!(events.last(), Some(&TelemetryEvent::End(FinalState::Failed)));
}

#[tokio::test]
async fn test_removed_outputs_still_end_as_complete() {
    let mut runner = MockRunner::new();
    runner.execution_delay_ms = 200;
    let h = Harness::with_ingest(
        runner,
        IngestOptions {
            remove_output_files: true,
        },
    )
    .await;
    let run = h.store.create_run(&spec("maize/Exp1/Irrigated")).await.unwrap();

    let handle = h.supervisor.spawn(run.clone()).unwrap();
    let path = find_growth_file(&h.supervisor.workdir(run.id), &fast_telemetry())
        .await
        .expect("growth file should appear");
    let events = collect(h.store.clone(), run.id, Some(Crop::Maize), path).await;
    handle.await.unwrap();

    assert_eq!(rows(&events).len(), 3);
    assert_eq!(events.last(), Some(&TelemetryEvent::End(FinalState::Complete)));
}
