// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Live telemetry from a running crop model.
//!
//! The growth file (`*.g01`) in a run's working directory is tailed by
//! polling: each poll reads from the last offset and yields the rows whose
//! line is complete. The first complete line is the header. When the file
//! disappears (the supervisor removed the working directory) the stream ends
//! with the run's final state.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use cropsim_core::{Crop, RunStore};
use futures::Stream;
use serde_json::{Map, Number, Value};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Telemetry timing.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryConfig {
    /// Upper bound on waiting for the growth file to appear.
    pub initial_wait: Duration,
    /// Poll interval while waiting for the file.
    pub wait_poll: Duration,
    /// Poll interval while tailing the file.
    pub poll_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(10),
            wait_poll: Duration::from_millis(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// How a run ended, as seen by a telemetry client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalState {
    /// The run row exists with status COMPLETE.
    Complete,
    /// The run row is gone.
    Failed,
    /// The run row exists in some other state.
    Unknown,
}

impl FinalState {
    /// Label sent in the `end` event.
    pub fn as_str(self) -> &'static str {
        match self {
            FinalState::Complete => "complete",
            FinalState::Failed => "failed",
            FinalState::Unknown => "unknown",
        }
    }
}

/// One item of a telemetry stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// A data row keyed by column label.
    Row(Map<String, Value>),
    /// The growth file disappeared; carries the run's final state.
    End(FinalState),
    /// Reading the file failed; the stream ends.
    Error(String),
}

/// Indices of the header columns to push for `crop`.
///
/// Every column when the crop is unknown, has no subset, or none of its
/// subset is present.
pub fn select_columns(crop: Option<Crop>, header: &[String]) -> Vec<usize> {
    let wanted = crop.and_then(Crop::telemetry_columns).unwrap_or_default();
    let picked: Vec<usize> = wanted
        .iter()
        .filter_map(|name| header.iter().position(|h| h == name))
        .collect();
    if picked.is_empty() {
        (0..header.len()).collect()
    } else {
        picked
    }
}

fn split_cells(line: &str) -> Vec<String> {
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

fn cell_value(cell: &str) -> Value {
    cell.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(cell.to_string()))
}

/// Row object for `line`, or `None` if it is shorter than the highest kept index.
fn row_object(header: &[String], columns: &[usize], line: &str) -> Option<Map<String, Value>> {
    let cells = split_cells(line);
    let highest = columns.iter().max()?;
    if cells.len() <= *highest {
        return None;
    }
    Some(
        columns
            .iter()
            .map(|&i| (header[i].clone(), cell_value(&cells[i])))
            .collect(),
    )
}

/// Look for a `*.g01` file in `workdir`, waiting up to `config.initial_wait`.
pub async fn find_growth_file(workdir: &Path, config: &TelemetryConfig) -> Option<PathBuf> {
    let deadline = Instant::now() + config.initial_wait;
    loop {
        if let Some(path) = scan_for_growth_file(workdir).await {
            return Some(path);
        }
        if Instant::now() >= deadline {
            debug!(workdir = %workdir.display(), "Growth file did not appear");
            return None;
        }
        tokio::time::sleep(config.wait_poll).await;
    }
}

async fn scan_for_growth_file(workdir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(workdir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "g01") {
            return Some(path);
        }
    }
    None
}

/// Final state of a run from the store.
pub async fn final_state(store: &dyn RunStore, run_id: i64) -> FinalState {
    match store.get_run(run_id).await {
        Ok(Some(run)) if run.status.is_terminal() => FinalState::Complete,
        Ok(Some(_)) => FinalState::Unknown,
        Ok(None) => FinalState::Failed,
        Err(e) => {
            warn!(run_id, error = %e, "Failed to read run state");
            FinalState::Unknown
        }
    }
}

/// Incremental reader returning only complete lines.
#[derive(Debug, Default)]
struct LineTail {
    offset: u64,
    pending: Vec<u8>,
}

impl LineTail {
    /// New complete lines since the last poll, or `None` once the file is gone.
    async fn poll(&mut self, path: &Path) -> std::io::Result<Option<Vec<String>>> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let len = file.metadata().await?.len();
        if len < self.offset {
            // rewritten from scratch
            self.offset = 0;
            self.pending.clear();
        }
        if len == self.offset {
            return Ok(Some(Vec::new()));
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let read = file.read_to_end(&mut self.pending).await?;
        self.offset += read as u64;

        let Some(end) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Ok(Some(Vec::new()));
        };
        let complete: Vec<u8> = self.pending.drain(..=end).collect();
        Ok(Some(
            String::from_utf8_lossy(&complete)
                .lines()
                .map(|line| line.trim_end_matches('\r').to_string())
                .filter(|line| !line.trim().is_empty())
                .collect(),
        ))
    }
}

/// Tail the growth file at `path` as a stream of telemetry events.
///
/// Dropping the stream stops the polling.
pub fn tail_growth_file(
    store: Arc<dyn RunStore>,
    run_id: i64,
    crop: Option<Crop>,
    path: PathBuf,
    config: TelemetryConfig,
) -> impl Stream<Item = TelemetryEvent> + Send + 'static {
    stream! {
        let mut tail = LineTail::default();
        let mut header: Option<(Vec<String>, Vec<usize>)> = None;

        loop {
            match tail.poll(&path).await {
                Ok(Some(lines)) => {
                    for line in lines {
                        if header.is_none() {
                            let labels = split_cells(&line);
                            let columns = select_columns(crop, &labels);
                            debug!(run_id, columns = columns.len(), "Captured telemetry header");
                            header = Some((labels, columns));
                            continue;
                        }
                        if let Some((labels, columns)) = &header
                            && let Some(row) = row_object(labels, columns, &line)
                        {
                            yield TelemetryEvent::Row(row);
                        }
                    }
                }
                Ok(None) => {
                    yield TelemetryEvent::End(final_state(store.as_ref(), run_id).await);
                    break;
                }
                Err(e) => {
                    warn!(run_id, path = %path.display(), error = %e, "Failed to read growth file");
                    yield TelemetryEvent::Error(e.to_string());
                    break;
                }
            }
            tokio::time::sleep(config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_crop_subset_in_crop_order() {
        let labels = header(&["jday", "date", "ETdmd", "SoilT", "SolRad", "TotLeafDM", "LAI"]);
        assert_eq!(select_columns(Some(Crop::Maize), &labels), [3, 4, 5, 2]);
    }

    #[test]
    fn test_all_columns_when_unknown_or_absent() {
        let labels = header(&["jday", "date", "LAI"]);

        assert_eq!(select_columns(None, &labels), [0, 1, 2]);
        assert_eq!(select_columns(Some(Crop::Fallow), &labels), [0, 1, 2]);
        // none of maize's columns are present
        assert_eq!(select_columns(Some(Crop::Maize), &labels), [0, 1, 2]);
    }

    #[test]
    fn test_short_rows_skipped() {
        let labels = header(&["jday", "date", "SoilT", "SolRad"]);
        let columns = vec![2, 3];

        assert!(row_object(&labels, &columns, "119, 4/28/2024, 12.1").is_none());
        let full = row_object(&labels, &columns, "119, 4/28/2024, 12.1, 310.5").unwrap();
        assert_eq!(full["SoilT"], serde_json::json!(12.1));
        assert_eq!(full["SolRad"], serde_json::json!(310.5));
        assert_eq!(full.len(), 2);
    }

    #[test]
    fn test_text_cells_stay_strings() {
        assert_eq!(cell_value("4/28/2024"), Value::String("4/28/2024".into()));
        assert_eq!(cell_value("7"), serde_json::json!(7.0));
    }

    #[tokio::test]
    async fn test_tail_returns_only_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Beltsville.g01");
        let mut tail = LineTail::default();

        std::fs::write(&path, "jday, SoilT\n119, 12").unwrap();
        assert_eq!(tail.poll(&path).await.unwrap().unwrap(), ["jday, SoilT"]);

        std::fs::write(&path, "jday, SoilT\n119, 12.1\n120, 1").unwrap();
        assert_eq!(tail.poll(&path).await.unwrap().unwrap(), ["119, 12.1"]);
        assert!(tail.poll(&path).await.unwrap().unwrap().is_empty());

        std::fs::remove_file(&path).unwrap();
        assert!(tail.poll(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_growth_file_wait_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let config = TelemetryConfig {
            initial_wait: Duration::from_millis(30),
            ..TelemetryConfig::default()
        };

        assert!(find_growth_file(dir.path(), &config).await.is_none());

        std::fs::write(dir.path().join("Beltsville.g01"), "jday\n").unwrap();
        let found = find_growth_file(dir.path(), &config).await.unwrap();
        assert_eq!(found.file_name().unwrap(), "Beltsville.g01");
    }
}
