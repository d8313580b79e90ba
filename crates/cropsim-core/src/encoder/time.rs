// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synchronizer file (`{site}.tim`).

use super::InputFile;
use super::record::{Col, RecordWriter, cell, quoted};
use crate::error::Result;
use crate::timeline::{DATE_FORMAT, OperationKind, Timeline};

const DT: f64 = 0.0001;
const DT_MIN: f64 = 0.000_000_1;
const DMUL1: f64 = 1.3;
const DMUL2: f64 = 0.3;

pub(crate) fn time_file(site: &str, timeline: &Timeline, hourly_weather: bool) -> Result<InputFile> {
    let start = timeline
        .require_date(OperationKind::SimulationStart)?
        .format(DATE_FORMAT)
        .to_string();
    let end = timeline
        .require_date(OperationKind::SimulationEnd)?
        .format(DATE_FORMAT)
        .to_string();
    let hourly = i64::from(hourly_weather);

    let mut w = RecordWriter::new();
    w.line("*** SYNCHRONIZER INFORMATION *****************************")
        .line("Initial time       dt       dtMin     DMul1    DMul2    tFin")
        .cells(&[
            quoted(&start, 10),
            "  ".to_string(),
            cell(DT, Col::left(14, 4)),
            cell(DT_MIN, Col::left(14, 10)),
            cell(DMUL1, Col::left(14, 4)),
            cell(DMUL2, Col::left(14, 4)),
            quoted(&end, 10),
        ])
        .line("Output variables, 1 if true  Daily    Hourly")
        // hourly output is always requested
        .record([(0_i64, Col::left_plain(16)), (1, Col::left_plain(14))])
        .line("Daily Hourly Weather data frequency. if daily enter 1   0; if hourly enter 0  1")
        .record([(1 - hourly, Col::left_plain(16)), (hourly, Col::left_plain(14))])
        .line("run to end of soil model if 1, when crop matures the model ends, otherwise continues to stop date in time file")
        .record([(0_i64, Col::left_plain(14))])
        .line("");
    Ok(InputFile::new(format!("{site}.tim"), w.finish()))
}
