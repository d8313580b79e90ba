// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Output file parsing and reshaping.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use csv::{ReaderBuilder, Trim};

use super::{CellValue, MissingColumn, OutputTable};
use crate::crop::{Crop, OutputKind, TimestampConvention};
use crate::error::{Error, Result};
use crate::timeline::DATE_FORMAT;

/// Normalised timestamp column present in every output table.
pub const TIMESTAMP_COLUMN: &str = "Date_Time";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UNKNOWN_DATE: &str = "unknown";

fn soil_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Soil-model timestamp: fractional days since 1899-12-30, rounded to the
/// nearest hour with ties to even. `None` when the result is not a
/// representable date.
pub fn soil_timestamp(days: f64) -> Option<NaiveDateTime> {
    let hours = (days * 24.0).round_ties_even();
    if !hours.is_finite() {
        return None;
    }
    TimeDelta::try_hours(hours as i64).and_then(|delta| soil_epoch().checked_add_signed(delta))
}

/// Unrounded calendar date of a soil-model day count.
fn soil_date(days: f64) -> Option<NaiveDate> {
    let millis = days * 86_400_000.0;
    if !millis.is_finite() {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
        .and_then(|delta| soil_epoch().checked_add_signed(delta))
        .map(|stamp| stamp.date())
}

/// Plant-model timestamp: calendar date at a whole hour.
fn growth_timestamp(date: NaiveDate, hour: f64) -> Option<NaiveDateTime> {
    if !hour.is_finite() {
        return None;
    }
    let midnight = date.and_hms_opt(0, 0, 0)?;
    TimeDelta::try_hours(hour.trunc() as i64).and_then(|delta| midnight.checked_add_signed(delta))
}

/// Header labels and cells of a delimited output file. Short rows are
/// padded with missing cells.
pub(crate) fn read_table(bytes: &[u8], file: &str) -> Result<(Vec<String>, Vec<Vec<CellValue>>)> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(Error::output(file, "no header line"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = (0..headers.len())
            .map(|i| CellValue::parse(record.get(i).unwrap_or("")))
            .collect();
        rows.push(row);
    }
    Ok((headers, rows))
}

fn require_column(headers: &[String], name: &str, file: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::output(file, format!("missing column '{name}'")))
}

/// Output file reshaped for storage, plus its missing-value scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    /// Rows ready to append.
    pub table: OutputTable,
    /// Columns with missing values in the raw file.
    pub missing: Vec<MissingColumn>,
}

/// Row timestamp (if reconstructible) and report date.
struct RowTime {
    stamp: Option<NaiveDateTime>,
    date: String,
}

fn row_times(
    headers: &[String],
    rows: &[Vec<CellValue>],
    convention: TimestampConvention,
    file: &str,
) -> Result<Vec<RowTime>> {
    match convention {
        TimestampConvention::CalendarHour => {
            let date_idx = require_column(headers, "date", file)?;
            let time_idx = require_column(headers, "time", file)?;
            rows.iter()
                .map(|row| {
                    let date = match &row[date_idx] {
                        CellValue::Text(text) => Some(
                            NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| {
                                Error::output(file, format!("unparseable date '{text}'"))
                            })?,
                        ),
                        CellValue::Null => None,
                        CellValue::Real(v) => {
                            return Err(Error::output(file, format!("unparseable date '{v}'")));
                        }
                    };
                    let stamp = date
                        .zip(row[time_idx].as_f64())
                        .map(|(d, h)| {
                            growth_timestamp(d, h)
                                .ok_or_else(|| Error::output(file, format!("hour '{h}' out of range")))
                        })
                        .transpose()?;
                    Ok(RowTime {
                        stamp,
                        date: date.map_or(UNKNOWN_DATE.to_string(), |d| d.format(DATE_FORMAT).to_string()),
                    })
                })
                .collect()
        }
        TimestampConvention::DayOffset => {
            let idx = require_column(headers, "Date_time", file)?;
            rows.iter()
                .map(|row| match &row[idx] {
                    CellValue::Real(days) => {
                        let out_of_range =
                            || Error::output(file, format!("day count '{days}' out of range"));
                        Ok(RowTime {
                            stamp: Some(soil_timestamp(*days).ok_or_else(out_of_range)?),
                            date: soil_date(*days)
                                .ok_or_else(out_of_range)?
                                .format(DATE_FORMAT)
                                .to_string(),
                        })
                    }
                    CellValue::Null => Ok(RowTime {
                        stamp: None,
                        date: UNKNOWN_DATE.to_string(),
                    }),
                    CellValue::Text(text) => {
                        Err(Error::output(file, format!("unparseable day count '{text}'")))
                    }
                })
                .collect()
        }
    }
}

fn sanitize(label: &str, kind: OutputKind, crop: Crop) -> String {
    let renamed = kind
        .renamed_columns(crop)
        .iter()
        .find(|(from, _)| *from == label)
        .map_or(label, |(_, to)| *to);
    renamed.replace('/', "_")
}

/// Parse one output file into its destination table shape.
pub fn parse_output(bytes: &[u8], file: &str, kind: OutputKind, crop: Crop) -> Result<ParsedOutput> {
    let (headers, rows) = read_table(bytes, file)?;
    let times = row_times(&headers, &rows, kind.convention(), file)?;

    let missing = headers
        .iter()
        .enumerate()
        .filter_map(|(i, header)| {
            let dates: Vec<String> = rows
                .iter()
                .zip(&times)
                .filter(|(row, _)| row[i].is_null())
                .map(|(_, t)| t.date.clone())
                .collect();
            (!dates.is_empty()).then(|| MissingColumn {
                column: header.clone(),
                dates,
            })
        })
        .collect();

    let time_columns: &[&str] = match kind.convention() {
        TimestampConvention::CalendarHour => &["date", "time"],
        TimestampConvention::DayOffset => &["Date", "Date_time"],
    };
    let dropped = kind.dropped_columns(crop);
    let kept: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !time_columns.contains(&h.as_str()) && !dropped.contains(&h.as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut columns: Vec<String> = kept.iter().map(|&i| sanitize(&headers[i], kind, crop)).collect();
    columns.push(TIMESTAMP_COLUMN.to_string());

    let rows = rows
        .into_iter()
        .zip(times)
        .map(|(mut row, time)| {
            let mut out: Vec<CellValue> = kept
                .iter()
                .map(|&i| std::mem::replace(&mut row[i], CellValue::Null))
                .collect();
            out.push(time.stamp.map_or(CellValue::Null, |s| {
                CellValue::Text(s.format(TIMESTAMP_FORMAT).to_string())
            }));
            out
        })
        .collect();

    Ok(ParsedOutput {
        table: OutputTable {
            table: kind.table_name(crop),
            columns,
            rows,
        },
        missing,
    })
}
