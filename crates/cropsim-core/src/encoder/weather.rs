// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Weather series (`.wea`) and climate header (`.cli`).
//!
//! Optional channels (rain, wind, relative humidity, CO2) are written only
//! when every record in the window carries them; otherwise the column is
//! dropped and the climate file flags the channel as absent so the model
//! falls back to the station average.

use chrono::{Days, NaiveDate};

use super::InputFile;
use super::record::{Col, F14_6, I14, RecordWriter, cell, py_float};
use crate::catalog::{WeatherRecord, WeatherStation};
use crate::error::{Error, Result};
use crate::run::RunSpec;
use crate::timeline::{DATE_FORMAT, Timeline};

/// Encoded weather files plus the detected series frequency.
#[derive(Debug, Clone)]
pub(crate) struct WeatherFiles {
    pub wea: InputFile,
    pub cli: InputFile,
    pub hourly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    JDay,
    Date,
    Hour,
    Radiation,
    Temperature,
    Tmax,
    Tmin,
    Rain,
    Wind,
    Rh,
    Co2,
}

impl Column {
    fn header(self) -> &'static str {
        match self {
            Column::JDay => "JDay",
            Column::Date => "Date",
            Column::Hour => "hour",
            Column::Radiation => "Radiation",
            Column::Temperature => "temperature",
            Column::Tmax => "Tmax",
            Column::Tmin => "Tmin",
            Column::Rain => "rain",
            Column::Wind => "Wind",
            Column::Rh => "rh",
            Column::Co2 => "CO2",
        }
    }

    fn decimals(self) -> Option<i32> {
        match self {
            Column::Radiation | Column::Rain | Column::Wind => Some(2),
            Column::Temperature | Column::Tmax | Column::Tmin | Column::Rh | Column::Co2 => Some(1),
            Column::JDay | Column::Date | Column::Hour => None,
        }
    }
}

/// Round half to even at `decimals` places.
fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round_ties_even() / scale
}

/// Records inside `[first op - 1 day, last op + 1 day]`, sorted by date and hour.
fn window(records: &[WeatherRecord], timeline: &Timeline) -> Result<Vec<WeatherRecord>> {
    let (first, last) = timeline.date_span()?;
    let (Some(from), Some(to)) = (
        first.checked_sub_days(Days::new(1)),
        last.checked_add_days(Days::new(1)),
    ) else {
        return Err(Error::config("operation dates are out of range"));
    };
    let mut rows: Vec<WeatherRecord> = records
        .iter()
        .filter(|r| r.date >= from && r.date <= to)
        .cloned()
        .collect();
    rows.sort_by_key(|r| (r.date, r.hour.unwrap_or(0)));
    Ok(rows)
}

/// Hourly when there are more records than calendar days covered.
fn is_hourly(rows: &[WeatherRecord]) -> bool {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return false;
    };
    let days = (last.date - first.date).num_days();
    rows.len() as i64 > days + 1
}

fn require(value: Option<f64>, what: &str, date: NaiveDate) -> Result<f64> {
    value.ok_or_else(|| {
        Error::config(format!(
            "weather record {} has no {what}",
            date.format(DATE_FORMAT)
        ))
    })
}

pub(crate) fn weather_files(
    station: &WeatherStation,
    timeline: &Timeline,
    spec: &RunSpec,
) -> Result<WeatherFiles> {
    let rows = window(&station.records, timeline)?;
    if rows.is_empty() {
        return Err(Error::encode(format!(
            "station '{}' has no weather records around the treatment dates",
            station.station_type
        )));
    }
    let hourly = is_hourly(&rows);

    let rh_present = rows.iter().all(|r| r.rh.is_some());
    let co2_override = spec.co2_override != 0.0;
    let co2_present = co2_override || rows.iter().all(|r| r.co2.is_some_and(|v| v != 0.0));
    let rain_present = rows.iter().all(|r| r.rain.is_some());
    let wind_present = rows.iter().all(|r| r.wind.is_some());

    let mut columns = vec![Column::JDay, Column::Date];
    if hourly {
        columns.extend([Column::Hour, Column::Radiation, Column::Temperature]);
    } else {
        columns.extend([Column::Radiation, Column::Tmax, Column::Tmin]);
    }
    if rain_present {
        columns.push(Column::Rain);
    }
    if wind_present {
        columns.push(Column::Wind);
    }
    if rh_present {
        columns.push(Column::Rh);
    }
    if co2_present {
        columns.push(Column::Co2);
    }

    let headers: Vec<&str> = columns.iter().map(|c| c.header()).collect();
    let mut w = RecordWriter::new();
    w.line(headers.join(",")).line(headers.join(" "));

    let rain_factor = 1.0 + spec.rain_delta / 100.0;
    for r in &rows {
        let mut cells = Vec::with_capacity(columns.len());
        for &col in &columns {
            let value = match col {
                Column::JDay => {
                    cells.push(r.jday.to_string());
                    continue;
                }
                Column::Date => {
                    cells.push(format!("'{}'", r.date.format(DATE_FORMAT)));
                    continue;
                }
                Column::Hour => {
                    cells.push(r.hour.unwrap_or(0).to_string());
                    continue;
                }
                Column::Radiation => require(r.srad, "radiation", r.date)?,
                Column::Temperature => {
                    require(r.temperature, "temperature", r.date)? + spec.temperature_delta
                }
                Column::Tmax => require(r.tmax, "maximum temperature", r.date)? + spec.temperature_delta,
                Column::Tmin => require(r.tmin, "minimum temperature", r.date)? + spec.temperature_delta,
                Column::Rain => r.rain.unwrap_or_default() * rain_factor,
                Column::Wind => r.wind.unwrap_or_default(),
                Column::Rh => r.rh.unwrap_or_default(),
                Column::Co2 if co2_override => spec.co2_override,
                Column::Co2 => r.co2.unwrap_or_default(),
            };
            let value = col.decimals().map_or(value, |d| round_to(value, d));
            cells.push(py_float(value));
        }
        w.line(cells.join(" "));
    }

    let wea = InputFile::new(format!("{}.wea", station.station_type), w.finish());
    let cli = climate_file(station, hourly, wind_present, rh_present, co2_present);
    Ok(WeatherFiles { wea, cli, hourly })
}

fn climate_file(
    station: &WeatherStation,
    hourly: bool,
    wind: bool,
    rh: bool,
    co2: bool,
) -> InputFile {
    let meta = &station.meta;
    let flag = |present: bool| i64::from(present);

    let mut header = String::new();
    let mut values = String::new();
    if !wind {
        header.push_str("wind");
        values.push_str(&py_float(meta.avg_wind));
    }
    // rain intensity average only applies to daily series
    if !hourly {
        header.push_str("    irav");
        values.push_str(&format!("    {}", py_float(meta.avg_rain_rate)));
    }
    header.push_str("    ChemConc");
    values.push_str(&format!("    {}", py_float(meta.chem_conc)));
    if !co2 {
        header.push_str("    Co2");
        values.push_str(&format!("    {}", py_float(meta.avg_co2)));
    }

    let mut w = RecordWriter::new();
    w.line(format!(
        "***STANDARD METEOROLOGICAL DATA  Header file for {}",
        station.station_type
    ))
    .line("Latitude Longitude")
    .uniform(&[meta.latitude, meta.longitude], F14_6)
    .line("^Daily Bulb T(1) ^Daily Wind(2) ^RainIntensity(3) ^Daily Conc^(4) ^Furrow(5) ^Rel_humid(6) ^CO2(7)")
    .record(
        [0, flag(wind), 0, 0, 0, flag(rh), flag(co2)]
            .into_iter()
            .map(|f| (f, I14)),
    )
    .line("Parameters for changing of units: BSOLAR BTEMP ATEMP ERAIN BWIND BIR")
    .line("BSOLAR is 1e6/3600 to go from j m-2 h-1 to wm-2")
    .cells(&[
        cell(meta.bsolar, Col::right(14, 1)),
        cell(meta.btemp, Col::right(14, 1)),
        cell(meta.atemp, Col::right(14, 4)),
        cell(0.1, Col::right(14, 1)),
        cell(meta.bwind, Col::right(14, 1)),
        cell(meta.bir, Col::right(14, 1)),
    ])
    .line("Average values for the site")
    .line(header)
    .line(values);

    InputFile::new(format!("{}.cli", station.station_type), w.finish())
}
