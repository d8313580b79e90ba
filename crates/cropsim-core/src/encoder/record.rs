// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fixed-width record writer shared by every input file encoder.
//!
//! A record is a list of `(value, column)` pairs. The column carries width,
//! precision and alignment, so a file layout is declared next to the data
//! rather than spread through format strings.

/// Horizontal alignment inside a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Pad on the right.
    Left,
    /// Pad on the left.
    Right,
}

/// Layout of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Col {
    width: usize,
    precision: Option<usize>,
    align: Align,
}

impl Col {
    /// Right-aligned number with fixed decimals.
    pub const fn right(width: usize, precision: usize) -> Self {
        Self {
            width,
            precision: Some(precision),
            align: Align::Right,
        }
    }

    /// Left-aligned number with fixed decimals.
    pub const fn left(width: usize, precision: usize) -> Self {
        Self {
            width,
            precision: Some(precision),
            align: Align::Left,
        }
    }

    /// Right-aligned value printed as-is.
    pub const fn right_plain(width: usize) -> Self {
        Self {
            width,
            precision: None,
            align: Align::Right,
        }
    }

    /// Left-aligned value printed as-is.
    pub const fn left_plain(width: usize) -> Self {
        Self {
            width,
            precision: None,
            align: Align::Left,
        }
    }

    /// Fixed decimals with no padding.
    pub const fn bare(precision: usize) -> Self {
        Self::right(0, precision)
    }
}

/// 14 wide, 6 decimals, right aligned: the default numeric column.
pub const F14_6: Col = Col::right(14, 6);
/// 14 wide, 3 decimals, right aligned.
pub const F14_3: Col = Col::right(14, 3);
/// 14 wide integer, right aligned.
pub const I14: Col = Col::right_plain(14);

/// A cell value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Floating point number.
    Float(f64),
    /// Integer; printed with decimals when the column has a precision.
    Int(i64),
    /// Literal text.
    Text(&'a str),
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Text(v)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(v: &'a String) -> Self {
        Value::Text(v.as_str())
    }
}

fn pad(text: &str, col: Col) -> String {
    match col.align {
        Align::Left => format!("{text:<width$}", width = col.width),
        Align::Right => format!("{text:>width$}", width = col.width),
    }
}

/// Render one cell.
pub fn cell<'a>(value: impl Into<Value<'a>>, col: Col) -> String {
    let text = match (value.into(), col.precision) {
        (Value::Float(v), Some(p)) => format!("{v:.p$}"),
        (Value::Float(v), None) => py_float(v),
        (Value::Int(v), Some(p)) => format!("{:.p$}", v as f64),
        (Value::Int(v), None) => v.to_string(),
        (Value::Text(s), _) => s.to_string(),
    };
    pad(&text, col)
}

/// Text wrapped in single quotes, padded inside the quotes.
pub fn quoted(text: &str, width: usize) -> String {
    format!("'{text:<width$}'")
}

/// Float as a Python-style repr: shortest round-trip form, always with a decimal point.
pub fn py_float(v: f64) -> String {
    format!("{v:?}")
}

/// Integral values as integers, anything else in shortest form.
pub fn compact(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        (v as i64).to_string()
    } else {
        v.to_string()
    }
}

/// Fixed decimals with trailing zeros (and a dangling point) removed.
pub fn trimmed(v: f64, precision: usize) -> String {
    let text = format!("{v:.precision$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Integral values as integers, anything else trimmed to `precision` decimals.
pub fn compact_trimmed(v: f64, precision: usize) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        (v as i64).to_string()
    } else {
        trimmed(v, precision)
    }
}

/// Accumulates the lines of one text file.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: String,
}

impl RecordWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a literal line.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
        self
    }

    /// Append one record made of laid-out cells.
    pub fn record<'a, I, V>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (V, Col)>,
        V: Into<Value<'a>>,
    {
        for (value, col) in fields {
            self.buf.push_str(&cell(value, col));
        }
        self.buf.push('\n');
        self
    }

    /// Append one record from already rendered cells (see [`cell`]).
    pub fn cells(&mut self, cells: &[String]) -> &mut Self {
        for c in cells {
            self.buf.push_str(c);
        }
        self.buf.push('\n');
        self
    }

    /// Append one record where every cell shares a layout.
    pub fn uniform(&mut self, values: &[f64], col: Col) -> &mut Self {
        self.record(values.iter().map(|v| (*v, col)))
    }

    /// Finish and return the file contents.
    pub fn finish(self) -> String {
        self.buf
    }
}
