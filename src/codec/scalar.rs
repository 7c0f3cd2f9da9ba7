//! Single-cell encodings.

use chrono::{DateTime, FixedOffset};

use crate::models::FieldValue;
use crate::workbook::CellValue;

/// Cell text for `true`.
pub const TRUE_TEXT: &str = "True";
/// Cell text for `false`.
pub const FALSE_TEXT: &str = "False";

/// Renders a boolean the way cells store it.
#[must_use]
pub const fn bool_text(b: bool) -> &'static str {
    if b { TRUE_TEXT } else { FALSE_TEXT }
}

/// Parses a boolean cell.
///
/// Accepts `True`/`False` in any case, `1`/`0`, boolean cells and integer
/// cells holding 0 or 1.
#[must_use]
pub fn parse_bool(cell: &CellValue) -> Option<bool> {
    match cell {
        CellValue::Bool(b) => Some(*b),
        CellValue::Int(0) => Some(false),
        CellValue::Int(1) => Some(true),
        CellValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parses an integer cell.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_int(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Int(n) => Some(*n),
        CellValue::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a float cell.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn parse_float(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Float(x) => Some(*x),
        CellValue::Int(n) => Some(*n as f64),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Renders a timestamp as RFC 2822 text.
#[must_use]
pub fn date_text(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc2822()
}

/// Parses RFC 2822 text, falling back to RFC 3339.
#[must_use]
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
}

/// Joins lines into one newline-separated cell.
#[must_use]
pub fn lines_text(lines: &[String]) -> String {
    lines.join("\n")
}

/// Splits a newline-separated cell; an empty cell is an empty list.
#[must_use]
pub fn parse_lines(cell: &CellValue) -> Vec<String> {
    if cell.is_empty() {
        return Vec::new();
    }
    cell.to_text().split('\n').map(str::to_string).collect()
}

/// Maps a scalar record value to a cell.
///
/// Returns `None` for values that cannot live in a single record cell.
#[must_use]
pub fn record_cell(value: &FieldValue) -> Option<CellValue> {
    match value {
        FieldValue::Empty => Some(CellValue::Empty),
        FieldValue::Bool(b) => Some(CellValue::Bool(*b)),
        FieldValue::Int(n) => Some(CellValue::Int(*n)),
        FieldValue::Float(x) => Some(CellValue::Float(*x)),
        FieldValue::Str(s) => Some(CellValue::Text(s.clone())),
        FieldValue::Date(d) => Some(CellValue::Text(date_text(d))),
        FieldValue::Lines(_)
        | FieldValue::File(_)
        | FieldValue::Ref(_)
        | FieldValue::Refs(_)
        | FieldValue::Record(_)
        | FieldValue::Records(_) => None,
    }
}

/// Maps a record cell back to a value.
#[must_use]
pub fn record_value(cell: &CellValue) -> FieldValue {
    match cell {
        CellValue::Empty => FieldValue::Empty,
        CellValue::Bool(b) => FieldValue::Bool(*b),
        CellValue::Int(n) => FieldValue::Int(*n),
        CellValue::Float(x) => FieldValue::Float(*x),
        CellValue::Text(s) => FieldValue::Str(s.clone()),
    }
}
