//! Cells, sheets and row views.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell value.
///
/// Serialized untagged so a workbook file reads like plain JSON tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Empty cell.
    #[default]
    Empty,
    /// Boolean cell.
    Bool(bool),
    /// Integer cell.
    Int(i64),
    /// Float cell.
    Float(f64),
    /// Text cell.
    Text(String),
}

impl CellValue {
    /// Creates a text cell.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns whether the cell is empty (no value or empty text).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Returns the text content of a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the cell as text; empty cells render as `""`.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

static EMPTY: CellValue = CellValue::Empty;

/// A named table of ordered columns and rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    /// Sheet name.
    pub name: String,
    /// Column headers.
    pub columns: Vec<String>,
    /// Rows, each as wide as `columns`.
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Creates a sheet with the given header.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the sheet has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of a column.
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Returns a column's index, appending it when absent.
    pub fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(idx) = self.column_index(column) {
            return idx;
        }
        let idx = self.columns.len();
        self.insert_column(idx, column);
        idx
    }

    /// Inserts a column at `idx`, shifting later columns right.
    ///
    /// Existing rows get an empty cell in the new position.
    pub fn insert_column(&mut self, idx: usize, column: &str) {
        let idx = idx.min(self.columns.len());
        self.columns.insert(idx, column.to_string());
        for row in &mut self.rows {
            if row.len() >= idx {
                row.insert(idx, CellValue::Empty);
            }
        }
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn append_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
    }

    /// Appends a row given as `(column, value)` pairs.
    ///
    /// Columns that do not exist yet are appended to the header.
    pub fn append_keyed<'a, I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (&'a str, CellValue)>,
    {
        let mut positioned = Vec::new();
        for (column, value) in cells {
            positioned.push((self.ensure_column(column), value));
        }
        let mut row = vec![CellValue::Empty; self.columns.len()];
        for (idx, value) in positioned {
            row[idx] = value;
        }
        self.rows.push(row);
    }

    /// Iterates over rows.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row { sheet: self, cells })
    }

    /// Iterates over rows whose `column` renders as `value`.
    pub fn find_rows<'a>(&'a self, column: &str, value: &'a str) -> impl Iterator<Item = Row<'a>> {
        let idx = self.column_index(column);
        self.rows().filter(move |row| {
            idx.and_then(|i| row.cells.get(i))
                .is_some_and(|cell| cell.to_text() == value)
        })
    }
}

/// A borrowed view of one row with by-name cell access.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    sheet: &'a Sheet,
    cells: &'a [CellValue],
}

impl<'a> Row<'a> {
    /// Returns the cell under `column`, or an empty cell when absent.
    #[must_use]
    pub fn get(&self, column: &str) -> &'a CellValue {
        self.sheet
            .column_index(column)
            .and_then(|i| self.cells.get(i))
            .unwrap_or(&EMPTY)
    }

    /// Returns the cell under `column` rendered as text.
    #[must_use]
    pub fn text(&self, column: &str) -> String {
        self.get(column).to_text()
    }

    /// Iterates over `(column, cell)` pairs.
    pub fn cells(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> {
        let cells = self.cells;
        self.sheet
            .columns
            .iter()
            .enumerate()
            .map(move |(i, c)| (c.as_str(), cells.get(i).unwrap_or(&EMPTY)))
    }
}
