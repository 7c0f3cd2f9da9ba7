//! In-memory tabular store.
//!
//! A [`Workbook`] is an ordered set of named [`Sheet`]s plus the alias table
//! produced by the [`SheetNamer`]. Export builds one from scratch; import loads
//! one fully into memory and reads it by sheet key.

mod csv;
mod file;
mod naming;
mod sheet;

pub use self::csv::write_csv_dir;
pub use file::{WORKBOOK_FORMAT_VERSION, load_workbook, save_workbook};
pub use naming::{
    Assignment, DEFAULT_SHEET_NAME_LIMIT, SheetAlias, SheetKey, SheetKind, SheetNamer,
    truncate_name,
};
pub use sheet::{CellValue, Row, Sheet};

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};

/// Column holding a relationship's source object id.
pub const SOURCE_COLUMN: &str = "Source";
/// Column holding a relationship's target object id.
pub const TARGET_COLUMN: &str = "Target";

/// An ordered collection of sheets.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    index: HashMap<String, usize>,
    namer: SheetNamer,
}

impl Workbook {
    /// Creates an empty workbook with the given sheet-name limit.
    #[must_use]
    pub fn new(sheet_name_limit: usize) -> Self {
        Self {
            sheets: Vec::new(),
            index: HashMap::new(),
            namer: SheetNamer::new(sheet_name_limit),
        }
    }

    /// Rebuilds a workbook from loaded sheets and aliases.
    #[must_use]
    pub fn from_parts(sheets: Vec<Sheet>, aliases: Vec<SheetAlias>, sheet_name_limit: usize) -> Self {
        let index = sheets
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        Self {
            sheets,
            index,
            namer: SheetNamer::from_aliases(sheet_name_limit, aliases),
        }
    }

    /// Returns the sheet for `key`, creating it with `columns` on first use.
    ///
    /// A truncation collision is reported once, when the sheet is created.
    pub fn ensure_sheet(
        &mut self,
        key: &SheetKey,
        columns: &[&str],
        diagnostics: &mut Diagnostics,
    ) -> &mut Sheet {
        let assignment = self.namer.assign(key);
        if let Some(&idx) = self.index.get(&assignment.name) {
            return &mut self.sheets[idx];
        }

        if let Some(taken) = &assignment.collided_with {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::SheetNameCollision,
                    format!(
                        "sheet name '{taken}' already used; '{}' written as '{}'",
                        key.key, assignment.name
                    ),
                )
                .with_sheet(assignment.name.clone()),
            );
        }

        let idx = self.sheets.len();
        self.sheets
            .push(Sheet::new(assignment.name.clone(), columns.iter().copied()));
        self.index.insert(assignment.name, idx);
        &mut self.sheets[idx]
    }

    /// Looks up the sheet for `key` through the alias table.
    #[must_use]
    pub fn resolve(&self, key: &SheetKey) -> Option<&Sheet> {
        self.sheet(&self.namer.resolve(key))
    }

    /// Returns the sheet name `key` maps to.
    #[must_use]
    pub fn sheet_name(&self, key: &SheetKey) -> String {
        self.namer.resolve(key)
    }

    /// Looks up a sheet by name.
    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.index.get(name).map(|&i| &self.sheets[i])
    }

    /// Looks up a sheet by name for writing.
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.index.get(name).map(|&i| &mut self.sheets[i])
    }

    /// Iterates over sheets in creation order.
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    /// Returns the number of sheets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Returns whether the workbook has no sheets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Returns the alias table.
    #[must_use]
    pub fn aliases(&self) -> &[SheetAlias] {
        self.namer.aliases()
    }

    /// Returns the sheet-name limit.
    #[must_use]
    pub const fn sheet_name_limit(&self) -> usize {
        self.namer.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_sheet_is_lazy_and_stable() {
        let mut wb = Workbook::new(31);
        let mut diagnostics = Diagnostics::new();
        let key = SheetKey::relationship("SampleTypeSamplePoint");

        wb.ensure_sheet(&key, &[SOURCE_COLUMN, TARGET_COLUMN], &mut diagnostics)
            .append_row(vec!["water".into(), "P1".into()]);
        wb.ensure_sheet(&key, &[SOURCE_COLUMN, TARGET_COLUMN], &mut diagnostics)
            .append_row(vec!["water".into(), "P2".into()]);

        assert_eq!(wb.len(), 1);
        assert_eq!(wb.resolve(&key).map(Sheet::len), Some(2));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_collision_reported_once() {
        let mut wb = Workbook::new(10);
        let mut diagnostics = Diagnostics::new();
        let a = SheetKey::records("abcdefghij_values");
        let b = SheetKey::records("abcdefghij_other");

        wb.ensure_sheet(&a, &["id", "field"], &mut diagnostics);
        wb.ensure_sheet(&b, &["id", "field"], &mut diagnostics);
        wb.ensure_sheet(&b, &["id", "field"], &mut diagnostics);

        assert_eq!(wb.len(), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::SheetNameCollision), 1);
        assert_eq!(wb.sheet_name(&b), "abcdefgh~1");
    }
}
