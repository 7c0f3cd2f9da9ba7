//! CSV dump of a workbook, one file per sheet.

use std::fs;
use std::path::{Path, PathBuf};

use super::Workbook;
use crate::{Error, Result};

/// Writes every sheet of `workbook` to `<dir>/<sheet>.csv`.
///
/// Characters that are unsafe in filenames are replaced with `_`.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be written.
pub fn write_csv_dir(workbook: &Workbook, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| Error::operation("create_csv_dir", e))?;

    let mut written = Vec::with_capacity(workbook.len());
    for sheet in workbook.sheets() {
        let path = dir.join(format!("{}.csv", file_stem(&sheet.name)));
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|e| Error::operation("create_csv_file", e))?;

        writer
            .write_record(&sheet.columns)
            .map_err(|e| Error::operation("write_csv", e))?;
        for row in &sheet.rows {
            writer
                .write_record(row.iter().map(super::CellValue::to_text))
                .map_err(|e| Error::operation("write_csv", e))?;
        }
        writer
            .flush()
            .map_err(|e| Error::operation("flush_csv", e))?;
        written.push(path);
    }
    Ok(written)
}

fn file_stem(sheet_name: &str) -> String {
    sheet_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '~' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::workbook::SheetKey;
    use tempfile::TempDir;

    #[test]
    fn test_csv_dump() {
        let dir = TempDir::new().unwrap();
        let mut wb = Workbook::new(31);
        let mut diagnostics = Diagnostics::new();
        wb.ensure_sheet(&SheetKey::object_type("Unit"), &["path", "uid", "Flag"], &mut diagnostics)
            .append_row(vec!["/units".into(), "u1".into(), crate::workbook::CellValue::Bool(false)]);

        let files = write_csv_dir(&wb, dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        let content = fs::read_to_string(&files[0]).unwrap();
        assert_eq!(content, "path,uid,Flag\n/units,u1,False\n");
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("a/b~1"), "a_b_1");
    }
}
