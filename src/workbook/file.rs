//! Workbook file persistence.
//!
//! The workbook travels as a single JSON document:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "sheets": [{"name": "SampleType", "columns": ["path", "uid"], "rows": [["/x", "u1"]]}],
//!   "aliases": [{"kind": "type", "key": "SampleType", "sheet": "SampleType"}]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

use super::{Sheet, SheetAlias, Workbook};
use crate::{Error, Result};

/// Current workbook file format version.
pub const WORKBOOK_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct WorkbookFileRef<'a> {
    format_version: u32,
    sheets: Vec<&'a Sheet>,
    aliases: &'a [SheetAlias],
}

#[derive(Deserialize)]
struct WorkbookFile {
    format_version: u32,
    #[serde(default)]
    sheets: Vec<Sheet>,
    #[serde(default)]
    aliases: Vec<SheetAlias>,
}

/// Writes a workbook to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_workbook(workbook: &Workbook, path: &Path) -> Result<()> {
    let file = fs::File::create(path).map_err(|e| Error::operation("create_workbook_file", e))?;
    let mut writer = BufWriter::new(file);
    let doc = WorkbookFileRef {
        format_version: WORKBOOK_FORMAT_VERSION,
        sheets: workbook.sheets().collect(),
        aliases: workbook.aliases(),
    };
    serde_json::to_writer_pretty(&mut writer, &doc)
        .map_err(|e| Error::operation("write_workbook", e))?;
    writer
        .flush()
        .map_err(|e| Error::operation("flush_workbook", e))?;
    debug!(path = %path.display(), sheets = workbook.len(), "Saved workbook");
    Ok(())
}

/// Reads a workbook from `path`.
///
/// Rows narrower than their header are padded with empty cells.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, has an
/// unsupported format version or contains duplicate sheet names.
pub fn load_workbook(path: &Path, sheet_name_limit: usize) -> Result<Workbook> {
    let file = fs::File::open(path).map_err(|e| Error::operation("open_workbook_file", e))?;
    let doc: WorkbookFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::InvalidInput(format!("malformed workbook {}: {e}", path.display())))?;

    if doc.format_version != WORKBOOK_FORMAT_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported workbook format version {} (expected {WORKBOOK_FORMAT_VERSION})",
            doc.format_version
        )));
    }

    let mut seen = std::collections::HashSet::new();
    let mut sheets = doc.sheets;
    for sheet in &mut sheets {
        if !seen.insert(sheet.name.clone()) {
            return Err(Error::InvalidInput(format!(
                "duplicate sheet name '{}'",
                sheet.name
            )));
        }
        let width = sheet.columns.len();
        for row in &mut sheet.rows {
            if row.len() < width {
                row.resize(width, super::CellValue::Empty);
            }
        }
    }

    debug!(path = %path.display(), sheets = sheets.len(), "Loaded workbook");
    Ok(Workbook::from_parts(sheets, doc.aliases, sheet_name_limit))
}
