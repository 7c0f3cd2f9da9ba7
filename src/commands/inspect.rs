//! Inspect command.

use std::path::PathBuf;

use anyhow::Context;
use labsheet::archive::BundleReader;
use labsheet::config::LabsheetConfig;
use labsheet::workbook::{load_workbook, write_csv_dir};

/// Prints an archive's manifest, entries and sheets.
///
/// With `csv_dir`, every sheet is also written out as a CSV file.
pub fn cmd_inspect(
    config: &LabsheetConfig,
    archive: PathBuf,
    csv_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let entries = BundleReader::list(&archive)
        .with_context(|| format!("failed to read {}", archive.display()))?;

    let scratch = tempfile::TempDir::new().context("failed to create scratch directory")?;
    let manifest = BundleReader::unpack(&archive, scratch.path())
        .with_context(|| format!("{} failed verification", archive.display()))?;
    let workbook = load_workbook(
        &scratch.path().join(&manifest.workbook),
        config.sheet_name_limit,
    )?;

    println!("Archive: {}", archive.display());
    println!("  Format:   v{}", manifest.format_version);
    println!("  Tool:     {}", manifest.tool_version);
    println!("  Created:  {}", manifest.created_at);
    println!("  Workbook: {}", manifest.workbook);
    println!();
    println!("Entries ({}):", entries.len());
    for entry in &entries {
        println!("  {:<40} {:>10}", entry.name, entry.size);
    }
    println!();
    println!("Sheets ({}):", workbook.len());
    for sheet in workbook.sheets() {
        println!("  {:<40} {:>6} rows", sheet.name, sheet.len());
    }

    if let Some(dir) = csv_dir {
        let written = write_csv_dir(&workbook, &dir)
            .with_context(|| format!("failed to write CSV files to {}", dir.display()))?;
        println!();
        println!("Wrote {} CSV files to {}", written.len(), dir.display());
    }

    Ok(())
}
