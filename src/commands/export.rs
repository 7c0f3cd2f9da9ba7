//! Export command.

use std::path::{Path, PathBuf};

use anyhow::Context;
use labsheet::config::LabsheetConfig;
use labsheet::io::{ExportOptions, ExportService};
use labsheet::storage::MemoryStore;

use super::print_diagnostics;

/// Exports a site file into a transfer archive.
pub fn cmd_export(
    config: &LabsheetConfig,
    site: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = MemoryStore::load(&site)
        .with_context(|| format!("failed to load site {}", site.display()))?;
    let output = output.unwrap_or_else(|| default_archive_path(&site));

    let service = ExportService::new(ExportOptions::from(config));
    let result = service
        .export_to_archive(&store, &output)
        .with_context(|| format!("export to {} failed", output.display()))?;

    println!("Export complete:");
    println!("  Objects:     {}", result.objects_exported);
    println!("  Singletons:  {}", result.singletons_exported);
    println!("  Sheets:      {}", result.sheets);
    println!("  Attachments: {}", result.attachments);
    if !result.types_skipped.is_empty() {
        println!("  Empty types: {}", result.types_skipped.join(", "));
    }
    if let Some(archive) = &result.archive {
        println!("  Archive:     {}", archive.path.display());
        println!("  Size:        {} bytes", archive.size_bytes);
        println!("  SHA-256:     {}", archive.checksum);
    }
    print_diagnostics(&result.diagnostics);

    Ok(())
}

/// `site.json` exports to `site.tar.zst` next to it.
fn default_archive_path(site: &Path) -> PathBuf {
    site.with_extension(labsheet::archive::ARCHIVE_EXTENSION)
}
