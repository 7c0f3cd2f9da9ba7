//! Import command.

use std::path::PathBuf;

use anyhow::{Context, bail};
use labsheet::config::LabsheetConfig;
use labsheet::io::{ImportOptions, ImportService};
use labsheet::storage::{MemoryStore, SiteFile, SiteInfo};

use super::print_diagnostics;

/// Imports a transfer archive (or an unpacked directory) into a site file.
///
/// An existing site is updated in place. A missing site is provisioned from
/// the `--schema` files first.
pub fn cmd_import(
    config: &LabsheetConfig,
    site: PathBuf,
    input: PathBuf,
    schema: Vec<PathBuf>,
    title: Option<String>,
    language: Option<String>,
) -> anyhow::Result<()> {
    let mut types = Vec::new();
    for path in &schema {
        let loaded = SiteFile::load_schema(path)
            .with_context(|| format!("failed to load schema {}", path.display()))?;
        types.extend(loaded);
    }

    let mut store = if site.exists() {
        let mut store = MemoryStore::load(&site)
            .with_context(|| format!("failed to load site {}", site.display()))?;
        for schema in types {
            store.define_type(schema);
        }
        store
    } else {
        if types.is_empty() {
            bail!(
                "site {} does not exist; pass --schema to provision it",
                site.display()
            );
        }
        let defaults = SiteInfo::default();
        MemoryStore::provision(
            types,
            title.as_deref().unwrap_or(&defaults.title),
            language.as_deref().unwrap_or(&defaults.language),
        )
    };

    let service = ImportService::new(ImportOptions::from(config));
    let result = if input.is_dir() {
        service.import_from_dir(&mut store, &input)
    } else {
        service.import_from_archive(&mut store, &input)
    }
    .with_context(|| format!("import from {} failed", input.display()))?;

    store
        .save(&site)
        .with_context(|| format!("failed to save site {}", site.display()))?;

    println!("Import complete:");
    println!("  Created:     {}", result.created);
    println!("  Updated:     {}", result.updated);
    println!("  Singletons:  {}", result.singletons_imported);
    println!("  Rows skipped: {}", result.skipped_rows);
    println!(
        "  References:  {} retried, {} resolved, {} unresolved",
        result.finalize.retried, result.finalize.resolved, result.finalize.unresolved_targets
    );
    if result.finalize.relinks_retried > 0 {
        println!(
            "  Re-links:    {} retried, {} unresolved",
            result.finalize.relinks_retried, result.finalize.relinks_unresolved
        );
    }
    if !result.sheets_missing.is_empty() {
        println!("  No sheet for: {}", result.sheets_missing.join(", "));
    }
    println!("  Site:        {}", site.display());
    print_diagnostics(&result.diagnostics);

    Ok(())
}
