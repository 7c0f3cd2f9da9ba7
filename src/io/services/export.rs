//! Export service.
//!
//! Builds a workbook from a store and packs it, with the attachment files,
//! into a transfer archive.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::archive::{BundleInfo, BundleWriter, MANIFEST_FILE};
use crate::codec::{EnrichmentHook, ExportContext, FieldCodec, HookTable};
use crate::config::{LabsheetConfig, SingletonSheet};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::io::{AttachmentSideband, ObjectSerializer};
use crate::models::ObjectRecord;
use crate::storage::ObjectStore;
use crate::workbook::{Workbook, save_workbook};
use crate::{Error, Result};

/// Options for an export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Types to export, in order.
    pub types: Vec<String>,
    /// Singletons exported before the types.
    pub singletons: Vec<SingletonSheet>,
    /// Field names never exported.
    pub ignore_fields: Vec<String>,
    /// Maximum sheet name length.
    pub sheet_name_limit: usize,
    /// Workbook file name.
    pub workbook_file: String,
    /// zstd level for the archive.
    pub compression_level: i32,
    /// Record enrichment hooks.
    pub hooks: Vec<EnrichmentHook>,
    /// Acting user.
    pub actor: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&LabsheetConfig::default())
    }
}

impl From<&LabsheetConfig> for ExportOptions {
    fn from(config: &LabsheetConfig) -> Self {
        Self {
            types: config.types.clone(),
            singletons: config.singletons.clone(),
            ignore_fields: config.ignore_fields.clone(),
            sheet_name_limit: config.sheet_name_limit,
            workbook_file: config.workbook_file.clone(),
            compression_level: config.compression_level,
            hooks: config.hooks.clone(),
            actor: config.actor.clone(),
        }
    }
}

impl ExportOptions {
    /// Sets the exported types.
    #[must_use]
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the singleton sheets.
    #[must_use]
    pub fn with_singletons(mut self, singletons: Vec<SingletonSheet>) -> Self {
        self.singletons = singletons;
        self
    }

    /// Sets the ignored field names.
    #[must_use]
    pub fn with_ignore_fields(mut self, fields: Vec<String>) -> Self {
        self.ignore_fields = fields;
        self
    }

    /// Sets the sheet name limit.
    #[must_use]
    pub const fn with_sheet_name_limit(mut self, limit: usize) -> Self {
        self.sheet_name_limit = limit;
        self
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

/// Result of an export run.
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    /// Objects written to type sheets.
    pub objects_exported: usize,
    /// Singleton sheets written.
    pub singletons_exported: usize,
    /// Sheets in the workbook.
    pub sheets: usize,
    /// Attachment files written.
    pub attachments: usize,
    /// Configured types with no objects.
    pub types_skipped: Vec<String>,
    /// Workbook file path.
    pub workbook_path: Option<PathBuf>,
    /// Archive summary, for archive exports.
    pub archive: Option<BundleInfo>,
    /// Non-fatal findings.
    pub diagnostics: Vec<Diagnostic>,
}

impl ExportResult {
    /// Returns whether anything was exported.
    #[must_use]
    pub const fn has_exports(&self) -> bool {
        self.objects_exported > 0 || self.singletons_exported > 0
    }
}

/// Service for exporting a store.
#[derive(Debug, Clone, Default)]
pub struct ExportService {
    options: ExportOptions,
}

impl ExportService {
    /// Creates a new export service.
    #[must_use]
    pub const fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Returns the run options.
    #[must_use]
    pub const fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Builds the workbook, writing attachments into `scratch`.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal failures: attachment I/O or a schema that
    /// cannot be read.
    #[instrument(skip_all, fields(actor = %self.options.actor, types = self.options.types.len()))]
    pub fn export_workbook(
        &self,
        store: &dyn ObjectStore,
        scratch: &Path,
    ) -> Result<(Workbook, ExportResult)> {
        let codec = FieldCodec::new(HookTable::new(self.options.hooks.clone()));
        let serializer = ObjectSerializer::new(&codec, &self.options.ignore_fields);
        let mut workbook = Workbook::new(self.options.sheet_name_limit);
        let mut sideband = AttachmentSideband::new(scratch);
        sideband.reserve(&self.options.workbook_file);
        sideband.reserve(MANIFEST_FILE);
        let mut diagnostics = Diagnostics::new();
        let mut result = ExportResult::default();
        let mut seen_uids = HashSet::new();

        let mut ctx = ExportContext {
            store,
            workbook: &mut workbook,
            sideband: &mut sideband,
            diagnostics: &mut diagnostics,
            actor: &self.options.actor,
        };

        for singleton in &self.options.singletons {
            if !store.has_type(&singleton.type_name) {
                debug!(type_name = %singleton.type_name, "Singleton type not registered; skipped");
                continue;
            }
            let Some(record) = store.object_at_path(&singleton.path) else {
                info!(path = %singleton.path, "Singleton not found; skipped");
                continue;
            };
            check_uid(ctx.diagnostics, &mut seen_uids, record, &singleton.sheet);
            let schema = store.field_descriptors(&singleton.type_name)?;
            serializer.serialize_singleton(&mut ctx, &singleton.sheet, &schema, record)?;
            result.singletons_exported += 1;
        }

        for type_name in &self.options.types {
            if !store.has_type(type_name) {
                ctx.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnknownType,
                        format!("type '{type_name}' is not registered"),
                    )
                    .with_sheet(type_name),
                );
                continue;
            }
            let records = store.objects_of_type(type_name);
            if records.is_empty() {
                info!(type_name = %type_name, "No objects; skipped");
                result.types_skipped.push(type_name.clone());
                continue;
            }
            for record in &records {
                check_uid(ctx.diagnostics, &mut seen_uids, record, type_name);
            }
            let schema = store.field_descriptors(type_name)?;
            result.objects_exported += serializer.serialize_type(&mut ctx, &schema, &records)?;
        }

        result.sheets = workbook.len();
        result.attachments = sideband.written().len();
        result.diagnostics = diagnostics.into_vec();
        info!(
            objects = result.objects_exported,
            sheets = result.sheets,
            attachments = result.attachments,
            diagnostics = result.diagnostics.len(),
            "Export complete"
        );
        Ok((workbook, result))
    }

    /// Exports into a directory: the workbook file plus attachment files.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be written or the export
    /// fails.
    pub fn export_to_dir(&self, store: &dyn ObjectStore, dir: &Path) -> Result<ExportResult> {
        std::fs::create_dir_all(dir).map_err(|e| Error::operation("create_export_dir", e))?;
        let (workbook, mut result) = self.export_workbook(store, dir)?;
        let path = dir.join(&self.options.workbook_file);
        save_workbook(&workbook, &path)?;
        result.workbook_path = Some(path);
        Ok(result)
    }

    /// Exports into a `.tar.zst` archive at `path`.
    ///
    /// The workbook and attachments are staged in a temporary directory that
    /// is removed when the export finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the export or the archive write fails.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn export_to_archive(&self, store: &dyn ObjectStore, path: &Path) -> Result<ExportResult> {
        let scratch = tempfile::TempDir::new().map_err(|e| Error::operation("create_scratch_dir", e))?;
        let mut result = self.export_to_dir(store, scratch.path())?;
        let info = BundleWriter::new(self.options.compression_level).write_dir(
            scratch.path(),
            &self.options.workbook_file,
            path,
        )?;
        info!(entries = info.entries, bytes = info.size_bytes, "Archive written");
        result.workbook_path = None;
        result.archive = Some(info);
        Ok(result)
    }
}

fn check_uid(
    diagnostics: &mut Diagnostics,
    seen: &mut HashSet<String>,
    record: &ObjectRecord,
    sheet: &str,
) {
    if !seen.insert(record.uid.clone()) {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::DuplicateUid,
                format!("uid '{}' already exported", record.uid),
            )
            .with_object(&record.id)
            .with_sheet(sheet),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, FieldDescriptor, FieldKind, FieldValue, TypeSchema};
    use crate::storage::MemoryStore;
    use crate::workbook::{CellValue, SheetKey};
    use tempfile::TempDir;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::provision(
            vec![
                TypeSchema::new("Laboratory")
                    .with_field(FieldDescriptor::new("title", FieldKind::String)),
                TypeSchema::new("Manufacturer")
                    .with_field(FieldDescriptor::new("title", FieldKind::String))
                    .with_field(FieldDescriptor::new("Logo", FieldKind::File)),
                TypeSchema::new("Supplier")
                    .with_field(FieldDescriptor::new("title", FieldKind::String)),
            ],
            "Lab",
            "en",
        );
        store
            .insert_object(
                ObjectRecord::new("Laboratory", "laboratory", "u-lab", "/bika_setup")
                    .with_field("title", "Main Lab"),
            )
            .unwrap();
        store
            .insert_object(
                ObjectRecord::new("Manufacturer", "m1", "u-m1", "/bika_setup/bika_manufacturers")
                    .with_field("title", "Acme")
                    .with_field(
                        "Logo",
                        FieldValue::File(Attachment::new(Some("logo.png"), "image/png", vec![1, 2])),
                    ),
            )
            .unwrap();
        store
    }

    fn options() -> ExportOptions {
        ExportOptions::default()
            .with_types(["Manufacturer", "Supplier", "Ghost"])
            .with_singletons(vec![SingletonSheet::new(
                "Laboratory",
                "Laboratory",
                "/bika_setup/laboratory",
            )])
    }

    #[test]
    fn test_export_options_from_config() {
        let config = LabsheetConfig::default().with_actor("migrator");
        let options = ExportOptions::from(&config);
        assert_eq!(options.actor, "migrator");
        assert_eq!(options.types.len(), 38);
        assert_eq!(options.workbook_file, "setupdata.json");
    }

    #[test]
    fn test_export_workbook() {
        let dir = TempDir::new().unwrap();
        let service = ExportService::new(options());
        let (workbook, result) = service.export_workbook(&store(), dir.path()).unwrap();

        assert_eq!(result.singletons_exported, 1);
        assert_eq!(result.objects_exported, 1);
        assert_eq!(result.types_skipped, vec!["Supplier"]);
        assert_eq!(result.attachments, 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnknownType);

        let names: Vec<&str> = workbook.sheets().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Laboratory", "Manufacturer"]);
        let sheet = workbook.resolve(&SheetKey::object_type("Manufacturer")).unwrap();
        assert_eq!(sheet.rows[0][4], CellValue::text("logo.png"));
        assert!(dir.path().join("logo.png").exists());
    }

    #[test]
    fn test_duplicate_uid_reported() {
        let dir = TempDir::new().unwrap();
        let mut store = store();
        store
            .insert_object(
                ObjectRecord::new("Manufacturer", "m2", "u-m1", "/bika_setup/bika_manufacturers")
                    .with_field("title", "Copy"),
            )
            .unwrap();
        let (_, result) = ExportService::new(options())
            .export_workbook(&store, dir.path())
            .unwrap();
        let dupes: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::DuplicateUid)
            .collect();
        assert_eq!(dupes.len(), 1);
        assert_eq!(dupes[0].object_id.as_deref(), Some("m2"));
    }

    #[test]
    fn test_export_to_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("site.tar.zst");
        let result = ExportService::new(options())
            .export_to_archive(&store(), &path)
            .unwrap();
        assert!(path.exists());
        let info = result.archive.unwrap();
        // manifest, workbook, logo
        assert_eq!(info.entries, 3);
    }
}
