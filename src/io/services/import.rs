//! Import service.
//!
//! Unpacks a transfer archive and rebuilds its objects in a store. Sheets are
//! read singletons first, then in the configured type order; references whose
//! target is created later are settled by the finalization pass at the end.

use std::path::Path;

use tracing::{info, instrument};

use crate::archive::BundleReader;
use crate::codec::{EnrichmentHook, FieldCodec, HookTable, ImportContext};
use crate::config::{LabsheetConfig, SingletonSheet};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::io::{AttachmentSideband, ObjectDeserializer};
use crate::models::{ObjectRecord, parent_path};
use crate::resolve::{FinalizeSummary, ReferenceResolver};
use crate::storage::ObjectStore;
use crate::workbook::{SheetKey, Workbook, load_workbook};
use crate::{Error, Result};

/// Options for an import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Types to import, in order.
    pub types: Vec<String>,
    /// Singletons imported before the types.
    pub singletons: Vec<SingletonSheet>,
    /// Field names never imported.
    pub ignore_fields: Vec<String>,
    /// Maximum sheet name length the workbook was written with.
    pub sheet_name_limit: usize,
    /// Workbook file name, for directory imports.
    pub workbook_file: String,
    /// Reference lookup cache capacity.
    pub resolve_cache_capacity: usize,
    /// Record enrichment hooks.
    pub hooks: Vec<EnrichmentHook>,
    /// Acting user.
    pub actor: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from(&LabsheetConfig::default())
    }
}

impl From<&LabsheetConfig> for ImportOptions {
    fn from(config: &LabsheetConfig) -> Self {
        Self {
            types: config.types.clone(),
            singletons: config.singletons.clone(),
            ignore_fields: config.ignore_fields.clone(),
            sheet_name_limit: config.sheet_name_limit,
            workbook_file: config.workbook_file.clone(),
            resolve_cache_capacity: config.resolve_cache_capacity,
            hooks: config.hooks.clone(),
            actor: config.actor.clone(),
        }
    }
}

impl ImportOptions {
    /// Sets the imported types.
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

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

/// Result of an import run.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    /// Objects created.
    pub created: usize,
    /// Existing objects updated in place.
    pub updated: usize,
    /// Rows skipped for lack of an id.
    pub skipped_rows: usize,
    /// Singleton sheets applied.
    pub singletons_imported: usize,
    /// Configured types whose sheet was absent.
    pub sheets_missing: Vec<String>,
    /// Outcome of the finalization pass.
    pub finalize: FinalizeSummary,
    /// Non-fatal findings.
    pub diagnostics: Vec<Diagnostic>,
}

impl ImportResult {
    /// Total rows turned into objects.
    #[must_use]
    pub const fn total_imported(&self) -> usize {
        self.created + self.updated
    }
}

/// Service for importing into a store.
#[derive(Debug, Clone, Default)]
pub struct ImportService {
    options: ImportOptions,
}

impl ImportService {
    /// Creates a new import service.
    #[must_use]
    pub const fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    /// Returns the run options.
    #[must_use]
    pub const fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Imports a loaded workbook; attachments are read from `attachments`.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal failures: attachment I/O, an object that
    /// cannot be created, or a store write that fails outright.
    #[instrument(skip_all, fields(actor = %self.options.actor, sheets = workbook.len()))]
    pub fn import_workbook(
        &self,
        store: &mut dyn ObjectStore,
        workbook: &Workbook,
        attachments: &Path,
    ) -> Result<ImportResult> {
        let codec = FieldCodec::new(HookTable::new(self.options.hooks.clone()));
        let deserializer = ObjectDeserializer::new(&codec, &self.options.ignore_fields);
        let sideband = AttachmentSideband::new(attachments);
        let mut resolver = ReferenceResolver::new(self.options.resolve_cache_capacity);
        let mut diagnostics = Diagnostics::new();
        let mut result = ImportResult::default();

        let mut ctx = ImportContext {
            store,
            workbook,
            sideband: &sideband,
            resolver: &mut resolver,
            diagnostics: &mut diagnostics,
            actor: &self.options.actor,
        };

        for singleton in &self.options.singletons {
            let Some(sheet) = workbook.resolve(&SheetKey::singleton(&singleton.sheet)) else {
                info!(sheet = %singleton.sheet, "No worksheet found");
                continue;
            };
            if !ctx.store.has_type(&singleton.type_name) {
                push_unknown_type(ctx.diagnostics, &singleton.type_name, &sheet.name);
                continue;
            }
            let existing = ctx
                .store
                .object_at_path(&singleton.path)
                .map(ObjectRecord::to_ref);
            let owner = if let Some(existing) = existing {
                existing
            } else {
                let id = singleton.path.rsplit('/').next().unwrap_or_default();
                ctx.store
                    .create_object(&singleton.type_name, parent_path(&singleton.path), id)?
            };
            let schema = ctx.store.field_descriptors(&singleton.type_name)?;
            deserializer.deserialize_singleton(&mut ctx, &owner, &schema, sheet)?;
            result.singletons_imported += 1;
        }

        for type_name in &self.options.types {
            let Some(sheet) = workbook.resolve(&SheetKey::object_type(type_name)) else {
                info!(type_name = %type_name, "No worksheet found");
                result.sheets_missing.push(type_name.clone());
                continue;
            };
            if !ctx.store.has_type(type_name) {
                push_unknown_type(ctx.diagnostics, type_name, &sheet.name);
                continue;
            }
            let schema = ctx.store.field_descriptors(type_name)?;
            let summary = deserializer.deserialize_type(&mut ctx, &schema, sheet)?;
            result.created += summary.created;
            result.updated += summary.updated;
            result.skipped_rows += summary.skipped;
        }

        result.finalize = ctx.resolver.finalize(&mut *ctx.store, &mut *ctx.diagnostics)?;
        result.diagnostics = diagnostics.into_vec();
        info!(
            created = result.created,
            updated = result.updated,
            deferred = result.finalize.retried,
            diagnostics = result.diagnostics.len(),
            "Import complete"
        );
        Ok(result)
    }

    /// Imports from a directory holding the workbook file and attachments.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be loaded or the import fails.
    pub fn import_from_dir(&self, store: &mut dyn ObjectStore, dir: &Path) -> Result<ImportResult> {
        let workbook = load_workbook(
            &dir.join(&self.options.workbook_file),
            self.options.sheet_name_limit,
        )?;
        self.import_workbook(store, &workbook, dir)
    }

    /// Imports from a `.tar.zst` archive.
    ///
    /// The archive is verified and unpacked into a temporary directory that
    /// is removed when the import finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive fails verification or the import
    /// fails.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn import_from_archive(
        &self,
        store: &mut dyn ObjectStore,
        path: &Path,
    ) -> Result<ImportResult> {
        let scratch =
            tempfile::TempDir::new().map_err(|e| Error::operation("create_scratch_dir", e))?;
        let manifest = BundleReader::unpack(path, scratch.path())?;
        let workbook = load_workbook(
            &scratch.path().join(&manifest.workbook),
            self.options.sheet_name_limit,
        )?;
        self.import_workbook(store, &workbook, scratch.path())
    }
}

fn push_unknown_type(diagnostics: &mut Diagnostics, type_name: &str, sheet: &str) {
    diagnostics.push(
        Diagnostic::new(
            DiagnosticKind::UnknownType,
            format!("type '{type_name}' is not registered on this site"),
        )
        .with_sheet(sheet),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDescriptor, FieldKind, FieldValue, TypeSchema};
    use crate::storage::MemoryStore;
    use crate::workbook::save_workbook;
    use tempfile::TempDir;

    fn schemas() -> Vec<TypeSchema> {
        vec![
            TypeSchema::new("Laboratory")
                .with_field(FieldDescriptor::new("title", FieldKind::String)),
            TypeSchema::new("SamplePoint")
                .with_field(FieldDescriptor::new("title", FieldKind::String)),
            TypeSchema::new("SampleType")
                .with_field(FieldDescriptor::new("title", FieldKind::String))
                .with_field(FieldDescriptor::reference(
                    "DefaultPoint",
                    "SampleTypeDefaultPoint",
                    "SamplePoint",
                )),
        ]
    }

    /// SampleType is read before SamplePoint, so its reference is deferred.
    fn workbook() -> Workbook {
        let mut diagnostics = Diagnostics::new();
        let mut workbook = Workbook::new(31);
        workbook
            .ensure_sheet(&SheetKey::singleton("Laboratory"), &["field", "value"], &mut diagnostics)
            .append_row(vec!["title".into(), "Main Lab".into()]);
        workbook
            .ensure_sheet(
                &SheetKey::object_type("SampleType"),
                &["path", "uid", "id", "title", "DefaultPoint"],
                &mut diagnostics,
            )
            .append_row(vec![
                "/bika_setup/bika_sampletypes".into(),
                "x1".into(),
                "water".into(),
                "Water".into(),
                "P1".into(),
            ]);
        workbook
            .ensure_sheet(
                &SheetKey::object_type("SamplePoint"),
                &["path", "uid", "id", "title"],
                &mut diagnostics,
            )
            .append_row(vec![
                "/bika_setup/bika_samplepoints".into(),
                "x2".into(),
                "P1".into(),
                "Point one".into(),
            ]);
        workbook
    }

    fn options() -> ImportOptions {
        ImportOptions::default()
            .with_types(["SampleType", "SamplePoint", "Method"])
            .with_singletons(vec![SingletonSheet::new(
                "Laboratory",
                "Laboratory",
                "/bika_setup/laboratory",
            )])
    }

    #[test]
    fn test_import_workbook_defers_then_resolves() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::provision(schemas(), "Lab", "en");
        let result = ImportService::new(options())
            .import_workbook(&mut store, &workbook(), dir.path())
            .unwrap();

        assert_eq!(result.singletons_imported, 1);
        assert_eq!(result.created, 2);
        assert_eq!(result.sheets_missing, vec!["Method"]);
        assert_eq!(result.finalize.retried, 1);
        assert_eq!(result.finalize.resolved, 1);
        assert!(result.diagnostics.is_empty());

        let lab = store.object_at_path("/bika_setup/laboratory").unwrap();
        assert_eq!(lab.field("title"), &FieldValue::from("Main Lab"));
        let water = store.object_at_path("/bika_setup/bika_sampletypes/water").unwrap();
        assert!(matches!(water.field("DefaultPoint"), FieldValue::Ref(r) if r.id == "P1"));
    }

    #[test]
    fn test_unknown_type_reported() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::provision(
            vec![
                TypeSchema::new("SamplePoint")
                    .with_field(FieldDescriptor::new("title", FieldKind::String)),
            ],
            "Lab",
            "en",
        );
        let result = ImportService::new(options().with_singletons(Vec::new()))
            .import_workbook(&mut store, &workbook(), dir.path())
            .unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnknownType);
        assert_eq!(result.diagnostics[0].sheet.as_deref(), Some("SampleType"));
    }

    #[test]
    fn test_import_from_dir() {
        let dir = TempDir::new().unwrap();
        save_workbook(&workbook(), &dir.path().join("setupdata.json")).unwrap();
        let mut store = MemoryStore::provision(schemas(), "Lab", "en");
        let result = ImportService::new(options())
            .import_from_dir(&mut store, dir.path())
            .unwrap();
        assert_eq!(result.total_imported(), 2);
    }

    #[test]
    fn test_reimport_updates_in_place() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::provision(schemas(), "Lab", "en");
        let service = ImportService::new(options());
        service.import_workbook(&mut store, &workbook(), dir.path()).unwrap();
        let again = service.import_workbook(&mut store, &workbook(), dir.path()).unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.updated, 2);
        assert_eq!(again.finalize.retried, 0);
        assert_eq!(store.count_of_type("SampleType"), 1);
    }

    #[test]
    fn test_rows_without_id_skipped() {
        let dir = TempDir::new().unwrap();
        let mut workbook = workbook();
        if let Some(points) = workbook.sheet_mut("SamplePoint") {
            points.append_row(vec!["/bika_setup/bika_samplepoints".into(), "x3".into()]);
        }
        let mut store = MemoryStore::provision(schemas(), "Lab", "en");
        let result = ImportService::new(options())
            .import_workbook(&mut store, &workbook, dir.path())
            .unwrap();
        assert_eq!(result.skipped_rows, 1);
        assert_eq!(
            result
                .diagnostics
                .iter()
                .filter(|d| d.kind == DiagnosticKind::MissingId)
                .count(),
            1
        );
    }
}
