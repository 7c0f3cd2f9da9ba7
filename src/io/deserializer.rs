//! Object deserializer.
//!
//! Reads type-sheet rows back into objects. Each row is first decoded into
//! field values and deferred references, then the object is created (or
//! updated when one already lives at the same path) and the values are set.

use std::collections::HashSet;

use tracing::{debug, instrument};

use super::serializer::{
    ID_COLUMN, PATH_COLUMN, SINGLETON_FIELD_COLUMN, SINGLETON_VALUE_COLUMN, UID_COLUMN,
};
use crate::codec::{Decoded, FieldCodec, ImportContext};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::models::{FieldDescriptor, FieldValue, ObjectRecord, ObjectRef, TypeSchema, join_path};
use crate::resolve::PendingReference;
use crate::workbook::{CellValue, Row, Sheet};
use crate::{Error, Result};

/// Field values decoded from one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRow {
    /// Values to set, in column order.
    pub values: Vec<(FieldDescriptor, FieldValue)>,
    /// References whose targets do not exist yet.
    pub deferred: Vec<PendingReference>,
}

/// Counts for one imported type sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetSummary {
    /// Objects created.
    pub created: usize,
    /// Existing objects updated in place.
    pub updated: usize,
    /// Rows skipped (no id).
    pub skipped: usize,
}

/// Rebuilds objects from type and singleton sheets.
#[derive(Debug, Clone)]
pub struct ObjectDeserializer<'a> {
    codec: &'a FieldCodec,
    ignored: HashSet<&'a str>,
}

impl<'a> ObjectDeserializer<'a> {
    /// Creates a deserializer that skips the named fields.
    #[must_use]
    pub fn new(codec: &'a FieldCodec, ignore_fields: &'a [String]) -> Self {
        Self {
            codec,
            ignored: ignore_fields.iter().map(String::as_str).collect(),
        }
    }

    /// Imports every row of a type sheet, in sheet order.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal failures: an object that cannot be created
    /// or an attachment that cannot be read.
    #[instrument(skip_all, fields(type_name = %schema.name, sheet = %sheet.name, rows = sheet.len()))]
    pub fn deserialize_type(
        &self,
        ctx: &mut ImportContext<'_>,
        schema: &TypeSchema,
        sheet: &Sheet,
    ) -> Result<SheetSummary> {
        let mut summary = SheetSummary::default();
        for row in sheet.rows() {
            let id = row.text(ID_COLUMN);
            if id.is_empty() {
                ctx.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::MissingId, "row has no id; skipped")
                        .with_sheet(&sheet.name),
                );
                summary.skipped += 1;
                continue;
            }

            let parent = row.text(PATH_COLUMN);
            let path = join_path(&parent, &id);
            let existing = ctx
                .store
                .object_at_path(&path)
                .filter(|object| object.type_name == schema.name)
                .map(ObjectRecord::to_ref);
            let owner = if let Some(existing) = existing {
                summary.updated += 1;
                existing
            } else {
                summary.created += 1;
                ctx.store.create_object(&schema.name, &parent, &id)?
            };
            debug!(
                object = %owner,
                source_uid = %row.text(UID_COLUMN),
                "Importing row"
            );

            let columns = row
                .cells()
                .filter(|(column, _)| ![PATH_COLUMN, UID_COLUMN, ID_COLUMN].contains(column));
            let decoded = self.decode_row(ctx, &owner, schema, columns, &sheet.name)?;
            self.apply(ctx, &owner, decoded, &sheet.name)?;
        }
        Ok(summary)
    }

    /// Imports a singleton sheet onto an existing object.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal failures such as attachment I/O.
    #[instrument(skip_all, fields(object = %owner, sheet = %sheet.name))]
    pub fn deserialize_singleton(
        &self,
        ctx: &mut ImportContext<'_>,
        owner: &ObjectRef,
        schema: &TypeSchema,
        sheet: &Sheet,
    ) -> Result<usize> {
        let pairs: Vec<(String, &CellValue)> = sheet
            .rows()
            .map(|row: Row<'_>| (row.text(SINGLETON_FIELD_COLUMN), row.get(SINGLETON_VALUE_COLUMN)))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        let count = pairs.len();
        let columns = pairs.iter().map(|(name, cell)| (name.as_str(), *cell));
        let decoded = self.decode_row(ctx, owner, schema, columns, &sheet.name)?;
        self.apply(ctx, owner, decoded, &sheet.name)?;
        Ok(count)
    }

    /// Decodes `(column, cell)` pairs into field values.
    ///
    /// Unknown columns are reported as schema mismatches, ignored and
    /// computed fields are skipped, and recoverable decode failures become
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal failures such as attachment I/O.
    pub fn decode_row<'c, I>(
        &self,
        ctx: &mut ImportContext<'_>,
        owner: &ObjectRef,
        schema: &TypeSchema,
        columns: I,
        sheet_name: &str,
    ) -> Result<DecodedRow>
    where
        I: IntoIterator<Item = (&'c str, &'c CellValue)>,
    {
        let mut decoded = DecodedRow::default();
        for (column, cell) in columns {
            if self.ignored.contains(column) {
                continue;
            }
            let Some(field) = schema.field(column) else {
                let mismatch = Error::SchemaMismatch {
                    type_name: schema.name.clone(),
                    field: column.to_string(),
                };
                ctx.diagnostics.absorb(mismatch, &owner.id, sheet_name)?;
                continue;
            };
            if field.computed {
                continue;
            }

            match self.codec.decode(ctx, owner, cell, field) {
                Ok(Decoded::Value(value)) => decoded.values.push((field.clone(), value)),
                Ok(Decoded::Deferred(pending)) => decoded.deferred.push(pending),
                Err(err) => ctx.diagnostics.absorb(err, &owner.id, sheet_name)?,
            }
        }
        Ok(decoded)
    }

    /// Sets decoded values on `owner` and queues deferred references.
    ///
    /// A deferred field is cleared until finalization, so an updated object
    /// never keeps a target it no longer names.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects a write for a fatal reason.
    pub fn apply(
        &self,
        ctx: &mut ImportContext<'_>,
        owner: &ObjectRef,
        decoded: DecodedRow,
        sheet_name: &str,
    ) -> Result<()> {
        for (field, value) in decoded.values {
            if let Err(err) = ctx.store.set_field(owner, &field, value) {
                ctx.diagnostics.absorb(err, &owner.id, sheet_name)?;
            }
        }
        for pending in decoded.deferred {
            if let Err(err) = ctx.store.set_field(owner, &pending.field, FieldValue::Empty) {
                ctx.diagnostics.absorb(err, &owner.id, sheet_name)?;
            }
            ctx.resolver.defer(pending);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::io::AttachmentSideband;
    use crate::models::FieldKind;
    use crate::resolve::ReferenceResolver;
    use crate::storage::{MemoryStore, ObjectStore};
    use crate::workbook::Workbook;
    use tempfile::TempDir;

    fn schema() -> TypeSchema {
        TypeSchema::new("SampleType")
            .with_field(FieldDescriptor::new("title", FieldKind::String))
            .with_field(FieldDescriptor::new("RetentionDays", FieldKind::Integer))
            .with_field(FieldDescriptor::reference(
                "DefaultPoint",
                "SampleTypeDefaultPoint",
                "SamplePoint",
            ))
    }

    fn type_sheet() -> Sheet {
        let mut sheet = Sheet::new(
            "SampleType",
            ["path", "uid", "id", "title", "RetentionDays", "DefaultPoint", "Obsolete"],
        );
        sheet.append_row(vec![
            "/bika_setup/bika_sampletypes".into(),
            "old-uid".into(),
            "water".into(),
            "Water".into(),
            CellValue::Int(0),
            "P1".into(),
            "x".into(),
        ]);
        sheet.append_row(vec![
            "/bika_setup/bika_sampletypes".into(),
            "old-uid-2".into(),
            CellValue::Empty,
            "Nameless".into(),
        ]);
        sheet
    }

    #[test]
    fn test_deserialize_type() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::provision(
            vec![schema(), TypeSchema::new("SamplePoint")],
            "Lab",
            "en",
        );
        let workbook = Workbook::new(31);
        let sideband = AttachmentSideband::new(dir.path());
        let mut resolver = ReferenceResolver::default();
        let mut diagnostics = Diagnostics::new();
        let codec = FieldCodec::default();
        let deserializer = ObjectDeserializer::new(&codec, &[]);
        let sheet = type_sheet();

        let summary = {
            let mut ctx = ImportContext {
                store: &mut store,
                workbook: &workbook,
                sideband: &sideband,
                resolver: &mut resolver,
                diagnostics: &mut diagnostics,
                actor: "admin",
            };
            deserializer.deserialize_type(&mut ctx, &schema(), &sheet).unwrap()
        };

        assert_eq!(summary, SheetSummary { created: 1, updated: 0, skipped: 1 });
        assert_eq!(diagnostics.count(DiagnosticKind::MissingId), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::SchemaMismatch), 1);

        let water = store.object_at_path("/bika_setup/bika_sampletypes/water").unwrap();
        assert_ne!(water.uid, "old-uid");
        assert_eq!(water.field("title"), &FieldValue::from("Water"));
        assert_eq!(water.field("RetentionDays"), &FieldValue::Int(0));
        assert_eq!(water.field("DefaultPoint"), &FieldValue::Empty);
        assert_eq!(resolver.pending().len(), 1);
        assert_eq!(resolver.pending()[0].target_ids, vec!["P1"]);
    }

    #[test]
    fn test_existing_object_updated_in_place() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::provision(
            vec![schema(), TypeSchema::new("SamplePoint")],
            "Lab",
            "en",
        );
        let existing = store
            .create_object("SampleType", "/bika_setup/bika_sampletypes", "water")
            .unwrap();
        store.create_object("SamplePoint", "/sp", "P1").unwrap();

        let workbook = Workbook::new(31);
        let sideband = AttachmentSideband::new(dir.path());
        let mut resolver = ReferenceResolver::default();
        let mut diagnostics = Diagnostics::new();
        let codec = FieldCodec::default();
        let deserializer = ObjectDeserializer::new(&codec, &[]);
        let sheet = type_sheet();

        let summary = {
            let mut ctx = ImportContext {
                store: &mut store,
                workbook: &workbook,
                sideband: &sideband,
                resolver: &mut resolver,
                diagnostics: &mut diagnostics,
                actor: "admin",
            };
            deserializer.deserialize_type(&mut ctx, &schema(), &sheet).unwrap()
        };
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 0);

        let water = store.object_at_path(&existing.path).unwrap();
        assert_eq!(water.uid, existing.uid);
        assert!(matches!(water.field("DefaultPoint"), FieldValue::Ref(p) if p.id == "P1"));
        assert!(resolver.pending().is_empty());
    }

    #[test]
    fn test_deferred_reference_clears_previous_target() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::provision(
            vec![schema(), TypeSchema::new("SamplePoint")],
            "Lab",
            "en",
        );
        let existing = store
            .create_object("SampleType", "/bika_setup/bika_sampletypes", "water")
            .unwrap();
        let p0 = store.create_object("SamplePoint", "/sp", "P0").unwrap();
        let default_point = schema().field("DefaultPoint").unwrap().clone();
        store
            .set_field(&existing, &default_point, FieldValue::Ref(p0))
            .unwrap();

        let workbook = Workbook::new(31);
        let sideband = AttachmentSideband::new(dir.path());
        let mut resolver = ReferenceResolver::default();
        let mut diagnostics = Diagnostics::new();
        let codec = FieldCodec::default();
        let deserializer = ObjectDeserializer::new(&codec, &[]);
        {
            let mut ctx = ImportContext {
                store: &mut store,
                workbook: &workbook,
                sideband: &sideband,
                resolver: &mut resolver,
                diagnostics: &mut diagnostics,
                actor: "admin",
            };
            deserializer
                .deserialize_type(&mut ctx, &schema(), &type_sheet())
                .unwrap();
        }

        let water = store.object_at_path(&existing.path).unwrap();
        assert_eq!(water.field("DefaultPoint"), &FieldValue::Empty);
        assert_eq!(resolver.pending().len(), 1);
    }

    #[test]
    fn test_deserialize_singleton() {
        let dir = TempDir::new().unwrap();
        let lab_schema = TypeSchema::new("Laboratory")
            .with_field(FieldDescriptor::new("title", FieldKind::String))
            .with_field(FieldDescriptor::new("language", FieldKind::String));
        let mut store = MemoryStore::provision(vec![lab_schema.clone()], "Lab", "en");
        let lab = store
            .create_object("Laboratory", "/bika_setup", "laboratory")
            .unwrap();

        let mut sheet = Sheet::new("Laboratory", ["field", "value"]);
        sheet.append_row(vec!["title".into(), "Main Lab".into()]);
        sheet.append_row(vec!["language".into(), "de".into()]);

        let workbook = Workbook::new(31);
        let sideband = AttachmentSideband::new(dir.path());
        let mut resolver = ReferenceResolver::default();
        let mut diagnostics = Diagnostics::new();
        let codec = FieldCodec::default();
        let ignore = vec!["language".to_string()];
        let deserializer = ObjectDeserializer::new(&codec, &ignore);
        {
            let mut ctx = ImportContext {
                store: &mut store,
                workbook: &workbook,
                sideband: &sideband,
                resolver: &mut resolver,
                diagnostics: &mut diagnostics,
                actor: "admin",
            };
            deserializer
                .deserialize_singleton(&mut ctx, &lab, &lab_schema, &sheet)
                .unwrap();
        }

        let lab = store.object_at_path(&lab.path).unwrap();
        assert_eq!(lab.field("title"), &FieldValue::from("Main Lab"));
        assert_eq!(lab.field("language"), &FieldValue::Empty);
    }
}
