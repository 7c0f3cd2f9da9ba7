//! Object serializer.
//!
//! Turns objects of one type into rows of that type's sheet. Field encoding
//! is delegated to the [`FieldCodec`]; a field that cannot be encoded is
//! reported and left empty, and the rest of the row is still written.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::codec::{ExportContext, FieldCodec};
use crate::models::{FieldDescriptor, ObjectRecord, TypeSchema};
use crate::workbook::{CellValue, SheetKey};
use crate::Result;

/// Type-sheet column holding the parent path.
pub const PATH_COLUMN: &str = "path";
/// Type-sheet column holding the source uid.
pub const UID_COLUMN: &str = "uid";
/// Column (and field name) holding the object id.
pub const ID_COLUMN: &str = "id";
/// Singleton-sheet column holding the field name.
pub const SINGLETON_FIELD_COLUMN: &str = "field";
/// Singleton-sheet column holding the value.
pub const SINGLETON_VALUE_COLUMN: &str = "value";

/// Serializes objects into type and singleton sheets.
#[derive(Debug, Clone)]
pub struct ObjectSerializer<'a> {
    codec: &'a FieldCodec,
    ignored: HashSet<&'a str>,
}

impl<'a> ObjectSerializer<'a> {
    /// Creates a serializer that skips the named fields.
    #[must_use]
    pub fn new(codec: &'a FieldCodec, ignore_fields: &'a [String]) -> Self {
        Self {
            codec,
            ignored: ignore_fields.iter().map(String::as_str).collect(),
        }
    }

    /// Returns the fields of `schema` that are transcoded, in declaration order.
    ///
    /// Computed fields and ignored names are left out.
    #[must_use]
    pub fn transcoded_fields<'s>(&self, schema: &'s TypeSchema) -> Vec<&'s FieldDescriptor> {
        schema
            .fields
            .iter()
            .filter(|f| !f.computed && !self.ignored.contains(f.name.as_str()))
            .collect()
    }

    /// Builds the type-sheet header: `path`, `uid`, then field names.
    ///
    /// An `id` column follows `uid` when the type declares no `id` field.
    #[must_use]
    pub fn header(fields: &[&FieldDescriptor]) -> Vec<String> {
        let mut header = vec![PATH_COLUMN.to_string(), UID_COLUMN.to_string()];
        if !fields.iter().any(|f| f.name == ID_COLUMN) {
            header.push(ID_COLUMN.to_string());
        }
        header.extend(fields.iter().map(|f| f.name.clone()));
        header
    }

    /// Encodes one object into a row matching [`Self::header`].
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal failures such as attachment I/O.
    pub fn serialize(
        &self,
        ctx: &mut ExportContext<'_>,
        record: &ObjectRecord,
        fields: &[&FieldDescriptor],
        sheet_name: &str,
    ) -> Result<Vec<CellValue>> {
        let mut row = vec![
            CellValue::text(record.parent_path()),
            CellValue::text(&record.uid),
        ];
        if !fields.iter().any(|f| f.name == ID_COLUMN) {
            row.push(CellValue::text(&record.id));
        }
        for field in fields {
            row.push(self.encode_field(ctx, record, field, sheet_name)?);
        }
        Ok(row)
    }

    /// Writes every object of a type into its sheet.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal failures such as attachment I/O.
    #[instrument(skip_all, fields(type_name = %schema.name, objects = records.len()))]
    pub fn serialize_type(
        &self,
        ctx: &mut ExportContext<'_>,
        schema: &TypeSchema,
        records: &[&ObjectRecord],
    ) -> Result<usize> {
        let fields = self.transcoded_fields(schema);
        let header = Self::header(&fields);
        let header_refs: Vec<&str> = header.iter().map(String::as_str).collect();

        let sheet_name = ctx
            .workbook
            .ensure_sheet(&SheetKey::object_type(&schema.name), &header_refs, ctx.diagnostics)
            .name
            .clone();

        for record in records {
            let row = self.serialize(ctx, record, &fields, &sheet_name)?;
            if let Some(sheet) = ctx.workbook.sheet_mut(&sheet_name) {
                sheet.append_row(row);
            }
        }
        debug!(sheet = %sheet_name, rows = records.len(), "Wrote type sheet");
        Ok(records.len())
    }

    /// Writes a site-wide singleton as `field`/`value` rows.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal failures such as attachment I/O.
    #[instrument(skip_all, fields(sheet = %sheet_key, object = %record.path))]
    pub fn serialize_singleton(
        &self,
        ctx: &mut ExportContext<'_>,
        sheet_key: &str,
        schema: &TypeSchema,
        record: &ObjectRecord,
    ) -> Result<usize> {
        let sheet_name = ctx
            .workbook
            .ensure_sheet(
                &SheetKey::singleton(sheet_key),
                &[SINGLETON_FIELD_COLUMN, SINGLETON_VALUE_COLUMN],
                ctx.diagnostics,
            )
            .name
            .clone();

        let fields = self.transcoded_fields(schema);
        for field in &fields {
            let cell = self.encode_field(ctx, record, field, &sheet_name)?;
            if let Some(sheet) = ctx.workbook.sheet_mut(&sheet_name) {
                sheet.append_row(vec![CellValue::text(&field.name), cell]);
            }
        }
        Ok(fields.len())
    }

    fn encode_field(
        &self,
        ctx: &mut ExportContext<'_>,
        record: &ObjectRecord,
        field: &FieldDescriptor,
        sheet_name: &str,
    ) -> Result<CellValue> {
        if field.name == ID_COLUMN {
            return Ok(CellValue::text(&record.id));
        }
        match self.codec.encode(ctx, record, field) {
            Ok(encoded) => Ok(encoded.into_cell()),
            Err(err) => {
                ctx.diagnostics.absorb(err, &record.id, sheet_name)?;
                Ok(CellValue::Empty)
            },
        }
    }
}
