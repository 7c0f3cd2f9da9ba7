//! Reference encodings.

use super::{Decoded, Encoded, ExportContext, ImportContext};
use crate::models::{FieldDescriptor, FieldValue, ObjectRecord, ObjectRef};
use crate::resolve::PendingReference;
use crate::workbook::{CellValue, SOURCE_COLUMN, SheetKey, TARGET_COLUMN};
use crate::{Error, Result};

/// Appends one `(source, target)` row per target to the relationship sheet.
///
/// The sheet is created even when the list is empty, so an importer can tell
/// "no targets" from "sheet lost".
pub(super) fn encode_multi(
    ctx: &mut ExportContext<'_>,
    record: &ObjectRecord,
    field: &FieldDescriptor,
    value: &FieldValue,
) -> Result<Encoded> {
    let key = SheetKey::relationship(field.relationship_key());
    let sheet = ctx
        .workbook
        .ensure_sheet(&key, &[SOURCE_COLUMN, TARGET_COLUMN], ctx.diagnostics);
    if let FieldValue::Refs(targets) = value {
        for target in targets {
            sheet.append_row(vec![
                CellValue::text(&record.id),
                CellValue::text(&target.id),
            ]);
        }
    }
    Ok(Encoded::Relationship(sheet.name.clone()))
}

/// Resolves a single stored id, deferring it when the target is missing.
pub(super) fn decode_single(
    ctx: &mut ImportContext<'_>,
    owner: &ObjectRef,
    field: &FieldDescriptor,
    id: &str,
) -> Decoded {
    match ctx.resolver.resolve(&*ctx.store, &field.allowed_types, id) {
        Some(target) => Decoded::Value(FieldValue::Ref(target)),
        None => Decoded::Deferred(PendingReference::new(
            owner.clone(),
            field.clone(),
            vec![id.to_string()],
        )),
    }
}

/// Collects the owner's targets from the relationship sheet, in row order.
///
/// If any target is missing the whole field is deferred, so the final value
/// keeps the stored order.
pub(super) fn decode_multi(
    ctx: &mut ImportContext<'_>,
    owner: &ObjectRef,
    field: &FieldDescriptor,
) -> Result<Decoded> {
    let key = SheetKey::relationship(field.relationship_key());
    let workbook = ctx.workbook;
    let Some(sheet) = workbook.resolve(&key) else {
        return Err(Error::SideSheetMissing {
            object_id: owner.id.clone(),
            field: field.name.clone(),
            sheet: workbook.sheet_name(&key),
        });
    };

    let ids: Vec<String> = sheet
        .find_rows(SOURCE_COLUMN, &owner.id)
        .map(|row| row.text(TARGET_COLUMN))
        .filter(|id| !id.is_empty())
        .collect();

    let resolved = ctx
        .resolver
        .resolve_all(&*ctx.store, &field.allowed_types, &ids);
    if resolved.iter().all(Option::is_some) {
        Ok(Decoded::Value(FieldValue::Refs(
            resolved.into_iter().flatten().collect(),
        )))
    } else {
        Ok(Decoded::Deferred(PendingReference::new(
            owner.clone(),
            field.clone(),
            ids,
        )))
    }
}
