//! Record and record-list encodings.
//!
//! Mappings go to a `<type>_values` side-sheet, one row per mapping. The
//! header is `id`, `field`, the sorted union of every key seen so far, then
//! enrichment label columns. A key first seen after rows exist is inserted in
//! its sorted position and older rows get an empty cell there.

use super::scalar::{record_cell, record_value};
use super::{Decoded, Encoded, ExportContext, FIELD_COLUMN, HookTable, ID_COLUMN, ImportContext};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::models::{FieldDescriptor, FieldKind, FieldValue, ObjectRecord, ObjectRef, Record};
use crate::resolve::PendingRelink;
use crate::workbook::{CellValue, Sheet, SheetKey};
use crate::{Error, Result};

const RESERVED_KEYS: [&str; 2] = [ID_COLUMN, FIELD_COLUMN];

struct PreparedRow {
    cells: Vec<(String, CellValue)>,
    labels: Vec<(String, CellValue)>,
}

pub(super) fn encode(
    hooks: &HookTable,
    ctx: &mut ExportContext<'_>,
    record: &ObjectRecord,
    field: &FieldDescriptor,
    value: &FieldValue,
) -> Result<Encoded> {
    let mappings: Vec<&Record> = match value {
        FieldValue::Record(mapping) => vec![mapping],
        FieldValue::Records(mappings) => mappings.iter().collect(),
        _ => Vec::new(),
    };

    let mut prepared = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        let mut cells = Vec::new();
        for (key, value) in mapping {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if hooks.is_label_column(key) {
                ctx.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnsupportedFieldShape,
                        format!("record key '{key}' collides with an enrichment label column"),
                    )
                    .with_object(&record.id)
                    .with_field(&field.name),
                );
                continue;
            }
            match record_cell(value) {
                Some(cell) if cell.is_empty() => {},
                Some(cell) => cells.push((key.clone(), cell)),
                None => ctx.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnsupportedFieldShape,
                        format!("record key '{key}' holds a {} value", value.shape()),
                    )
                    .with_object(&record.id)
                    .with_field(&field.name),
                ),
            }
        }
        if cells.is_empty() {
            continue;
        }

        let labels = hooks
            .for_field(&field.name)
            .map(|hook| {
                let label = mapping
                    .get(&hook.source_key)
                    .and_then(FieldValue::as_str)
                    .and_then(|uid| ctx.store.lookup_uid(uid))
                    .map_or(CellValue::Empty, |target| CellValue::Text(target.id));
                (hook.label_column.clone(), label)
            })
            .collect();
        prepared.push(PreparedRow { cells, labels });
    }

    if prepared.is_empty() {
        return Ok(Encoded::Cell(CellValue::Empty));
    }

    let key = SheetKey::records(field.records_sheet_key());
    let sheet = ctx
        .workbook
        .ensure_sheet(&key, &[ID_COLUMN, FIELD_COLUMN], ctx.diagnostics);
    for row in prepared {
        for (key, _) in &row.cells {
            insert_key_column(sheet, key, hooks);
        }
        for (label, _) in &row.labels {
            sheet.ensure_column(label);
        }
        let owner = [
            (ID_COLUMN, CellValue::text(&record.id)),
            (FIELD_COLUMN, CellValue::text(&field.name)),
        ];
        sheet.append_keyed(
            owner.into_iter().chain(
                row.cells
                    .iter()
                    .chain(&row.labels)
                    .map(|(column, cell)| (column.as_str(), cell.clone())),
            ),
        );
    }
    Ok(Encoded::SideSheet(sheet.name.clone()))
}

/// Inserts a key column in sorted position, before any label column.
fn insert_key_column(sheet: &mut Sheet, key: &str, hooks: &HookTable) {
    if sheet.column_index(key).is_some() {
        return;
    }
    let position = sheet
        .columns
        .iter()
        .enumerate()
        .skip(RESERVED_KEYS.len())
        .find(|(_, column)| hooks.is_label_column(column) || column.as_str() > key)
        .map_or(sheet.columns.len(), |(i, _)| i);
    sheet.insert_column(position, key);
}

pub(super) fn decode(
    hooks: &HookTable,
    ctx: &mut ImportContext<'_>,
    owner: &ObjectRef,
    cell: &CellValue,
    field: &FieldDescriptor,
) -> Result<Decoded> {
    if cell.is_empty() {
        return Ok(Decoded::Value(FieldValue::Empty));
    }

    let workbook = ctx.workbook;
    let named = cell.to_text();
    let sheet = workbook
        .sheet(&named)
        .or_else(|| workbook.resolve(&SheetKey::records(field.records_sheet_key())))
        .ok_or_else(|| Error::SideSheetMissing {
            object_id: owner.id.clone(),
            field: field.name.clone(),
            sheet: named.clone(),
        })?;

    let mut mappings = Vec::new();
    let owned = sheet
        .rows()
        .filter(|row| row.text(ID_COLUMN) == owner.id && row.text(FIELD_COLUMN) == field.name);
    for row in owned {
        let mut mapping = Record::new();
        for (column, value) in row.cells() {
            if RESERVED_KEYS.contains(&column) || hooks.is_label_column(column) || value.is_empty()
            {
                continue;
            }
            mapping.insert(column.to_string(), record_value(value));
        }

        for hook in hooks.for_field(&field.name) {
            let label = row.text(&hook.label_column);
            if label.is_empty() {
                continue;
            }
            match ctx
                .resolver
                .resolve(&*ctx.store, &hook.target_types, &label)
            {
                Some(target) => {
                    mapping.insert(hook.source_key.clone(), FieldValue::Str(target.uid));
                },
                None => ctx.resolver.defer_relink(PendingRelink {
                    owner: owner.clone(),
                    field: field.clone(),
                    index: mappings.len(),
                    hook: hook.clone(),
                    label,
                    sheet: sheet.name.clone(),
                }),
            }
        }
        mappings.push(mapping);
    }

    let value = match field.kind {
        FieldKind::Record => mappings
            .into_iter()
            .next()
            .map_or(FieldValue::Empty, FieldValue::Record),
        _ if mappings.is_empty() => FieldValue::Empty,
        _ => FieldValue::Records(mappings),
    };
    Ok(Decoded::Value(value))
}
