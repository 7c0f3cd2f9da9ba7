//! Field codec registry.
//!
//! Every field kind has one deterministic encoding into the workbook and one
//! inverse decoding. The kind comes from the field descriptor, never from the
//! runtime value: a value whose shape does not match its kind is rejected as
//! [`Error::UnsupportedFieldShape`].
//!
//! | Kind | Type-sheet cell | Side-sheet |
//! |------|-----------------|------------|
//! | boolean | `True` / `False` | - |
//! | integer, float | number (`0` stays `0`) | - |
//! | string, text | verbatim text | - |
//! | datetime | RFC 2822 text | - |
//! | lines | newline-joined text | - |
//! | file | attachment filename | loose file in the scratch directory |
//! | reference (single) | target `id` | - |
//! | reference (multi) | empty | `Source`/`Target` rows under the relationship |
//! | record, records | side-sheet name | one row per mapping under `<type>_values` |

mod hooks;
mod records;
mod references;
mod scalar;

pub use hooks::{EnrichmentHook, HookTable};
pub use scalar::{
    FALSE_TEXT, TRUE_TEXT, bool_text, date_text, lines_text, parse_bool, parse_date, parse_float,
    parse_int, parse_lines,
};

use crate::diagnostics::Diagnostics;
use crate::io::AttachmentSideband;
use crate::models::{FieldDescriptor, FieldKind, FieldValue, ObjectRecord, ObjectRef};
use crate::resolve::{PendingReference, ReferenceResolver};
use crate::storage::ObjectStore;
use crate::workbook::{CellValue, Workbook};
use crate::{Error, Result};

/// Column of a record side-sheet holding the owning object id.
pub const ID_COLUMN: &str = "id";
/// Column of a record side-sheet holding the owning field name.
pub const FIELD_COLUMN: &str = "field";

/// State shared by every encode call of one export run.
pub struct ExportContext<'a> {
    /// Source store.
    pub store: &'a dyn ObjectStore,
    /// Workbook being built.
    pub workbook: &'a mut Workbook,
    /// Attachment output.
    pub sideband: &'a mut AttachmentSideband,
    /// Findings of this run.
    pub diagnostics: &'a mut Diagnostics,
    /// Acting user.
    pub actor: &'a str,
}

/// State shared by every decode call of one import run.
pub struct ImportContext<'a> {
    /// Destination store.
    pub store: &'a mut dyn ObjectStore,
    /// Workbook being read.
    pub workbook: &'a Workbook,
    /// Attachment input.
    pub sideband: &'a AttachmentSideband,
    /// Lookup cache and pending queue.
    pub resolver: &'a mut ReferenceResolver,
    /// Findings of this run.
    pub diagnostics: &'a mut Diagnostics,
    /// Acting user.
    pub actor: &'a str,
}

/// Where an encoded field ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// The value fits in the type-sheet cell.
    Cell(CellValue),
    /// Rows were appended to the named record side-sheet.
    SideSheet(String),
    /// Pairs were appended to the named relationship side-sheet.
    Relationship(String),
}

impl Encoded {
    /// Returns the type-sheet cell for this encoding.
    #[must_use]
    pub fn into_cell(self) -> CellValue {
        match self {
            Self::Cell(cell) => cell,
            Self::SideSheet(name) => CellValue::Text(name),
            Self::Relationship(_) => CellValue::Empty,
        }
    }
}

/// Result of decoding one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The live value to set.
    Value(FieldValue),
    /// A reference whose target does not exist yet.
    Deferred(PendingReference),
}

/// Dispatches encode and decode on the field kind.
#[derive(Debug, Clone, Default)]
pub struct FieldCodec {
    hooks: HookTable,
}

impl FieldCodec {
    /// Creates a codec with the given enrichment hooks.
    #[must_use]
    pub const fn new(hooks: HookTable) -> Self {
        Self { hooks }
    }

    /// Returns the enrichment hooks.
    #[must_use]
    pub const fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Encodes one field of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFieldShape`] when the value does not match
    /// the field kind, or [`Error::AttachmentIo`] when an attachment cannot be
    /// written.
    pub fn encode(
        &self,
        ctx: &mut ExportContext<'_>,
        record: &ObjectRecord,
        field: &FieldDescriptor,
    ) -> Result<Encoded> {
        let value = record.field(&field.name);
        if !accepts(field, value) {
            return Err(Error::UnsupportedFieldShape {
                object_id: record.id.clone(),
                field: field.name.clone(),
                detail: format!("{} field holds a {} value", field.kind, value.shape()),
            });
        }

        if field.is_multi_reference() {
            return references::encode_multi(ctx, record, field, value);
        }

        let cell = match value {
            FieldValue::Bool(b) => CellValue::text(bool_text(*b)),
            v if v.is_blank() => CellValue::Empty,
            FieldValue::Int(n) => CellValue::Int(*n),
            FieldValue::Float(x) => CellValue::Float(*x),
            FieldValue::Str(s) => CellValue::Text(s.clone()),
            FieldValue::Date(d) => CellValue::Text(date_text(d)),
            FieldValue::Lines(lines) => CellValue::Text(lines_text(lines)),
            FieldValue::Ref(target) => CellValue::Text(target.id.clone()),
            FieldValue::File(attachment) => ctx
                .sideband
                .write(&record.id, &field.name, attachment)?
                .map_or(CellValue::Empty, CellValue::Text),
            FieldValue::Record(_) | FieldValue::Records(_) => {
                return records::encode(&self.hooks, ctx, record, field, value);
            },
            FieldValue::Empty | FieldValue::Refs(_) => CellValue::Empty,
        };
        Ok(Encoded::Cell(cell))
    }

    /// Decodes one field of `owner` from its type-sheet cell.
    ///
    /// # Errors
    ///
    /// Returns a recoverable error when the cell cannot be read as the field
    /// kind or a side-sheet is missing, and [`Error::AttachmentIo`] when an
    /// attachment file cannot be read.
    pub fn decode(
        &self,
        ctx: &mut ImportContext<'_>,
        owner: &ObjectRef,
        cell: &CellValue,
        field: &FieldDescriptor,
    ) -> Result<Decoded> {
        let unreadable = || Error::UnsupportedFieldShape {
            object_id: owner.id.clone(),
            field: field.name.clone(),
            detail: format!("cannot read {} from '{cell}'", field.kind),
        };

        let value = match field.kind {
            FieldKind::Record | FieldKind::Records => {
                return records::decode(&self.hooks, ctx, owner, cell, field);
            },
            FieldKind::Reference if field.is_multi_reference() => {
                return references::decode_multi(ctx, owner, field);
            },
            FieldKind::Lines => FieldValue::Lines(parse_lines(cell)),
            _ if cell.is_empty() => FieldValue::Empty,
            FieldKind::Boolean => FieldValue::Bool(parse_bool(cell).ok_or_else(unreadable)?),
            FieldKind::Integer => FieldValue::Int(parse_int(cell).ok_or_else(unreadable)?),
            FieldKind::Float => FieldValue::Float(parse_float(cell).ok_or_else(unreadable)?),
            FieldKind::String | FieldKind::Text => FieldValue::Str(cell.to_text()),
            FieldKind::DateTime => FieldValue::Date(
                cell.as_text()
                    .and_then(parse_date)
                    .ok_or_else(unreadable)?,
            ),
            FieldKind::File => FieldValue::File(ctx.sideband.read(&cell.to_text())?),
            FieldKind::Reference => {
                return Ok(references::decode_single(ctx, owner, field, &cell.to_text()));
            },
        };
        Ok(Decoded::Value(value))
    }
}

/// Returns whether `value` has a shape the field kind can encode.
fn accepts(field: &FieldDescriptor, value: &FieldValue) -> bool {
    match (field.kind, value) {
        (_, FieldValue::Empty)
        | (FieldKind::String | FieldKind::Text, FieldValue::Str(_))
        | (FieldKind::Integer, FieldValue::Int(_))
        | (FieldKind::Float, FieldValue::Float(_) | FieldValue::Int(_))
        | (FieldKind::Boolean, FieldValue::Bool(_))
        | (FieldKind::DateTime, FieldValue::Date(_))
        | (FieldKind::File, FieldValue::File(_))
        | (FieldKind::Lines, FieldValue::Lines(_))
        | (FieldKind::Record, FieldValue::Record(_))
        | (FieldKind::Records, FieldValue::Records(_) | FieldValue::Record(_)) => true,
        (FieldKind::Reference, FieldValue::Ref(_)) => !field.is_multi_reference(),
        (FieldKind::Reference, FieldValue::Refs(_)) => field.is_multi_reference(),
        _ => false,
    }
}
