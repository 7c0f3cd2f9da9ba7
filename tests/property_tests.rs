//! Property-based tests for the field codec and sheet naming.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Scalar fields decode to the value they were encoded from
//! - Sheet names stay within the limit and never collide
//! - Object paths split back into their container
//! - Record equivalence ignores blank keys

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::collections::HashSet;

use labsheet::codec::{Decoded, ExportContext, FieldCodec, ImportContext};
use labsheet::diagnostics::Diagnostics;
use labsheet::io::AttachmentSideband;
use labsheet::models::{
    FieldDescriptor, FieldKind, FieldValue, ObjectRecord, Record, TypeSchema, join_path,
    parent_path, records_equivalent,
};
use labsheet::resolve::ReferenceResolver;
use labsheet::storage::MemoryStore;
use labsheet::workbook::{DEFAULT_SHEET_NAME_LIMIT, SheetKey, SheetNamer, Workbook};
use proptest::prelude::*;
use tempfile::TempDir;

/// Encodes `value` into a workbook cell and decodes it again.
fn transcode(kind: FieldKind, value: FieldValue) -> (FieldValue, usize) {
    let field = FieldDescriptor::new("Value", kind);
    let dir = TempDir::new().unwrap();
    let mut store = MemoryStore::provision(
        vec![TypeSchema::new("Thing").with_field(field.clone())],
        "Lab",
        "en",
    );
    let record = ObjectRecord::new("Thing", "t1", "u-t1", "/things").with_field("Value", value);
    store.insert_object(record.clone()).unwrap();

    let codec = FieldCodec::default();
    let mut workbook = Workbook::new(DEFAULT_SHEET_NAME_LIMIT);
    let mut sideband = AttachmentSideband::new(dir.path());
    let mut diagnostics = Diagnostics::new();

    let cell = {
        let mut ctx = ExportContext {
            store: &store,
            workbook: &mut workbook,
            sideband: &mut sideband,
            diagnostics: &mut diagnostics,
            actor: "admin",
        };
        codec.encode(&mut ctx, &record, &field).unwrap().into_cell()
    };

    let mut resolver = ReferenceResolver::new(16);
    let mut ctx = ImportContext {
        store: &mut store,
        workbook: &workbook,
        sideband: &sideband,
        resolver: &mut resolver,
        diagnostics: &mut diagnostics,
        actor: "admin",
    };
    let decoded = match codec.decode(&mut ctx, &record.to_ref(), &cell, &field).unwrap() {
        Decoded::Value(value) => value,
        Decoded::Deferred(pending) => panic!("scalar deferred: {pending:?}"),
    };
    (decoded, diagnostics.len())
}

// ============================================================================
// Codec
// ============================================================================

proptest! {
    /// Property: integers survive, including zero and negatives.
    #[test]
    fn prop_integer_roundtrip(n in any::<i64>()) {
        let (decoded, diagnostics) = transcode(FieldKind::Integer, FieldValue::Int(n));
        prop_assert_eq!(decoded, FieldValue::Int(n));
        prop_assert_eq!(diagnostics, 0);
    }

    /// Property: finite floats survive exactly.
    #[test]
    fn prop_float_roundtrip(x in -1.0e12_f64..1.0e12_f64) {
        let (decoded, _) = transcode(FieldKind::Float, FieldValue::Float(x));
        prop_assert_eq!(decoded, FieldValue::Float(x));
    }

    /// Property: both booleans survive; `false` is never dropped as blank.
    #[test]
    fn prop_boolean_roundtrip(b in any::<bool>()) {
        let (decoded, _) = transcode(FieldKind::Boolean, FieldValue::Bool(b));
        prop_assert_eq!(decoded, FieldValue::Bool(b));
    }

    /// Property: non-empty strings survive verbatim.
    #[test]
    fn prop_string_roundtrip(s in "\\PC{1,60}") {
        let (decoded, _) = transcode(FieldKind::Text, FieldValue::Str(s.clone()));
        prop_assert_eq!(decoded, FieldValue::Str(s));
    }

    /// Property: line lists keep their order.
    #[test]
    fn prop_lines_roundtrip(lines in prop::collection::vec("[a-zA-Z0-9 .,-]{1,20}", 1..6)) {
        let (decoded, _) = transcode(FieldKind::Lines, FieldValue::Lines(lines.clone()));
        prop_assert_eq!(decoded, FieldValue::Lines(lines));
    }

    /// Property: a value of the wrong shape is rejected, never coerced.
    #[test]
    fn prop_shape_mismatch_rejected(s in "[a-z]{1,10}") {
        let field = FieldDescriptor::new("Value", FieldKind::Integer);
        let store = MemoryStore::provision(
            vec![TypeSchema::new("Thing").with_field(field.clone())],
            "Lab",
            "en",
        );
        let record = ObjectRecord::new("Thing", "t1", "u-t1", "/things").with_field("Value", s);
        let dir = TempDir::new().unwrap();
        let mut workbook = Workbook::new(DEFAULT_SHEET_NAME_LIMIT);
        let mut sideband = AttachmentSideband::new(dir.path());
        let mut diagnostics = Diagnostics::new();
        let mut ctx = ExportContext {
            store: &store,
            workbook: &mut workbook,
            sideband: &mut sideband,
            diagnostics: &mut diagnostics,
            actor: "admin",
        };
        let err = FieldCodec::default().encode(&mut ctx, &record, &field).unwrap_err();
        prop_assert!(err.is_recoverable());
    }
}

#[test]
fn test_single_empty_line_reads_back_blank() {
    let (decoded, diagnostics) = transcode(FieldKind::Lines, FieldValue::lines([""]));
    assert_eq!(decoded, FieldValue::Lines(Vec::new()));
    assert!(decoded.is_blank());
    assert_eq!(diagnostics, 0);

    let (decoded, _) = transcode(FieldKind::Lines, FieldValue::lines(["", ""]));
    assert_eq!(decoded, FieldValue::lines(["", ""]));
}

// ============================================================================
// Naming and paths
// ============================================================================

proptest! {
    /// Property: assigned names fit the limit and are unique per key.
    #[test]
    fn prop_sheet_names_unique_and_bounded(
        keys in prop::collection::hash_set("[A-Za-z]{1,50}", 1..25),
        limit in 4usize..40,
    ) {
        let mut namer = SheetNamer::new(limit);
        let mut names = HashSet::new();
        for key in &keys {
            let assignment = namer.assign(&SheetKey::object_type(key.as_str()));
            prop_assert!(assignment.name.chars().count() <= limit);
            prop_assert!(names.insert(assignment.name));
        }
        prop_assert_eq!(namer.aliases().len(), keys.len());
    }

    /// Property: assigning the same key twice returns the same name.
    #[test]
    fn prop_sheet_name_stable(key in "[A-Za-z_]{1,60}") {
        let mut namer = SheetNamer::new(DEFAULT_SHEET_NAME_LIMIT);
        let first = namer.assign(&SheetKey::records(key.as_str()));
        let second = namer.assign(&SheetKey::records(key.as_str()));
        prop_assert_eq!(first.name, second.name);
        prop_assert!(second.collided_with.is_none());
    }

    /// Property: `parent_path` undoes `join_path`.
    #[test]
    fn prop_join_then_parent(
        parent in "(/[a-z_]{1,10}){0,4}",
        id in "[A-Za-z0-9-]{1,16}",
    ) {
        let path = join_path(&parent, &id);
        prop_assert_eq!(parent_path(&path), parent.as_str());
        let suffix = format!("/{id}");
        prop_assert!(path.ends_with(&suffix));
    }

    /// Property: adding blank keys never changes record equivalence.
    #[test]
    fn prop_blank_keys_ignored(
        pairs in prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{1,8}", 0..6),
        blanks in prop::collection::vec("[A-Z]{1,8}", 0..4),
    ) {
        let base: Record = pairs
            .into_iter()
            .map(|(k, v)| (k, FieldValue::Str(v)))
            .collect();
        let mut padded = base.clone();
        for key in blanks {
            padded.insert(key, FieldValue::Str(String::new()));
        }
        prop_assert!(records_equivalent(&base, &padded));
        prop_assert!(records_equivalent(&padded, &base));
    }
}
