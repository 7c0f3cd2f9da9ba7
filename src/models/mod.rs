//! Data models for transcoded objects.
//!
//! These types describe what the host object store hands to the engine:
//! per-type field descriptors, object records and their live field values.

mod field;
mod object;
mod value;

pub use field::{FieldDescriptor, FieldKind, Multiplicity, TypeSchema};
pub use object::{ObjectRecord, ObjectRef, join_path, parent_path};
pub use value::{Attachment, FieldValue, Record, records_equivalent};
