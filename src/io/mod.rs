//! Object-level export and import.
//!
//! The codec works field by field; this module works object by object and
//! run by run.
//!
//! # Architecture
//!
//! - [`ObjectSerializer`] writes one object per type-sheet row
//! - [`ObjectDeserializer`] rebuilds objects from those rows
//! - [`AttachmentSideband`] spills binary fields to loose files
//! - [`ExportService`] / [`ImportService`] orchestrate a whole run: singletons
//!   first, then the configured types in order, then (on import) the
//!   finalization pass over deferred references
//!
//! # Examples
//!
//! ```rust,ignore
//! use labsheet::io::{ImportOptions, ImportService};
//!
//! let service = ImportService::new(ImportOptions::from(&config));
//! let result = service.import_from_archive(&mut store, Path::new("site.tar.zst"))?;
//! println!("Created {} objects", result.created);
//! ```

pub mod attachments;
pub mod deserializer;
pub mod serializer;
pub mod services;

pub use attachments::{AttachmentSideband, content_type_for, extension_for, is_safe_filename};
pub use deserializer::{DecodedRow, ObjectDeserializer, SheetSummary};
pub use serializer::ObjectSerializer;
pub use services::{ExportOptions, ExportResult, ExportService, ImportOptions, ImportResult, ImportService};
