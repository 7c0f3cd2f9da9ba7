//! # Labsheet
//!
//! Schema-driven export and import of laboratory setup data.
//!
//! Labsheet flattens a graph of typed, schema-described objects into a tabular
//! workbook (one sheet per object type plus side-sheets for record collections
//! and relationships), packs it with any binary attachments into a compressed
//! archive, and reconstructs the object graph from that archive on another site.
//!
//! ## Pipeline
//!
//! - [`codec::FieldCodec`] decides, per field kind, how a live value becomes
//!   cells and how cells become a live value again
//! - [`io::ObjectSerializer`] / [`io::ObjectDeserializer`] drive the codec over
//!   whole objects
//! - [`resolve::ReferenceResolver`] links references back to live objects,
//!   deferring the ones whose target has not been created yet
//! - [`archive`] packs the workbook and attachment files into a `.tar.zst` bundle
//!
//! ## Example
//!
//! ```rust,ignore
//! use labsheet::config::LabsheetConfig;
//! use labsheet::io::{ExportOptions, ExportService};
//! use labsheet::storage::MemoryStore;
//!
//! let store = MemoryStore::load(Path::new("site.json"))?;
//! let service = ExportService::new(ExportOptions::from(&LabsheetConfig::default()));
//! let result = service.export_to_archive(&store, Path::new("site.tar.zst"))?;
//! println!("Exported {} objects", result.objects_exported);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod archive;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod io;
pub mod models;
pub mod observability;
pub mod resolve;
pub mod storage;
pub mod workbook;

// Re-exports for convenience
pub use config::LabsheetConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use models::{FieldDescriptor, FieldKind, FieldValue, ObjectRecord, ObjectRef, TypeSchema};
pub use storage::{MemoryStore, ObjectStore};
pub use workbook::{CellValue, Sheet, Workbook};

/// Error type for labsheet operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Fatal |
/// |---------|-------------|-------|
/// | `InvalidInput` | Bad CLI arguments, malformed workbook or schema files | yes |
/// | `OperationFailed` | Filesystem, serialization or store failures | yes |
/// | `NotFound` | Unknown type, missing site or object | yes |
/// | `UnsupportedFieldShape` | A live value does not match its field kind | no |
/// | `UnresolvedReference` | A reference target is missing after finalization | no |
/// | `SideSheetMissing` | A side-sheet named by a row is absent | no |
/// | `SchemaMismatch` | A row names a field the type no longer declares | no |
/// | `AttachmentIo` | An attachment cannot be written or read | yes |
/// | `Archive` | The transfer archive is corrupt or unreadable | yes |
///
/// Non-fatal variants are turned into [`Diagnostic`]s by the services and the
/// run continues; see [`Error::is_recoverable`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A required entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A field's live value does not fit any codec for its kind.
    #[error("unsupported value for {object_id}.{field}: {detail}")]
    UnsupportedFieldShape {
        /// Owning object id.
        object_id: String,
        /// Field name.
        field: String,
        /// What was wrong with the value.
        detail: String,
    },

    /// A reference target could not be found in the catalog.
    #[error("unresolved reference {object_id}.{field} -> {target_id}")]
    UnresolvedReference {
        /// Owning object id.
        object_id: String,
        /// Field name.
        field: String,
        /// The identifier that could not be resolved.
        target_id: String,
    },

    /// An expected side-sheet is absent from the workbook.
    #[error("side-sheet '{sheet}' missing for {object_id}.{field}")]
    SideSheetMissing {
        /// Owning object id.
        object_id: String,
        /// Field name.
        field: String,
        /// Name of the missing sheet.
        sheet: String,
    },

    /// A field named in the workbook does not exist on the current type.
    #[error("type '{type_name}' has no field '{field}'")]
    SchemaMismatch {
        /// Type name.
        type_name: String,
        /// Field name.
        field: String,
    },

    /// An attachment file could not be written or read.
    #[error("attachment '{filename}': {cause}")]
    AttachmentIo {
        /// Attachment filename inside the scratch directory.
        filename: String,
        /// The underlying cause.
        cause: String,
    },

    /// The transfer archive is malformed.
    #[error("archive error: {0}")]
    Archive(String),
}

impl Error {
    /// Returns whether the run may continue after this error.
    ///
    /// Recoverable errors concern a single field of a single object and are
    /// reported as diagnostics. Everything else aborts the run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFieldShape { .. }
                | Self::UnresolvedReference { .. }
                | Self::SideSheetMissing { .. }
                | Self::SchemaMismatch { .. }
        )
    }

    /// Shorthand for [`Error::OperationFailed`].
    pub fn operation(operation: &str, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for labsheet operations.
pub type Result<T> = std::result::Result<T, Error>;
