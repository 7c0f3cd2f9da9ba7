//! Import and export service implementations.
//!
//! Orchestrates the serializer, the deserializer, the archive and the
//! reference resolver over one run.

pub mod export;
pub mod import;

pub use export::{ExportOptions, ExportResult, ExportService};
pub use import::{ImportOptions, ImportResult, ImportService};
