//! Non-fatal findings collected during a run.
//!
//! Anything that concerns a single field of a single object (a value of the
//! wrong shape, a reference whose target never appeared, a side-sheet that is
//! missing) is recorded here and the run continues. Each diagnostic carries
//! enough context to find the offending row without re-running.

use std::fmt;

use tracing::warn;

use crate::Error;

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A live value does not match its field kind.
    UnsupportedFieldShape,
    /// A reference target is missing after finalization.
    UnresolvedReference,
    /// A side-sheet named by a row is absent.
    SideSheetMissing,
    /// A row names a field the type does not declare.
    SchemaMismatch,
    /// Two sheet keys truncated to the same name and one was renamed.
    SheetNameCollision,
    /// A uid appeared on more than one exported object.
    DuplicateUid,
    /// An object row has no id.
    MissingId,
    /// A workbook sheet names a type the store does not know.
    UnknownType,
}

impl DiagnosticKind {
    /// Returns all diagnostic kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::UnsupportedFieldShape,
            Self::UnresolvedReference,
            Self::SideSheetMissing,
            Self::SchemaMismatch,
            Self::SheetNameCollision,
            Self::DuplicateUid,
            Self::MissingId,
            Self::UnknownType,
        ]
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFieldShape => "unsupported_field_shape",
            Self::UnresolvedReference => "unresolved_reference",
            Self::SideSheetMissing => "side_sheet_missing",
            Self::SchemaMismatch => "schema_mismatch",
            Self::SheetNameCollision => "sheet_name_collision",
            Self::DuplicateUid => "duplicate_uid",
            Self::MissingId => "missing_id",
            Self::UnknownType => "unknown_type",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single non-fatal finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category.
    pub kind: DiagnosticKind,
    /// Owning object id, when known.
    pub object_id: Option<String>,
    /// Field name, when known.
    pub field: Option<String>,
    /// Sheet the finding relates to, when known.
    pub sheet: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic with only a message.
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            object_id: None,
            field: None,
            sheet: None,
            message: message.into(),
        }
    }

    /// Sets the owning object id.
    #[must_use]
    pub fn with_object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    /// Sets the field name.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Sets the sheet name.
    #[must_use]
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Converts a recoverable error into a diagnostic.
    ///
    /// Returns `None` for fatal errors, which must be propagated instead.
    #[must_use]
    pub fn from_error(err: &Error) -> Option<Self> {
        let diagnostic = match err {
            Error::UnsupportedFieldShape {
                object_id, field, ..
            } => Self::new(DiagnosticKind::UnsupportedFieldShape, err.to_string())
                .with_object(object_id)
                .with_field(field),
            Error::UnresolvedReference {
                object_id, field, ..
            } => Self::new(DiagnosticKind::UnresolvedReference, err.to_string())
                .with_object(object_id)
                .with_field(field),
            Error::SideSheetMissing {
                object_id,
                field,
                sheet,
            } => Self::new(DiagnosticKind::SideSheetMissing, err.to_string())
                .with_object(object_id)
                .with_field(field)
                .with_sheet(sheet),
            Error::SchemaMismatch { field, .. } => {
                Self::new(DiagnosticKind::SchemaMismatch, err.to_string()).with_field(field)
            },
            _ => return None,
        };
        Some(diagnostic)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(sheet) = &self.sheet {
            write!(f, " sheet={sheet}")?;
        }
        if let Some(object_id) = &self.object_id {
            write!(f, " object={object_id}")?;
        }
        if let Some(field) = &self.field {
            write!(f, " field={field}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Records a diagnostic and emits it as a warning event.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!(
            kind = %diagnostic.kind,
            object_id = diagnostic.object_id.as_deref().unwrap_or(""),
            field = diagnostic.field.as_deref().unwrap_or(""),
            sheet = diagnostic.sheet.as_deref().unwrap_or(""),
            "{}",
            diagnostic.message
        );
        self.items.push(diagnostic);
    }

    /// Records a recoverable error, or hands a fatal one back to the caller.
    ///
    /// `object_id` and `sheet` fill in context the error itself lacks.
    pub fn absorb(&mut self, err: Error, object_id: &str, sheet: &str) -> crate::Result<()> {
        let Some(mut diagnostic) = Diagnostic::from_error(&err) else {
            return Err(err);
        };
        if diagnostic.object_id.is_none() {
            diagnostic.object_id = Some(object_id.to_string());
        }
        if diagnostic.sheet.is_none() {
            diagnostic.sheet = Some(sheet.to_string());
        }
        self.push(diagnostic);
        Ok(())
    }

    /// Returns the number of diagnostics.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether no diagnostics were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Counts diagnostics of one kind.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    /// Iterates over the diagnostics in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_recoverable() {
        let mut diagnostics = Diagnostics::new();
        let err = Error::SchemaMismatch {
            type_name: "SampleType".to_string(),
            field: "Obsolete".to_string(),
        };
        diagnostics.absorb(err, "water", "SampleType").unwrap();

        assert_eq!(diagnostics.len(), 1);
        let d = diagnostics.iter().next().unwrap();
        assert_eq!(d.kind, DiagnosticKind::SchemaMismatch);
        assert_eq!(d.object_id.as_deref(), Some("water"));
        assert_eq!(d.sheet.as_deref(), Some("SampleType"));
        assert_eq!(d.field.as_deref(), Some("Obsolete"));
    }

    #[test]
    fn test_absorb_fatal_passes_through() {
        let mut diagnostics = Diagnostics::new();
        let err = Error::AttachmentIo {
            filename: "x.pdf".to_string(),
            cause: "denied".to_string(),
        };
        assert!(diagnostics.absorb(err, "water", "SampleType").is_err());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_display_includes_context() {
        let d = Diagnostic::new(DiagnosticKind::UnresolvedReference, "missing P9")
            .with_object("water")
            .with_field("SamplePoint")
            .with_sheet("SampleType");
        assert_eq!(
            d.to_string(),
            "[unresolved_reference] sheet=SampleType object=water field=SamplePoint: missing P9"
        );
    }
}
