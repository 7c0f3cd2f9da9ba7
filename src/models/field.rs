//! Field descriptors and type schemas.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The closed set of field kinds the codec knows how to transcode.
///
/// A descriptor's kind is resolved once; codecs never re-inspect the
/// runtime value to decide how a field is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Short string.
    String,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean flag.
    Boolean,
    /// Timestamp with offset.
    DateTime,
    /// Free text (may contain newlines).
    Text,
    /// Binary attachment.
    File,
    /// Reference to one or more other objects.
    Reference,
    /// Ordered list of strings.
    Lines,
    /// A single mapping of named values.
    Record,
    /// An ordered list of mappings.
    Records,
}

impl FieldKind {
    /// Returns all field kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::String,
            Self::Integer,
            Self::Float,
            Self::Boolean,
            Self::DateTime,
            Self::Text,
            Self::File,
            Self::Reference,
            Self::Lines,
            Self::Record,
            Self::Records,
        ]
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Text => "text",
            Self::File => "file",
            Self::Reference => "reference",
            Self::Lines => "lines",
            Self::Record => "record",
            Self::Records => "records",
        }
    }

    /// Returns whether values of this kind live in a record side-sheet.
    #[must_use]
    pub const fn is_record(&self) -> bool {
        matches!(self, Self::Record | Self::Records)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "float" | "fixedpoint" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "datetime" | "date" => Ok(Self::DateTime),
            "text" => Ok(Self::Text),
            "file" | "blob" | "image" => Ok(Self::File),
            "reference" | "ref" => Ok(Self::Reference),
            "lines" => Ok(Self::Lines),
            "record" => Ok(Self::Record),
            "records" => Ok(Self::Records),
            _ => Err(Error::InvalidInput(format!("unknown field kind: {s}"))),
        }
    }
}

/// Whether a reference field holds one target or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    /// At most one target.
    #[default]
    Single,
    /// An ordered list of targets.
    Multi,
}

/// Static metadata describing one attribute of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique within its type.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Declared field type name (e.g. `records`, `addressfield`).
    ///
    /// Names the `<type>_values` side-sheet for record kinds. Defaults to the
    /// kind name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Relationship identity for reference fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    /// Types a reference may point to, in lookup order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_types: Vec<String>,
    /// Reference multiplicity.
    #[serde(default)]
    pub multiplicity: Multiplicity,
    /// Computed or proxied fields are never transcoded.
    #[serde(default)]
    pub computed: bool,
}

impl FieldDescriptor {
    /// Creates a descriptor with the given name and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: None,
            relationship: None,
            allowed_types: Vec::new(),
            multiplicity: Multiplicity::Single,
            computed: false,
        }
    }

    /// Creates a single-valued reference descriptor.
    #[must_use]
    pub fn reference(
        name: impl Into<String>,
        relationship: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        let mut field = Self::new(name, FieldKind::Reference);
        field.relationship = Some(relationship.into());
        field.allowed_types = vec![target_type.into()];
        field
    }

    /// Marks the descriptor as multi-valued.
    #[must_use]
    pub const fn multi(mut self) -> Self {
        self.multiplicity = Multiplicity::Multi;
        self
    }

    /// Sets the declared field type name.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Adds an allowed target type.
    #[must_use]
    pub fn with_allowed_type(mut self, target_type: impl Into<String>) -> Self {
        self.allowed_types.push(target_type.into());
        self
    }

    /// Marks the descriptor as computed.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Returns whether this is a multi-valued reference.
    #[must_use]
    pub fn is_multi_reference(&self) -> bool {
        self.kind == FieldKind::Reference && self.multiplicity == Multiplicity::Multi
    }

    /// Returns the declared type name, falling back to the kind name.
    #[must_use]
    pub fn declared_type(&self) -> &str {
        self.type_name.as_deref().unwrap_or_else(|| self.kind.as_str())
    }

    /// Full (untruncated) name of this field's record side-sheet.
    #[must_use]
    pub fn records_sheet_key(&self) -> String {
        format!("{}_values", self.declared_type())
    }

    /// Full (untruncated) name of this field's relationship side-sheet.
    #[must_use]
    pub fn relationship_key(&self) -> &str {
        self.relationship.as_deref().unwrap_or(&self.name)
    }
}

/// Ordered field descriptors of one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Type name.
    pub name: String,
    /// Field descriptors in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl TypeSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field descriptor.
    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in FieldKind::all() {
            assert_eq!(kind.as_str().parse::<FieldKind>().unwrap(), *kind);
        }
        assert_eq!("FixedPoint".parse::<FieldKind>().unwrap(), FieldKind::Float);
        assert!("widget".parse::<FieldKind>().is_err());
    }

    #[test]
    fn test_sheet_keys() {
        let records = FieldDescriptor::new("ResultsRange", FieldKind::Records)
            .with_type_name("analysisspecresults");
        assert_eq!(records.records_sheet_key(), "analysisspecresults_values");

        let plain = FieldDescriptor::new("Address", FieldKind::Record);
        assert_eq!(plain.records_sheet_key(), "record_values");

        let points =
            FieldDescriptor::reference("SamplePoints", "SampleTypeSamplePoint", "SamplePoint")
                .multi();
        assert!(points.is_multi_reference());
        assert_eq!(points.relationship_key(), "SampleTypeSamplePoint");
    }

    #[test]
    fn test_descriptor_json_defaults() {
        let json = r#"{"name": "Title", "kind": "string"}"#;
        let field: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(field, FieldDescriptor::new("Title", FieldKind::String));
        assert!(!field.computed);
    }
}
