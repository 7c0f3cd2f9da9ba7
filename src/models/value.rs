//! Live field values.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ObjectRef;

/// One mapping of a record or record-list field.
pub type Record = BTreeMap<String, FieldValue>;

/// A live field value as held by the object store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// No value.
    #[default]
    Empty,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String or free text.
    Str(String),
    /// Timestamp.
    Date(DateTime<FixedOffset>),
    /// Ordered list of lines.
    ///
    /// A list holding only one empty line is blank: it joins to an empty
    /// cell and reads back as an empty list.
    Lines(Vec<String>),
    /// Binary attachment.
    File(Attachment),
    /// Single reference.
    Ref(ObjectRef),
    /// Ordered references.
    Refs(Vec<ObjectRef>),
    /// Single mapping.
    Record(Record),
    /// Ordered mappings.
    Records(Vec<Record>),
}

impl FieldValue {
    /// Creates a line-list value.
    #[must_use]
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines(lines.into_iter().map(Into::into).collect())
    }

    /// Returns whether the value is empty in the "falsy" sense.
    ///
    /// `false` and numeric zero are meaningful values and are never blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Str(s) => s.is_empty(),
            Self::Lines(lines) => lines.len() <= 1 && lines.iter().all(String::is_empty),
            Self::Refs(refs) => refs.is_empty(),
            Self::Record(record) => record.is_empty(),
            Self::Records(records) => records.is_empty(),
            Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Date(_)
            | Self::File(_)
            | Self::Ref(_) => false,
        }
    }

    /// Returns whether the value is numeric zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Int(n) => *n == 0,
            Self::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    /// Short name of the value's shape, for diagnostics.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Date(_) => "datetime",
            Self::Lines(_) => "lines",
            Self::File(_) => "file",
            Self::Ref(_) => "reference",
            Self::Refs(_) => "reference list",
            Self::Record(_) => "record",
            Self::Records(_) => "record list",
        }
    }

    /// Returns the string content, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(d: DateTime<FixedOffset>) -> Self {
        Self::Date(d)
    }
}

impl From<ObjectRef> for FieldValue {
    fn from(r: ObjectRef) -> Self {
        Self::Ref(r)
    }
}

impl From<Vec<ObjectRef>> for FieldValue {
    fn from(refs: Vec<ObjectRef>) -> Self {
        Self::Refs(refs)
    }
}

impl From<Attachment> for FieldValue {
    fn from(a: Attachment) -> Self {
        Self::File(a)
    }
}

impl From<Record> for FieldValue {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

impl From<Vec<Record>> for FieldValue {
    fn from(r: Vec<Record>) -> Self {
        Self::Records(r)
    }
}

/// Compares two record mappings key-by-key, treating absent and blank alike.
#[must_use]
pub fn records_equivalent(a: &Record, b: &Record) -> bool {
    let empty = FieldValue::Empty;
    a.keys().chain(b.keys()).all(|key| {
        let left = a.get(key).unwrap_or(&empty);
        let right = b.get(key).unwrap_or(&empty);
        left == right || (left.is_blank() && right.is_blank())
    })
}

/// Binary attachment content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename supplied by the uploader, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// MIME content type.
    pub content_type: String,
    /// Raw bytes.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(filename: Option<&str>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.map(str::to_string),
            content_type: content_type.into(),
            data,
        }
    }

    /// Returns the content size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.data.len()
    }
}

/// Hex encoding for attachment bytes inside JSON site files.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_vs_meaningful() {
        assert!(FieldValue::Empty.is_blank());
        assert!(FieldValue::from("").is_blank());
        assert!(FieldValue::Lines(vec![]).is_blank());
        assert!(FieldValue::lines([""]).is_blank());
        assert!(!FieldValue::lines(["", ""]).is_blank());
        assert!(!FieldValue::lines(["a"]).is_blank());
        assert!(FieldValue::Records(vec![]).is_blank());
        assert!(!FieldValue::Bool(false).is_blank());
        assert!(!FieldValue::Int(0).is_blank());
        assert!(FieldValue::Int(0).is_zero());
        assert!(FieldValue::Float(0.0).is_zero());
        assert!(!FieldValue::Int(7).is_zero());
    }

    #[test]
    fn test_records_equivalent_ignores_blank_keys() {
        let mut a = Record::new();
        a.insert("keyword".to_string(), "Ca".into());
        a.insert("min".to_string(), "".into());
        let mut b = Record::new();
        b.insert("keyword".to_string(), "Ca".into());
        assert!(records_equivalent(&a, &b));

        b.insert("max".to_string(), "10".into());
        assert!(!records_equivalent(&a, &b));
    }

    #[test]
    fn test_attachment_json_is_hex() {
        let value = FieldValue::File(Attachment::new(Some("a.txt"), "text/plain", b"hi".to_vec()));
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("\"6869\""));
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
