//! Object records and live references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::FieldValue;

/// A live handle to an object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Type name.
    pub type_name: String,
    /// Stable identifier, unique within its container.
    pub id: String,
    /// Globally unique identifier.
    pub uid: String,
    /// Hierarchical path, including the object's own id.
    pub path: String,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// An object with its field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Type name.
    pub type_name: String,
    /// Stable identifier.
    pub id: String,
    /// Globally unique identifier.
    pub uid: String,
    /// Hierarchical path, including the object's own id.
    pub path: String,
    /// Field values by field name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl ObjectRecord {
    /// Creates a record with no field values.
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        id: impl Into<String>,
        uid: impl Into<String>,
        parent: &str,
    ) -> Self {
        let id = id.into();
        Self {
            path: join_path(parent, &id),
            type_name: type_name.into(),
            id,
            uid: uid.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Sets a field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field's value, or [`FieldValue::Empty`] when unset.
    #[must_use]
    pub fn field(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&FieldValue::Empty)
    }

    /// Returns the path of the containing folder.
    #[must_use]
    pub fn parent_path(&self) -> &str {
        parent_path(&self.path)
    }

    /// Returns a live handle to this object.
    #[must_use]
    pub fn to_ref(&self) -> ObjectRef {
        ObjectRef {
            type_name: self.type_name.clone(),
            id: self.id.clone(),
            uid: self.uid.clone(),
            path: self.path.clone(),
        }
    }
}

/// Joins a container path and an id into an object path.
///
/// Paths are `/`-separated and always absolute relative to the site root.
#[must_use]
pub fn join_path(parent: &str, id: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        format!("/{id}")
    } else {
        format!("/{parent}/{id}")
    }
}

/// Returns the container part of an object path (`""` for top-level objects).
#[must_use]
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rfind('/').map_or("", |idx| &trimmed[..idx])
}
