//! Object store abstraction.
//!
//! The engine never owns object lifecycles. It talks to the host through
//! [`ObjectStore`]: the type registry (field descriptors), the catalog
//! (lookup by type and id, or by uid) and field setters. [`MemoryStore`] is
//! the bundled implementation, persisted as a JSON site file.

mod memory;
mod site;

pub use memory::MemoryStore;
pub use site::{SiteFile, SiteInfo};

use crate::Result;
use crate::models::{FieldDescriptor, FieldValue, ObjectRecord, ObjectRef, TypeSchema};

/// Host object store and type registry.
pub trait ObjectStore {
    /// Returns the schema of a type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the type is not registered.
    fn field_descriptors(&self, type_name: &str) -> Result<TypeSchema>;

    /// Returns whether a type is registered.
    fn has_type(&self, type_name: &str) -> bool;

    /// Returns all registered type names.
    fn type_names(&self) -> Vec<String>;

    /// Returns the objects of a type in enumeration order.
    fn objects_of_type(&self, type_name: &str) -> Vec<&ObjectRecord>;

    /// Returns the object at a path.
    fn object_at_path(&self, path: &str) -> Option<&ObjectRecord>;

    /// Creates an empty object under `parent` and assigns it a fresh uid.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the path is occupied.
    fn create_object(&mut self, type_name: &str, parent: &str, id: &str) -> Result<ObjectRef>;

    /// Finds an object by type and id.
    fn catalog_lookup(&self, type_name: &str, id: &str) -> Option<ObjectRef>;

    /// Finds an object by uid.
    fn lookup_uid(&self, uid: &str) -> Option<ObjectRef>;

    /// Sets one field of an object.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SchemaMismatch`] if the type has no such field,
    /// or [`crate::Error::NotFound`] if the object does not exist.
    fn set_field(&mut self, object: &ObjectRef, field: &FieldDescriptor, value: FieldValue)
    -> Result<()>;

    /// Returns the number of objects of a type.
    fn count_of_type(&self, type_name: &str) -> usize {
        self.objects_of_type(type_name).len()
    }
}
