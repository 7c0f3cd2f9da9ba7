//! In-memory object store backed by a site file.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};
use uuid::Uuid;

use super::{ObjectStore, SiteFile, SiteInfo};
use crate::models::{FieldDescriptor, FieldValue, ObjectRecord, ObjectRef, TypeSchema};
use crate::{Error, Result};

/// An object store held fully in memory.
///
/// Objects keep their insertion order, which is the enumeration order seen
/// by exports.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    info: SiteInfo,
    types: Vec<TypeSchema>,
    objects: Vec<ObjectRecord>,
    by_path: HashMap<String, usize>,
    by_uid: HashMap<String, usize>,
    by_type_id: HashMap<(String, String), usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(info: SiteInfo) -> Self {
        Self {
            info,
            ..Self::default()
        }
    }

    /// Creates a fresh site with the given types and settings.
    #[must_use]
    pub fn provision(types: Vec<TypeSchema>, title: &str, language: &str) -> Self {
        info!(title, language, types = types.len(), "Provisioning site");
        let mut store = Self::new(SiteInfo {
            title: title.to_string(),
            language: language.to_string(),
        });
        for schema in types {
            store.define_type(schema);
        }
        store
    }

    /// Builds a store from a site file.
    ///
    /// # Errors
    ///
    /// Returns an error if an object names an unknown type or two objects
    /// share a path.
    pub fn from_site_file(site: SiteFile) -> Result<Self> {
        let mut store = Self::new(site.site);
        for schema in site.types {
            store.define_type(schema);
        }
        for object in site.objects {
            store.insert_object(object)?;
        }
        Ok(store)
    }

    /// Loads a store from a site file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is inconsistent.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_site_file(SiteFile::load(path)?)
    }

    /// Converts the store back into its on-disk form.
    #[must_use]
    pub fn to_site_file(&self) -> SiteFile {
        SiteFile {
            site: self.info.clone(),
            types: self.types.clone(),
            objects: self.objects.clone(),
        }
    }

    /// Persists the store to a site file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_site_file().save(path)
    }

    /// Returns the site settings.
    #[must_use]
    pub const fn info(&self) -> &SiteInfo {
        &self.info
    }

    /// Registers a type, replacing any earlier schema of the same name.
    pub fn define_type(&mut self, schema: TypeSchema) {
        if let Some(existing) = self.types.iter_mut().find(|t| t.name == schema.name) {
            *existing = schema;
        } else {
            self.types.push(schema);
        }
    }

    /// Inserts a fully formed object.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the path is occupied.
    pub fn insert_object(&mut self, object: ObjectRecord) -> Result<()> {
        if !self.has_type(&object.type_name) {
            return Err(Error::NotFound(format!("type '{}'", object.type_name)));
        }
        if self.by_path.contains_key(&object.path) {
            return Err(Error::InvalidInput(format!(
                "path already occupied: {}",
                object.path
            )));
        }

        let idx = self.objects.len();
        self.by_path.insert(object.path.clone(), idx);
        self.by_uid.entry(object.uid.clone()).or_insert(idx);
        self.by_type_id
            .entry((object.type_name.clone(), object.id.clone()))
            .or_insert(idx);
        self.objects.push(object);
        Ok(())
    }

    /// Iterates over all objects in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.iter()
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn schema(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.iter().find(|t| t.name == type_name)
    }
}

impl ObjectStore for MemoryStore {
    fn field_descriptors(&self, type_name: &str) -> Result<TypeSchema> {
        self.schema(type_name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("type '{type_name}'")))
    }

    fn has_type(&self, type_name: &str) -> bool {
        self.schema(type_name).is_some()
    }

    fn type_names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    fn objects_of_type(&self, type_name: &str) -> Vec<&ObjectRecord> {
        self.objects
            .iter()
            .filter(|o| o.type_name == type_name)
            .collect()
    }

    fn object_at_path(&self, path: &str) -> Option<&ObjectRecord> {
        self.by_path.get(path).map(|&i| &self.objects[i])
    }

    fn create_object(&mut self, type_name: &str, parent: &str, id: &str) -> Result<ObjectRef> {
        if id.is_empty() {
            return Err(Error::InvalidInput(format!(
                "cannot create {type_name} without an id"
            )));
        }
        let uid = Uuid::new_v4().simple().to_string();
        let object = ObjectRecord::new(type_name, id, uid, parent);
        let reference = object.to_ref();
        self.insert_object(object)?;
        debug!(type_name, id, path = %reference.path, "Created object");
        Ok(reference)
    }

    fn catalog_lookup(&self, type_name: &str, id: &str) -> Option<ObjectRef> {
        self.by_type_id
            .get(&(type_name.to_string(), id.to_string()))
            .map(|&i| self.objects[i].to_ref())
    }

    fn lookup_uid(&self, uid: &str) -> Option<ObjectRef> {
        self.by_uid.get(uid).map(|&i| self.objects[i].to_ref())
    }

    fn set_field(
        &mut self,
        object: &ObjectRef,
        field: &FieldDescriptor,
        value: FieldValue,
    ) -> Result<()> {
        let known = self
            .schema(&object.type_name)
            .is_some_and(|s| s.field(&field.name).is_some());
        if !known {
            return Err(Error::SchemaMismatch {
                type_name: object.type_name.clone(),
                field: field.name.clone(),
            });
        }

        let idx = *self
            .by_path
            .get(&object.path)
            .ok_or_else(|| Error::NotFound(format!("object at {}", object.path)))?;
        let record = &mut self.objects[idx];
        if matches!(value, FieldValue::Empty) {
            record.fields.remove(&field.name);
        } else {
            record.fields.insert(field.name.clone(), value);
        }
        Ok(())
    }
}
