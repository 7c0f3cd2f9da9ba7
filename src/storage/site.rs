//! Site file persistence.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, Write};
use std::path::Path;
use tracing::debug;

use crate::models::{ObjectRecord, TypeSchema};
use crate::{Error, Result};

/// Site-level settings recorded at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    /// Site title.
    pub title: String,
    /// Default language code.
    pub language: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: "Laboratory".to_string(),
            language: "en".to_string(),
        }
    }
}

/// On-disk form of a site: its settings, type registry and objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteFile {
    /// Site settings.
    #[serde(default)]
    pub site: SiteInfo,
    /// Registered types.
    #[serde(default)]
    pub types: Vec<TypeSchema>,
    /// Objects in enumeration order.
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

impl SiteFile {
    /// Reads a site file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| Error::operation("open_site_file", e))?;
        let site: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::InvalidInput(format!("malformed site file {}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            types = site.types.len(),
            objects = site.objects.len(),
            "Loaded site file"
        );
        Ok(site)
    }

    /// Reads only the type registry from a schema or site file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_schema(path: &Path) -> Result<Vec<TypeSchema>> {
        Ok(Self::load(path)?.types)
    }

    /// Writes the site file atomically (temp file in the same directory, then rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| Error::operation("create_site_dir", e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::operation("create_site_temp", e))?;
        serde_json::to_writer_pretty(&mut tmp, self)
            .map_err(|e| Error::operation("serialize_site", e))?;
        tmp.flush()
            .map_err(|e| Error::operation("flush_site", e))?;
        tmp.persist(path)
            .map_err(|e| Error::operation("persist_site", e.error))?;

        debug!(path = %path.display(), objects = self.objects.len(), "Saved site file");
        Ok(())
    }
}
