//! Archive reader.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path};

use tar::Archive;
use tracing::{debug, instrument};

use super::{ARCHIVE_FORMAT_VERSION, ArchiveManifest, MANIFEST_FILE, sha256_hex};
use crate::{Error, Result};

/// One entry of an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
}

/// Reads and verifies `.tar.zst` transfer archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleReader;

impl BundleReader {
    /// Reads and validates the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is unreadable, has no manifest, or was
    /// written with an unsupported format version.
    pub fn read_manifest(path: &Path) -> Result<ArchiveManifest> {
        let files = Self::extract_all(path)?;
        parse_manifest(&files)
    }

    /// Lists the archive entries in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is unreadable.
    pub fn list(path: &Path) -> Result<Vec<ArchiveEntry>> {
        let mut archive = open(path)?;
        let mut listing = Vec::new();
        for entry in archive.entries().map_err(archive_err)? {
            let entry = entry.map_err(archive_err)?;
            let name = entry.path().map_err(archive_err)?.to_string_lossy().to_string();
            listing.push(ArchiveEntry {
                name,
                size: entry.size(),
            });
        }
        Ok(listing)
    }

    /// Verifies every entry and unpacks the archive into `dest`.
    ///
    /// Nothing is written unless the whole archive verifies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] for unsafe entry paths, checksum mismatches,
    /// or entries missing from either the archive or the manifest.
    #[instrument(skip_all, fields(path = %path.display(), dest = %dest.display()))]
    pub fn unpack(path: &Path, dest: &Path) -> Result<ArchiveManifest> {
        let files = Self::extract_all(path)?;
        let manifest = parse_manifest(&files)?;
        verify(&manifest, &files)?;

        fs::create_dir_all(dest).map_err(|e| Error::operation("create_scratch_dir", e))?;
        for (name, data) in files.iter().filter(|(name, _)| *name != MANIFEST_FILE) {
            let target = dest.join(name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::operation("create_scratch_dir", e))?;
            }
            fs::write(&target, data).map_err(|e| Error::operation("unpack_entry", e))?;
        }
        debug!(entries = files.len(), "Unpacked archive");
        Ok(manifest)
    }

    fn extract_all(path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
        let mut archive = open(path)?;
        let mut files = BTreeMap::new();
        for entry in archive.entries().map_err(archive_err)? {
            let mut entry = entry.map_err(archive_err)?;
            let entry_path = entry.path().map_err(archive_err)?.into_owned();
            if !is_safe_entry(&entry_path) {
                return Err(Error::Archive(format!(
                    "unsafe entry path '{}'",
                    entry_path.display()
                )));
            }
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry_path.to_string_lossy().to_string();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::Archive(format!("read '{name}': {e}")))?;
            if files.insert(name.clone(), data).is_some() {
                return Err(Error::Archive(format!("duplicate entry '{name}'")));
            }
        }
        Ok(files)
    }
}

/// Only plain relative names are accepted.
fn is_safe_entry(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

fn open(path: &Path) -> Result<Archive<zstd::Decoder<'static, BufReader<File>>>> {
    let file = File::open(path)
        .map_err(|e| Error::Archive(format!("open {}: {e}", path.display())))?;
    let decoder = zstd::Decoder::new(file)
        .map_err(|e| Error::Archive(format!("zstd decode: {e}")))?;
    Ok(Archive::new(decoder))
}

fn parse_manifest(files: &BTreeMap<String, Vec<u8>>) -> Result<ArchiveManifest> {
    let data = files
        .get(MANIFEST_FILE)
        .ok_or_else(|| Error::Archive(format!("{MANIFEST_FILE} missing")))?;
    let manifest: ArchiveManifest = serde_json::from_slice(data)
        .map_err(|e| Error::Archive(format!("invalid {MANIFEST_FILE}: {e}")))?;
    if manifest.format_version != ARCHIVE_FORMAT_VERSION {
        return Err(Error::Archive(format!(
            "unsupported archive format version {}",
            manifest.format_version
        )));
    }
    Ok(manifest)
}

fn verify(manifest: &ArchiveManifest, files: &BTreeMap<String, Vec<u8>>) -> Result<()> {
    if !manifest.checksums.contains_key(&manifest.workbook) {
        return Err(Error::Archive(format!(
            "workbook '{}' not listed in manifest",
            manifest.workbook
        )));
    }
    for (name, expected) in &manifest.checksums {
        let data = files
            .get(name)
            .ok_or_else(|| Error::Archive(format!("entry '{name}' missing from archive")))?;
        let actual = sha256_hex(data);
        if &actual != expected {
            return Err(Error::Archive(format!(
                "checksum mismatch for '{name}': expected {expected}, got {actual}"
            )));
        }
    }
    if let Some(extra) = files
        .keys()
        .find(|name| *name != MANIFEST_FILE && !manifest.checksums.contains_key(*name))
    {
        return Err(Error::Archive(format!("entry '{extra}' not listed in manifest")));
    }
    Ok(())
}

fn archive_err(e: std::io::Error) -> Error {
    Error::Archive(e.to_string())
}
