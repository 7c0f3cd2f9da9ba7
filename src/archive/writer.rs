//! Archive writer.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tar::{Builder, Header};
use tracing::{debug, instrument};

use super::{ArchiveManifest, DEFAULT_COMPRESSION_LEVEL, MANIFEST_FILE, sha256_hex};
use crate::{Error, Result};

/// Summary of a written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    /// Archive path (empty for in-memory archives).
    pub path: PathBuf,
    /// Number of entries, manifest included.
    pub entries: usize,
    /// Compressed size in bytes.
    pub size_bytes: u64,
    /// SHA-256 of the compressed archive.
    pub checksum: String,
}

/// Writes `.tar.zst` transfer archives.
#[derive(Debug, Clone, Copy)]
pub struct BundleWriter {
    compression_level: i32,
}

impl Default for BundleWriter {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl BundleWriter {
    /// Creates a writer with the given zstd level.
    #[must_use]
    pub const fn new(compression_level: i32) -> Self {
        Self { compression_level }
    }

    /// Packs every regular file directly inside `source` into an archive at
    /// `path`.
    ///
    /// `workbook` must name one of those files. Either the complete archive is
    /// written or nothing is left behind.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` cannot be read, the workbook is absent, or
    /// the archive cannot be written.
    #[instrument(skip(self), fields(source = %source.display(), path = %path.display()))]
    pub fn write_dir(&self, source: &Path, workbook: &str, path: &Path) -> Result<BundleInfo> {
        let entries = collect_files(source)?;
        if !entries.contains_key(workbook) {
            return Err(Error::Archive(format!(
                "workbook '{workbook}' not found in {}",
                source.display()
            )));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::operation("create_archive_dir", e))?;
        }

        let temp_path = path.with_extension("tmp");
        let written = File::create(&temp_path)
            .map_err(|e| Error::operation("create_archive", e))
            .and_then(|file| self.write_entries(&entries, workbook, BufWriter::new(file)));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        fs::rename(&temp_path, path).map_err(|e| Error::operation("rename_archive", e))?;

        let data = fs::read(path).map_err(|e| Error::operation("read_archive", e))?;
        debug!(entries = entries.len() + 1, bytes = data.len(), "Wrote archive");
        Ok(BundleInfo {
            path: path.to_path_buf(),
            entries: entries.len() + 1,
            size_bytes: data.len() as u64,
            checksum: sha256_hex(&data),
        })
    }

    /// Packs in-memory entries into an archive buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if `workbook` is not among the entries or compression
    /// fails.
    pub fn write_to_vec(
        &self,
        entries: &BTreeMap<String, Vec<u8>>,
        workbook: &str,
    ) -> Result<(Vec<u8>, BundleInfo)> {
        if !entries.contains_key(workbook) {
            return Err(Error::Archive(format!("workbook '{workbook}' not among entries")));
        }
        let mut buffer = Vec::new();
        self.write_entries(entries, workbook, &mut buffer)?;
        let info = BundleInfo {
            path: PathBuf::new(),
            entries: entries.len() + 1,
            size_bytes: buffer.len() as u64,
            checksum: sha256_hex(&buffer),
        };
        Ok((buffer, info))
    }

    /// Writes the manifest, the workbook, then the remaining entries by name.
    fn write_entries<W: Write>(
        &self,
        entries: &BTreeMap<String, Vec<u8>>,
        workbook: &str,
        out: W,
    ) -> Result<()> {
        let mut manifest = ArchiveManifest::new(workbook);
        for (name, data) in entries {
            manifest.add_checksum(name, sha256_hex(data));
        }
        let manifest_json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| Error::operation("serialize_manifest", e))?;

        let encoder = zstd::Encoder::new(out, self.compression_level)
            .map_err(|e| Error::Archive(format!("zstd encoder: {e}")))?;
        let mut builder = Builder::new(encoder);

        append(&mut builder, MANIFEST_FILE, &manifest_json)?;
        if let Some(data) = entries.get(workbook) {
            append(&mut builder, workbook, data)?;
        }
        for (name, data) in entries.iter().filter(|(name, _)| *name != workbook) {
            append(&mut builder, name, data)?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| Error::Archive(format!("tar finish: {e}")))?;
        encoder
            .finish()
            .and_then(|mut out| out.flush())
            .map_err(|e| Error::Archive(format!("zstd finish: {e}")))
    }
}

fn append<W: Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header
        .set_path(name)
        .map_err(|e| Error::Archive(format!("set path '{name}': {e}")))?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append(&header, data)
        .map_err(|e| Error::Archive(format!("append '{name}': {e}")))
}

fn collect_files(source: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    let dir = fs::read_dir(source).map_err(|e| Error::operation("read_scratch_dir", e))?;
    for entry in dir {
        let entry = entry.map_err(|e| Error::operation("read_scratch_dir", e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == MANIFEST_FILE {
            continue;
        }
        let data = fs::read(&path).map_err(|e| Error::operation("read_scratch_file", e))?;
        files.insert(name.to_string(), data);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn entry_names(data: &[u8]) -> Vec<String> {
        let mut decoder = zstd::Decoder::new(data).unwrap();
        let mut tar_data = Vec::new();
        decoder.read_to_end(&mut tar_data).unwrap();
        let mut archive = tar::Archive::new(&tar_data[..]);
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_write_to_vec_order() {
        let mut entries = BTreeMap::new();
        entries.insert("a-logo.png".to_string(), vec![1, 2, 3]);
        entries.insert("setupdata.json".to_string(), b"{}".to_vec());

        let (data, info) = BundleWriter::default()
            .write_to_vec(&entries, "setupdata.json")
            .unwrap();
        assert_eq!(info.entries, 3);
        assert_eq!(
            entry_names(&data),
            vec!["MANIFEST.json", "setupdata.json", "a-logo.png"]
        );
    }

    #[test]
    fn test_write_dir_atomic() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("setupdata.json"), b"{}").unwrap();
        fs::write(source.path().join("m1-Document.pdf"), b"%PDF").unwrap();
        fs::create_dir(source.path().join("nested")).unwrap();

        let out = TempDir::new().unwrap();
        let path = out.path().join("sub").join("site.tar.zst");
        let info = BundleWriter::default()
            .write_dir(source.path(), "setupdata.json", &path)
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(info.entries, 3);
        assert_eq!(info.path, path);
    }

    #[test]
    fn test_missing_workbook_rejected() {
        let source = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = out.path().join("site.tar.zst");
        let err = BundleWriter::default()
            .write_dir(source.path(), "setupdata.json", &path)
            .unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
        assert!(!path.exists());
    }
}
