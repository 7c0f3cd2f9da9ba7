//! Attachment sideband.
//!
//! Binary field content never goes into a cell. Export writes the bytes as a
//! loose file in the run's scratch directory and puts the filename in the
//! cell; import reads the file back by that name.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::Attachment;
use crate::{Error, Result};

/// Fallback content type for unknown extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Extension ↔ content-type table. The first entry for a content type wins
/// when deriving an extension.
const MIME_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("tif", "image/tiff"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("zip", "application/zip"),
    ("doc", "application/msword"),
    ("xls", "application/vnd.ms-excel"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("bin", DEFAULT_CONTENT_TYPE),
];

/// Returns the extension for a content type (`bin` when unknown).
#[must_use]
pub fn extension_for(content_type: &str) -> &'static str {
    let wanted = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(_, ct)| *ct == wanted)
        .map_or("bin", |(ext, _)| ext)
}

/// Returns the content type for a filename, from its extension.
#[must_use]
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map_or(DEFAULT_CONTENT_TYPE, |(_, ct)| ct)
}

/// Checks that a filename stays inside the scratch directory.
#[must_use]
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Reduces an uploader-supplied name to a bare file name.
fn basename(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    is_safe_filename(base).then_some(base)
}

/// Reads and writes attachment files in one run's scratch directory.
#[derive(Debug)]
pub struct AttachmentSideband {
    dir: PathBuf,
    used: HashSet<String>,
    written: Vec<String>,
}

impl AttachmentSideband {
    /// Creates a sideband over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            used: HashSet::new(),
            written: Vec::new(),
        }
    }

    /// Returns the scratch directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the filenames written so far, in order.
    #[must_use]
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Marks a name as taken so attachments never overwrite it.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// Writes an attachment and returns its filename.
    ///
    /// Returns `None`, writing nothing, for zero-size content. When the
    /// attachment has no usable filename, `<object_id>-<field>.<ext>` is used.
    /// Names already written in this run get a numeric suffix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentIo`] if the file cannot be written.
    pub fn write(
        &mut self,
        object_id: &str,
        field: &str,
        attachment: &Attachment,
    ) -> Result<Option<String>> {
        if attachment.size() == 0 {
            return Ok(None);
        }

        let preferred = attachment
            .filename
            .as_deref()
            .and_then(basename)
            .map_or_else(
                || format!("{object_id}-{field}.{}", extension_for(&attachment.content_type)),
                str::to_string,
            );
        let name = self.unique_name(&preferred);
        if !is_safe_filename(&name) {
            return Err(Error::AttachmentIo {
                filename: name,
                cause: "unsafe filename".to_string(),
            });
        }

        fs::write(self.dir.join(&name), &attachment.data).map_err(|e| Error::AttachmentIo {
            filename: name.clone(),
            cause: e.to_string(),
        })?;
        debug!(filename = %name, bytes = attachment.size(), "Wrote attachment");

        self.used.insert(name.clone());
        self.written.push(name.clone());
        Ok(Some(name))
    }

    /// Reads an attachment back by filename.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentIo`] if the name would escape the scratch
    /// directory or the file cannot be read.
    pub fn read(&self, filename: &str) -> Result<Attachment> {
        if !is_safe_filename(filename) {
            return Err(Error::AttachmentIo {
                filename: filename.to_string(),
                cause: "unsafe filename".to_string(),
            });
        }
        let data = fs::read(self.dir.join(filename)).map_err(|e| Error::AttachmentIo {
            filename: filename.to_string(),
            cause: e.to_string(),
        })?;
        Ok(Attachment::new(Some(filename), content_type_for(filename), data))
    }

    fn unique_name(&self, preferred: &str) -> String {
        if !self.used.contains(preferred) {
            return preferred.to_string();
        }
        let path = Path::new(preferred);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(preferred);
        let ext = path.extension().and_then(|e| e.to_str());
        let mut n = 1_usize;
        loop {
            let candidate = ext.map_or_else(
                || format!("{stem}-{n}"),
                |ext| format!("{stem}-{n}.{ext}"),
            );
            if !self.used.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("application/pdf", "pdf")]
    #[test_case("image/jpeg", "jpg")]
    #[test_case("text/plain; charset=utf-8", "txt")]
    #[test_case("application/x-unknown", "bin")]
    fn test_extension_for(content_type: &str, expected: &str) {
        assert_eq!(extension_for(content_type), expected);
    }

    #[test_case("report.PDF", "application/pdf")]
    #[test_case("photo.jpeg", "image/jpeg")]
    #[test_case("noext", DEFAULT_CONTENT_TYPE)]
    fn test_content_type_for(filename: &str, expected: &str) {
        assert_eq!(content_type_for(filename), expected);
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let mut sideband = AttachmentSideband::new(dir.path());
        let attachment = Attachment::new(Some("C:\\uploads\\logo.png"), "image/png", vec![1, 2, 3]);

        let name = sideband.write("lab", "Logo", &attachment).unwrap().unwrap();
        assert_eq!(name, "logo.png");

        let back = sideband.read(&name).unwrap();
        assert_eq!(back.data, vec![1, 2, 3]);
        assert_eq!(back.content_type, "image/png");
    }

    #[test]
    fn test_fallback_name_and_dedupe() {
        let dir = TempDir::new().unwrap();
        let mut sideband = AttachmentSideband::new(dir.path());
        let anon = Attachment::new(None, "application/pdf", b"%PDF".to_vec());

        let first = sideband.write("water", "Method", &anon).unwrap().unwrap();
        let second = sideband.write("water", "Method", &anon).unwrap().unwrap();
        assert_eq!(first, "water-Method.pdf");
        assert_eq!(second, "water-Method-1.pdf");
        assert_eq!(sideband.written().len(), 2);
    }

    #[test]
    fn test_zero_size_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut sideband = AttachmentSideband::new(dir.path());
        let empty = Attachment::new(Some("empty.txt"), "text/plain", Vec::new());
        assert_eq!(sideband.write("x", "f", &empty).unwrap(), None);
        assert!(!dir.path().join("empty.txt").exists());
    }

    #[test]
    fn test_read_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let sideband = AttachmentSideband::new(dir.path());
        assert!(matches!(
            sideband.read("../etc/passwd"),
            Err(Error::AttachmentIo { .. })
        ));
        assert!(matches!(sideband.read(".."), Err(Error::AttachmentIo { .. })));
    }

    #[test]
    fn test_read_missing_is_fatal() {
        let dir = TempDir::new().unwrap();
        let sideband = AttachmentSideband::new(dir.path());
        let err = sideband.read("gone.pdf").unwrap_err();
        assert!(!err.is_recoverable());
    }
}
