//! `MANIFEST.json`.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::ARCHIVE_FORMAT_VERSION;

/// Archive metadata and per-entry checksums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Archive format version.
    pub format_version: u32,
    /// Version of the tool that wrote the archive.
    pub tool_version: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Name of the workbook entry.
    pub workbook: String,
    /// Checksum algorithm (always `sha256`).
    pub checksum_algorithm: String,
    /// Hex checksum per entry name, manifest excluded.
    pub checksums: BTreeMap<String, String>,
}

impl ArchiveManifest {
    /// Creates a manifest stamped with the current time.
    #[must_use]
    pub fn new(workbook: impl Into<String>) -> Self {
        Self {
            format_version: ARCHIVE_FORMAT_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            workbook: workbook.into(),
            checksum_algorithm: "sha256".to_string(),
            checksums: BTreeMap::new(),
        }
    }

    /// Records the checksum of an entry.
    pub fn add_checksum(&mut self, entry: impl Into<String>, checksum: impl Into<String>) {
        self.checksums.insert(entry.into(), checksum.into());
    }

    /// Names of the attachment entries (everything but the workbook).
    pub fn attachments(&self) -> impl Iterator<Item = &str> {
        self.checksums
            .keys()
            .map(String::as_str)
            .filter(move |name| *name != self.workbook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_serde() {
        let mut manifest = ArchiveManifest::new("setupdata.json");
        manifest.add_checksum("setupdata.json", "aa");
        manifest.add_checksum("m1-Document.pdf", "bb");

        let json = serde_json::to_string(&manifest).unwrap();
        let back: ArchiveManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
        assert_eq!(back.format_version, ARCHIVE_FORMAT_VERSION);
        assert_eq!(back.attachments().collect::<Vec<_>>(), vec!["m1-Document.pdf"]);
    }
}
