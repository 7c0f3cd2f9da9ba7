//! Transfer archive.
//!
//! A run's workbook and attachment files travel as a zstd-compressed tar
//! (`.tar.zst`). The first entry is `MANIFEST.json`, which names the workbook
//! file and carries a SHA-256 checksum for every other entry. Entries are
//! flat: the archive holds no directories.
//!
//! Writes are atomic (temp file, then rename). On unpack every entry is
//! verified against the manifest and entries whose path is absolute or walks
//! out of the destination are rejected.

mod manifest;
mod reader;
mod writer;

pub use manifest::ArchiveManifest;
pub use reader::{ArchiveEntry, BundleReader};
pub use writer::{BundleInfo, BundleWriter};

use sha2::{Digest, Sha256};

/// Current archive format version.
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// File extension for transfer archives.
pub const ARCHIVE_EXTENSION: &str = "tar.zst";

/// Name of the manifest entry.
pub const MANIFEST_FILE: &str = "MANIFEST.json";

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Hex-encoded SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
