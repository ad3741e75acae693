//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use depot_core::{ContentHash, IndexEntry, PkgInfo};
use sqlx::FromRow;
use time::OffsetDateTime;

/// One uploaded package, keyed by `(repo_name, file_name)`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PackageRow {
    pub repo_name: String,
    pub file_name: String,
    pub name: String,
    pub version: String,
    pub architecture: String,
    /// SHA-256 of the archive, lowercase hex.
    pub checksum: String,
    pub compressed_size: i64,
    /// Base64 detached signature that accompanied the upload.
    pub pgp_signature: Option<String>,
    /// Full `.PKGINFO` contents as JSON.
    pub details: String,
    pub ingested_at: OffsetDateTime,
}

impl PackageRow {
    /// Build a record for a freshly ingested archive.
    pub fn new(
        repo_name: &str,
        file_name: &str,
        info: &PkgInfo,
        checksum: ContentHash,
        compressed_size: u64,
        pgp_signature: Option<String>,
    ) -> MetadataResult<Self> {
        Ok(Self {
            repo_name: repo_name.to_string(),
            file_name: file_name.to_string(),
            name: info.name.clone(),
            version: info.version.clone(),
            architecture: info.architecture.clone(),
            checksum: checksum.to_hex(),
            compressed_size: i64::try_from(compressed_size).map_err(|_| {
                MetadataError::Corrupt(format!("{file_name}: size {compressed_size} out of range"))
            })?,
            pgp_signature,
            details: serde_json::to_string(info)?,
            ingested_at: OffsetDateTime::now_utc(),
        })
    }

    pub fn has_signature(&self) -> bool {
        self.pgp_signature.is_some()
    }

    /// Decode the stored `.PKGINFO` fields.
    pub fn info(&self) -> MetadataResult<PkgInfo> {
        Ok(serde_json::from_str(&self.details)?)
    }

    /// Project this record into an index entry.
    pub fn to_index_entry(&self) -> MetadataResult<IndexEntry> {
        let checksum = ContentHash::from_hex(&self.checksum)
            .map_err(|e| MetadataError::Corrupt(format!("{}: {e}", self.file_name)))?;
        Ok(IndexEntry {
            file_name: self.file_name.clone(),
            checksum,
            compressed_size: u64::try_from(self.compressed_size).unwrap_or_default(),
            pgp_signature: self.pgp_signature.clone(),
            info: self.info()?,
        })
    }
}
