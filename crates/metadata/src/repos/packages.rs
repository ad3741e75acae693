//! Package record repository trait.

use crate::error::MetadataResult;
use crate::models::PackageRow;
use async_trait::async_trait;

/// Durable mapping from `(repo_name, file_name)` to a package record.
///
/// Writes are durable before the call returns.
#[async_trait]
pub trait PackageRepo: Send + Sync {
    /// Insert or overwrite the record for `(row.repo_name, row.file_name)`.
    async fn put_package(&self, row: &PackageRow) -> MetadataResult<()>;

    /// Get a record by key.
    async fn get_package(
        &self,
        repo_name: &str,
        file_name: &str,
    ) -> MetadataResult<Option<PackageRow>>;

    /// Delete a record. Returns whether it existed.
    async fn delete_package(&self, repo_name: &str, file_name: &str) -> MetadataResult<bool>;

    /// List all records of a repository, ordered by file name.
    async fn list_packages(&self, repo_name: &str) -> MetadataResult<Vec<PackageRow>>;
}
