//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

/// Object storage rooted at one repository directory.
///
/// Keys are relative slash-separated paths such as `x86_64/foo.pkg.tar.zst`.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Put an object atomically. Readers see either the old or the new
    /// content, never a partial write.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object. Fails with `NotFound` if it does not exist.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete an object, treating a missing object as success.
    /// Returns whether an object was removed.
    async fn delete_if_exists(&self, key: &str) -> StorageResult<bool> {
        match self.delete(key).await {
            Ok(()) => Ok(true),
            Err(crate::StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a directory (and its parents) under the root.
    async fn create_dir(&self, key: &str) -> StorageResult<()>;

    /// Root directory on the local filesystem.
    fn root(&self) -> &Path;

    /// Verify the root is reachable.
    async fn health_check(&self) -> StorageResult<()>;
}
