//! Object storage for depot repository roots.
//!
//! Every repository owns one root directory holding an architecture
//! subdirectory per architecture. Writes go through a temp file, fsync and
//! rename so static readers never observe a partially written file.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::ObjectStore;

use std::path::Path;
use std::sync::Arc;

/// Open the object store for one repository root, creating it if missing.
pub async fn open_root(root: impl AsRef<Path>) -> StorageResult<Arc<dyn ObjectStore>> {
    let backend = FilesystemBackend::new(root).await?;
    Ok(Arc::new(backend))
}
