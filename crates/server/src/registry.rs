//! Repository registry: configured repositories and their mutation locks.

use depot_core::config::RepositoriesConfig;
use depot_storage::{ObjectStore, StorageError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Registry construction errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid repository configuration: {0}")]
    Config(String),

    #[error("failed to prepare repository '{repo}': {source}")]
    Storage {
        repo: String,
        #[source]
        source: StorageError,
    },
}

/// One configured repository.
///
/// Every mutation of the repository's files, records or indexes happens
/// while holding its lock.
pub struct RepositoryDescriptor {
    name: String,
    root: PathBuf,
    require_signed_packages: bool,
    storage: Arc<dyn ObjectStore>,
    lock: Mutex<()>,
}

impl RepositoryDescriptor {
    pub fn new(
        name: impl Into<String>,
        require_signed_packages: bool,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            name: name.into(),
            root: storage.root().to_path_buf(),
            require_signed_packages,
            storage,
            lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn require_signed_packages(&self) -> bool {
        self.require_signed_packages
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.storage
    }

    /// Acquire the repository's mutation lock. Released when the guard drops.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl std::fmt::Debug for RepositoryDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryDescriptor")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("require_signed_packages", &self.require_signed_packages)
            .finish()
    }
}

/// All repositories known to this process, fixed at startup.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    repos: BTreeMap<String, Arc<RepositoryDescriptor>>,
    architectures: Vec<String>,
}

impl RepositoryRegistry {
    /// Build the registry from configuration, creating each repository root
    /// and its configured architecture directories.
    pub async fn from_config(config: &RepositoriesConfig) -> Result<Self, RegistryError> {
        config.validate().map_err(RegistryError::Config)?;

        let mut registry = Self {
            repos: BTreeMap::new(),
            architectures: config.architectures.clone(),
        };

        for path in config.search_paths() {
            let name = RepositoriesConfig::repo_name(&path).ok_or_else(|| {
                RegistryError::Config(format!(
                    "repository path '{}' has no usable base name",
                    path.display()
                ))
            })?;

            let storage = depot_storage::open_root(&path)
                .await
                .map_err(|source| RegistryError::Storage {
                    repo: name.clone(),
                    source,
                })?;
            for arch in &config.architectures {
                storage
                    .create_dir(arch)
                    .await
                    .map_err(|source| RegistryError::Storage {
                        repo: name.clone(),
                        source,
                    })?;
            }

            tracing::info!(
                repo = %name,
                root = %path.display(),
                require_signed_packages = config.require_signed_packages,
                "registered repository"
            );

            registry.insert(RepositoryDescriptor::new(
                name,
                config.require_signed_packages,
                storage,
            ))?;
        }

        Ok(registry)
    }

    /// Add a repository. Names must be unique.
    pub fn insert(&mut self, descriptor: RepositoryDescriptor) -> Result<(), RegistryError> {
        if self.repos.contains_key(descriptor.name()) {
            return Err(RegistryError::Config(format!(
                "repository name '{}' is configured more than once",
                descriptor.name()
            )));
        }
        self.repos
            .insert(descriptor.name().to_string(), Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<RepositoryDescriptor>> {
        self.repos.get(name).cloned()
    }

    /// Repositories in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RepositoryDescriptor>> {
        self.repos.values()
    }

    /// Architecture directories every repository carries.
    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}
