//! Repository mutation engine.
//!
//! Adds and removes packages, keeping each repository's on-disk index equal
//! to the projection of its metadata records. All state changes for one
//! repository happen under that repository's lock, in the order
//! filesystem, metadata store, index.

use crate::error::MutationError;
use crate::metrics;
use crate::registry::{RepositoryDescriptor, RepositoryRegistry};
use base64::Engine as _;
use bytes::Bytes;
use depot_core::{
    ContentHash, RepositoryIndex, database_alias_name, database_file_name, read_pkginfo,
    signature_file_name, validate_file_name, validate_path_component,
};
use depot_metadata::{MetadataStore, PackageRow};
use depot_signer::IndexSigner;
use depot_storage::StorageError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Orchestrates package mutations across the registry, metadata store and
/// signing identity.
pub struct MutationEngine {
    registry: Arc<RepositoryRegistry>,
    metadata: Arc<dyn MetadataStore>,
    signer: Arc<dyn IndexSigner>,
}

impl MutationEngine {
    pub fn new(
        registry: Arc<RepositoryRegistry>,
        metadata: Arc<dyn MetadataStore>,
        signer: Arc<dyn IndexSigner>,
    ) -> Self {
        Self {
            registry,
            metadata,
            signer,
        }
    }

    pub fn registry(&self) -> &Arc<RepositoryRegistry> {
        &self.registry
    }

    fn resolve(&self, repo: &str) -> Result<Arc<RepositoryDescriptor>, MutationError> {
        self.registry
            .get(repo)
            .ok_or_else(|| MutationError::UnknownRepository(repo.to_string()))
    }

    /// Accept an uploaded package archive and republish the index for its
    /// architecture.
    ///
    /// On `SigningFailed` the package is already recorded and the index is
    /// published without a signature.
    #[instrument(
        skip(self, archive, signature),
        fields(repo = %repo, file_name = %file_name, size = archive.len())
    )]
    pub async fn add_package(
        &self,
        repo: &str,
        file_name: &str,
        archive: Bytes,
        signature: Option<Bytes>,
    ) -> Result<PackageRow, MutationError> {
        let result = self.add_package_inner(repo, file_name, archive, signature).await;
        match &result {
            Ok(row) => {
                metrics::PACKAGES_ADDED.with_label_values(&[repo]).inc();
                tracing::info!(
                    name = %row.name,
                    version = %row.version,
                    architecture = %row.architecture,
                    "package added"
                );
            }
            Err(e) => {
                metrics::record_mutation_error(e.kind());
                tracing::warn!(error = %e, "package add failed");
            }
        }
        result
    }

    async fn add_package_inner(
        &self,
        repo: &str,
        file_name: &str,
        archive: Bytes,
        signature: Option<Bytes>,
    ) -> Result<PackageRow, MutationError> {
        let descriptor = self.resolve(repo)?;

        validate_file_name(file_name).map_err(|e| MutationError::MalformedPackage(e.to_string()))?;
        if file_name == database_file_name(repo) || file_name == database_alias_name(repo) {
            return Err(MutationError::MalformedPackage(format!(
                "{file_name} is reserved for the repository index"
            )));
        }
        let info = read_pkginfo(&archive)
            .await
            .map_err(|e| MutationError::MalformedPackage(e.to_string()))?;

        let signature = signature.filter(|sig| !sig.is_empty());
        if descriptor.require_signed_packages() {
            let Some(sig) = &signature else {
                return Err(MutationError::SignatureRequired);
            };
            if !self.signer.verify(&archive, sig).await {
                return Err(MutationError::SignatureInvalid);
            }
        }

        let _guard = descriptor.lock().await;
        let storage = descriptor.storage();

        let previous = self.metadata.get_package(repo, file_name).await?;

        let archive_key = object_key(&info.architecture, file_name);
        let signature_key = object_key(&info.architecture, &signature_file_name(file_name));

        storage
            .put(&archive_key, archive.clone())
            .await
            .map_err(write_failed)?;
        match &signature {
            Some(sig) => storage
                .put(&signature_key, sig.clone())
                .await
                .map_err(write_failed)?,
            None => {
                storage
                    .delete_if_exists(&signature_key)
                    .await
                    .map_err(write_failed)?;
            }
        }

        let row = PackageRow::new(
            repo,
            file_name,
            &info,
            ContentHash::compute(&archive),
            archive.len() as u64,
            signature
                .as_ref()
                .map(|sig| base64::engine::general_purpose::STANDARD.encode(sig)),
        )?;
        self.metadata.put_package(&row).await?;

        let mut architectures = vec![row.architecture.clone()];
        let mut cleanup = Ok(());
        if let Some(previous) = previous
            && previous.architecture != row.architecture
        {
            tracing::info!(
                previous = %previous.architecture,
                current = %row.architecture,
                "re-upload moved package to another architecture"
            );
            cleanup = self
                .remove_files(&descriptor, &previous.architecture, file_name)
                .await;
            architectures.push(previous.architecture);
        }

        // The row is committed, so both indexes are republished even when
        // the old files could not be removed.
        let regenerated = self.regenerate_all(&descriptor, &architectures).await;
        cleanup.and(regenerated)?;

        Ok(row)
    }

    /// Remove a package and republish the index for its architecture.
    #[instrument(skip(self), fields(repo = %repo, file_name = %file_name))]
    pub async fn remove_package(
        &self,
        repo: &str,
        file_name: &str,
    ) -> Result<PackageRow, MutationError> {
        let result = self.remove_package_inner(repo, file_name).await;
        match &result {
            Ok(_) => {
                metrics::PACKAGES_REMOVED.with_label_values(&[repo]).inc();
                tracing::info!("package removed");
            }
            Err(e) => {
                metrics::record_mutation_error(e.kind());
                tracing::warn!(error = %e, "package removal failed");
            }
        }
        result
    }

    async fn remove_package_inner(
        &self,
        repo: &str,
        file_name: &str,
    ) -> Result<PackageRow, MutationError> {
        let descriptor = self.resolve(repo)?;
        validate_path_component(file_name)
            .map_err(|e| MutationError::MalformedPackage(e.to_string()))?;

        let _guard = descriptor.lock().await;

        let row = self
            .metadata
            .get_package(repo, file_name)
            .await?
            .ok_or_else(|| MutationError::PackageNotFound(file_name.to_string()))?;

        self.remove_files(&descriptor, &row.architecture, file_name)
            .await?;
        self.metadata.delete_package(repo, file_name).await?;

        self.regenerate_all(&descriptor, std::slice::from_ref(&row.architecture))
            .await?;

        Ok(row)
    }

    /// All package records of a repository.
    pub async fn list_packages(&self, repo: &str) -> Result<Vec<PackageRow>, MutationError> {
        self.resolve(repo)?;
        Ok(self.metadata.list_packages(repo).await?)
    }

    /// Rebuild every index of every repository from the metadata store.
    ///
    /// Run at startup to restore the index invariant after an unclean stop.
    /// Signing failures are logged and leave the affected index unsigned.
    pub async fn reconcile(&self) -> Result<(), MutationError> {
        for descriptor in self.registry.iter() {
            let _guard = descriptor.lock().await;

            let mut architectures: BTreeSet<String> =
                self.registry.architectures().iter().cloned().collect();
            architectures.extend(
                self.metadata
                    .list_packages(descriptor.name())
                    .await?
                    .into_iter()
                    .map(|row| row.architecture),
            );

            for arch in &architectures {
                match self.regenerate(&descriptor, arch).await {
                    Ok(()) => {}
                    Err(MutationError::SigningFailed(e)) => {
                        tracing::warn!(
                            repo = %descriptor.name(),
                            architecture = %arch,
                            error = %e,
                            "index published unsigned"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }

            tracing::info!(
                repo = %descriptor.name(),
                architectures = architectures.len(),
                "repository indexes reconciled"
            );
        }
        Ok(())
    }

    async fn remove_files(
        &self,
        descriptor: &RepositoryDescriptor,
        arch: &str,
        file_name: &str,
    ) -> Result<(), MutationError> {
        let storage = descriptor.storage();
        for key in [
            object_key(arch, file_name),
            object_key(arch, &signature_file_name(file_name)),
        ] {
            if !storage.delete_if_exists(&key).await.map_err(write_failed)? {
                tracing::debug!(key = %key, "file already absent");
            }
        }
        Ok(())
    }

    /// Regenerate several indexes, attempting all of them and reporting the
    /// first failure.
    async fn regenerate_all(
        &self,
        descriptor: &RepositoryDescriptor,
        architectures: &[String],
    ) -> Result<(), MutationError> {
        let mut first_error = None;
        for arch in architectures {
            if let Err(e) = self.regenerate(descriptor, arch).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Rebuild, sign and publish the index for one architecture.
    ///
    /// The caller must hold the repository lock.
    async fn regenerate(
        &self,
        descriptor: &RepositoryDescriptor,
        arch: &str,
    ) -> Result<(), MutationError> {
        let started = Instant::now();
        let repo = descriptor.name();

        let entries = self
            .metadata
            .list_packages(repo)
            .await?
            .into_iter()
            .filter(|row| row.architecture == arch)
            .map(|row| row.to_index_entry())
            .collect::<Result<Vec<_>, _>>()?;
        let index = RepositoryIndex::project(repo, arch, entries);
        let database = index.to_database().map_err(|e| {
            MutationError::StorageWriteFailed(format!("failed to build index: {e}"))
        })?;

        let signature = if self.signer.is_active() {
            Some(self.signer.sign(&database).await)
        } else {
            None
        };

        let storage = descriptor.storage();
        let names = [database_file_name(repo), database_alias_name(repo)];

        // A signature must never sit beside an index it does not match.
        for name in &names {
            storage
                .delete_if_exists(&object_key(arch, &signature_file_name(name)))
                .await
                .map_err(write_failed)?;
        }
        for name in &names {
            storage
                .put(&object_key(arch, name), database.clone())
                .await
                .map_err(write_failed)?;
        }

        let result = match signature {
            Some(Ok(sig)) => {
                let sig = Bytes::from(sig);
                for name in &names {
                    storage
                        .put(&object_key(arch, &signature_file_name(name)), sig.clone())
                        .await
                        .map_err(write_failed)?;
                }
                Ok(())
            }
            Some(Err(e)) => {
                metrics::INDEX_SIGNING_FAILURES.inc();
                Err(MutationError::SigningFailed(e.to_string()))
            }
            None => Ok(()),
        };

        metrics::INDEX_REGENERATION_DURATION.observe(started.elapsed().as_secs_f64());
        tracing::debug!(
            repo = %index.repo(),
            architecture = %index.architecture(),
            packages = index.entries().len(),
            signed = result.is_ok() && self.signer.is_active(),
            "index published"
        );

        result
    }
}

fn object_key(arch: &str, file_name: &str) -> String {
    format!("{arch}/{file_name}")
}

fn write_failed(e: StorageError) -> MutationError {
    MutationError::StorageWriteFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("x86_64", "a.pkg.tar.zst"), "x86_64/a.pkg.tar.zst");
        assert_eq!(
            object_key("x86_64", &signature_file_name("core.db")),
            "x86_64/core.db.sig"
        );
    }

    #[test]
    fn test_storage_errors_map_to_write_failed() {
        let err = write_failed(StorageError::InvalidKey("../x".into()));
        assert_eq!(err.kind(), "storage_write_failed");
    }
}
