//! Application state shared across handlers.

use crate::engine::MutationEngine;
use crate::registry::{RegistryError, RepositoryRegistry};
use depot_core::config::AppConfig;
use depot_metadata::MetadataStore;
use depot_signer::IndexSigner;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Configured repositories.
    pub registry: Arc<RepositoryRegistry>,
    /// Package mutation engine.
    pub engine: Arc<MutationEngine>,
}

impl AppState {
    /// Build the state from an already-constructed registry.
    pub fn new(
        config: AppConfig,
        registry: RepositoryRegistry,
        metadata: Arc<dyn MetadataStore>,
        signer: Arc<dyn IndexSigner>,
    ) -> Self {
        let registry = Arc::new(registry);
        let engine = Arc::new(MutationEngine::new(
            registry.clone(),
            metadata.clone(),
            signer,
        ));

        Self {
            config: Arc::new(config),
            metadata,
            registry,
            engine,
        }
    }

    /// Build the registry from configuration, then the state.
    pub async fn from_config(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        signer: Arc<dyn IndexSigner>,
    ) -> Result<Self, RegistryError> {
        let registry = RepositoryRegistry::from_config(&config.repositories).await?;
        Ok(Self::new(config, registry, metadata, signer))
    }
}
