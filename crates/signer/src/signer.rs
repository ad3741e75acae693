//! Signing capability used by the mutation engine.

use crate::error::SignerResult;
use async_trait::async_trait;

/// Lifecycle of a signing identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityState {
    /// No usable secret key; signing is skipped.
    Uninitialized,
    /// Secret key imported; `sign` is available.
    Active,
    /// Credential home removed; no further signing.
    TornDown,
}

/// Produces detached signatures over repository indexes and checks
/// detached signatures over uploaded packages.
#[async_trait]
pub trait IndexSigner: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> IdentityState;

    /// Whether `sign` should be called at all.
    fn is_active(&self) -> bool {
        self.state() == IdentityState::Active
    }

    /// Produce a detached signature over `data`. Only valid while active.
    async fn sign(&self, data: &[u8]) -> SignerResult<Vec<u8>>;

    /// Check a detached signature against the trusted public keys.
    /// Independent of the signing state; fails closed when no keys are trusted.
    async fn verify(&self, data: &[u8], signature: &[u8]) -> bool;

    /// Remove all key material. Idempotent; failures are logged.
    async fn tear_down(&self);
}
