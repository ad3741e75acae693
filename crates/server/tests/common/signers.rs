//! In-process signers for exercising the mutation engine without gpg.

use async_trait::async_trait;
use depot_signer::{IdentityState, IndexSigner, SignerError, SignerResult};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Signature bytes produced by [`FakeSigner`] for `data`.
#[allow(dead_code)]
pub fn fake_signature(data: &[u8]) -> Vec<u8> {
    let digest = depot_core::ContentHash::compute(data);
    format!("SIG:{}", digest.to_hex()).into_bytes()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignMode {
    Succeed,
    Fail,
}

/// Deterministic signer.
///
/// `verify` accepts exactly the signatures `fake_signature` produces when
/// `accept_signatures` is set. `sign` can be slowed down to widen race
/// windows, and tracks the peak number of concurrent calls.
pub struct FakeSigner {
    state: Mutex<IdentityState>,
    mode: Mutex<SignMode>,
    accept_signatures: AtomicBool,
    delay: Duration,
    sign_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl FakeSigner {
    fn with_state(state: IdentityState) -> Self {
        Self {
            state: Mutex::new(state),
            mode: Mutex::new(SignMode::Succeed),
            accept_signatures: AtomicBool::new(true),
            delay: Duration::ZERO,
            sign_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// No signing key: indexes are published unsigned.
    pub fn inactive() -> Self {
        Self::with_state(IdentityState::Uninitialized)
    }

    /// Signing key present.
    pub fn active() -> Self {
        Self::with_state(IdentityState::Active)
    }

    /// Signing key present but every signature attempt fails.
    pub fn failing() -> Self {
        let signer = Self::active();
        signer.set_mode(SignMode::Fail);
        signer
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn rejecting_signatures(self) -> Self {
        self.accept_signatures.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_mode(&self, mode: SignMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexSigner for FakeSigner {
    fn state(&self) -> IdentityState {
        *self.state.lock().unwrap()
    }

    async fn sign(&self, data: &[u8]) -> SignerResult<Vec<u8>> {
        if !self.is_active() {
            return Err(SignerError::NotActive);
        }
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match *self.mode.lock().unwrap() {
            SignMode::Succeed => Ok(fake_signature(data)),
            SignMode::Fail => Err(SignerError::Signing("fake signer failure".to_string())),
        }
    }

    async fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        self.accept_signatures.load(Ordering::SeqCst) && signature == fake_signature(data)
    }

    async fn tear_down(&self) {
        *self.state.lock().unwrap() = IdentityState::TornDown;
    }
}
