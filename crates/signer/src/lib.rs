//! OpenPGP signing identity for depot.
//!
//! An ephemeral credential home is created at startup from an operator
//! supplied secret key, used to sign every regenerated repository index and
//! removed again at shutdown. Package signature verification uses a separate
//! home holding only the configured trusted public keys.

pub mod error;
pub mod gpg;
pub mod signer;

pub use error::{SignerError, SignerResult};
pub use gpg::GpgIdentity;
pub use signer::{IdentityState, IndexSigner};
