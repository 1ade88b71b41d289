pub mod ed25519;
pub mod key_manager;

use crate::error::SigningError;

/// Holder of a node's private key material.
///
/// Implementations must never hand out the secret itself; callers only get
/// signatures and the matching public key.
pub trait Authenticator: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<[u8; 64], SigningError>;

    fn public_key(&self) -> [u8; 32];
}
