use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use super::Authenticator;
use crate::error::SigningError;

pub struct Ed25519Authenticator {
    keypair: SigningKey,
}

impl Ed25519Authenticator {
    pub fn new(keypair: SigningKey) -> Self {
        Self { keypair }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        let seed: &[u8; 32] = bytes
            .try_into()
            .map_err(|_| SigningError::KeyUnavailable(format!("invalid key length {}", bytes.len())))?;
        Ok(Self { keypair: SigningKey::from_bytes(seed) })
    }
}

impl Authenticator for Ed25519Authenticator {
    fn sign(&self, message: &[u8]) -> Result<[u8; 64], SigningError> {
        let signature = self
            .keypair
            .try_sign(message)
            .map_err(|e| SigningError::Signature(e.to_string()))?;
        Ok(signature.to_bytes())
    }

    fn public_key(&self) -> [u8; 32] {
        self.keypair.verifying_key().to_bytes()
    }
}

/// Checks `signature` over `message` against a registered public key.
pub fn verify_with_key(message: &[u8], signature: &[u8; 64], public_key: &VerifyingKey) -> bool {
    let signature = Signature::from_bytes(signature);
    public_key.verify(message, &signature).is_ok()
}

/// Decodes a hex-encoded 32-byte ed25519 public key.
pub fn decode_public_key(hex_key: &str) -> Result<VerifyingKey, String> {
    let bytes = hex::decode(hex_key.trim()).map_err(|e| format!("public key is not hex: {e}"))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("public key must be 32 bytes, got {}", bytes.len()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| e.to_string())
}
