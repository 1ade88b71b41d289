use std::fs;
use std::io::Write;
use std::path::Path;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use super::ed25519::Ed25519Authenticator;
use crate::error::SigningError;

/// Loads the node's pre-provisioned ed25519 seed (hex, 32 bytes) from `path`.
///
/// Never generates a replacement: a node without its provisioned key must not
/// participate.
pub fn load_signing_key(path: &Path) -> Result<Ed25519Authenticator, SigningError> {
    if !path.exists() {
        return Err(SigningError::KeyUnavailable(format!("{} does not exist", path.display())));
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| SigningError::KeyUnavailable(format!("{}: {}", path.display(), e)))?;
    let seed = hex::decode(contents.trim())
        .map_err(|e| SigningError::KeyUnavailable(format!("{}: not hex: {}", path.display(), e)))?;

    Ed25519Authenticator::from_bytes(&seed)
}

/// Writes a fresh seed to `path` and returns it. Used by provisioning scripts and tests.
pub fn write_signing_key(path: &Path) -> std::io::Result<SigningKey> {
    let key = SigningKey::generate(&mut OsRng);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(hex::encode(key.to_bytes()).as_bytes())?;
    Ok(key)
}
