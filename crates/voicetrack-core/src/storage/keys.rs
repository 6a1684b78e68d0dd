//! Encryption key lifecycle on durable storage.
//!
//! The key file holds raw key bytes with no envelope or metadata. Its
//! absence is only an error when encryption is actually in use; the state
//! store decides that.

use rand::rngs::OsRng;
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::KeyError;

/// Key length for AES-256-GCM.
pub const KEY_LEN: usize = 32;

/// Symmetric key material. Opaque; `Debug` never reveals the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial([u8; KEY_LEN]);

impl KeyMaterial {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}

/// Manages the symmetric key file.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generate fresh key material and write it to the key file.
    ///
    /// Overwrites any existing key; data encrypted under the old key
    /// becomes unrecoverable. Callers that must preserve an existing key
    /// load it instead.
    pub fn generate_and_persist(&self) -> Result<KeyMaterial, KeyError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| KeyError::WriteFailed {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        std::fs::write(&self.path, bytes).map_err(|source| KeyError::WriteFailed {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "generated new encryption key");
        Ok(KeyMaterial(bytes))
    }

    /// Read key material from the key file.
    ///
    /// Files longer than [`KEY_LEN`] are accepted and truncated; shorter
    /// content is implausible for the cipher and reported as malformed.
    pub fn load(&self) -> Result<KeyMaterial, KeyError> {
        if !self.path.exists() {
            return Err(KeyError::Missing(self.path.clone()));
        }
        let raw = std::fs::read(&self.path).map_err(|source| KeyError::ReadFailed {
            path: self.path.clone(),
            source,
        })?;
        if raw.len() < KEY_LEN {
            return Err(KeyError::Malformed {
                path: self.path.clone(),
                len: raw.len(),
            });
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&raw[..KEY_LEN]);
        Ok(KeyMaterial(bytes))
    }
}
