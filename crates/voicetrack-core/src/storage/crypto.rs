//! Authenticated at-rest encryption for the data file.
//!
//! Blob layout: 12-byte random nonce followed by the AES-256-GCM
//! ciphertext and tag, raw bytes. The tag makes wrong-key and tampered
//! data indistinguishable on decryption, which is all the loader needs.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use super::keys::KeyMaterial;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key`. Returns nonce || ciphertext.
pub(crate) fn seal(key: &KeyMaterial, plaintext: &[u8]) -> Option<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).ok()?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher.encrypt(Nonce::from_slice(&nonce_bytes), plaintext).ok()?;
    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Some(blob)
}

/// Decrypt a nonce || ciphertext blob. `None` on any failure.
pub(crate) fn open(key: &KeyMaterial, blob: &[u8]) -> Option<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return None;
    }
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).ok()?;
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    cipher.decrypt(Nonce::from_slice(nonce_bytes), ciphertext).ok()
}
