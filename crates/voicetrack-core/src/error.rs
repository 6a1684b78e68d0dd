//! Core error types for voicetrack-core.
//!
//! Loading the record is deliberately infallible at the API boundary:
//! problems are reported as [`LoadIssue`]s next to a usable default record
//! instead of being raised. Saving and key management fail loudly.

use std::path::PathBuf;
use thiserror::Error;

use crate::streak::SickRefusal;

/// Umbrella error for facade operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key store errors
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Save errors
    #[error(transparent)]
    Save(#[from] SaveError),

    /// An operation was refused as a no-op (not a failure).
    #[error("operation refused: {0}")]
    Refused(#[from] SickRefusal),
}

/// Encryption key store errors.
#[derive(Error, Debug)]
pub enum KeyError {
    /// No key file at the configured location.
    #[error("key file not found at {0}")]
    Missing(PathBuf),

    /// The key file exists but could not be read.
    #[error("failed to read key file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key file could not be written.
    #[error("failed to write key file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key file content is too short for the cipher in use.
    #[error("key file {path} holds {len} bytes, too short for AES-256-GCM")]
    Malformed { path: PathBuf, len: usize },
}

/// Errors that abort a save. A failed save leaves the previous file intact.
#[derive(Error, Debug)]
pub enum SaveError {
    /// Encryption was requested but no key could be obtained. The record
    /// is never downgraded to a plaintext write in this case.
    #[error("cannot save encrypted record: {0}")]
    EncryptionKeyMissing(#[source] KeyError),

    /// The record could not be serialized.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The cipher rejected the payload.
    #[error("encryption failed")]
    EncryptFailed,

    /// The data file could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recoverable problems encountered while loading the record.
///
/// `StateStore::load` reports these instead of failing; the caller still
/// receives a usable record (defaults on the unrecoverable paths).
#[derive(Error, Debug)]
pub enum LoadIssue {
    /// The data file exists but could not be read.
    #[error("failed to read data file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not plain JSON and no decryption key is available.
    #[error("data file is not plain JSON and no decryption key is available: {0}")]
    NoKeyForDecryption(#[source] KeyError),

    /// Decryption failed. Wrong key and corrupt data are indistinguishable.
    #[error("decryption failed: wrong key or corrupt data")]
    InvalidKeyOrCorruptData,

    /// Decryption succeeded but the plaintext is not a valid record.
    #[error("decrypted content is not a valid record")]
    DecryptedContentMalformed,

    /// The file was stored in plaintext although the record flagged
    /// encryption on. The flag has been disabled; no data was lost.
    #[error("record flagged encrypted but file was plaintext; encryption disabled")]
    EncryptionFlagMismatch,
}
