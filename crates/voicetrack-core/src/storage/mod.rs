//! Durable storage: the persisted record file and the encryption key file.

mod crypto;
pub mod keys;
pub mod state;

pub use keys::{KeyMaterial, KeyStore, KEY_LEN};
pub use state::{LoadOutcome, StateStore};
