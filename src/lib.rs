//! Encrypted key/value store kept in memory and persisted as a whole to one
//! backing file. The file holds a single framed string: the DES ciphertext of
//! the store's JSON document.

pub mod config;
pub mod crypto;
pub mod framing;
pub mod store;

pub use config::StoreConfig;
pub use store::{LoadOutcome, Persist, SecureStore, StoreError};
