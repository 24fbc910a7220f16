//! Cryptography used by the store: the fixed-secret payload cipher and the
//! hashing/derivation helpers it is built on.

pub mod cipher;
pub mod integrity;
