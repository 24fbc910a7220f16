//! Fixed-secret DES-CBC cipher for the store payload.
//! The key and IV are both derived from the configured secret, so the same
//! secret and plaintext always yield the same ciphertext text.

use base64::{engine::general_purpose::STANDARD, Engine};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::Des;
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::integrity::hkdf_expand;

type DesCbcEnc = cbc::Encryptor<Des>;
type DesCbcDec = cbc::Decryptor<Des>;

const DES_BLOCK_LEN: usize = 8;
const KDF_SALT: &[u8] = b"secure-store/v1";
const KEY_INFO: &[u8] = b"des-key";
const IV_INFO: &[u8] = b"des-iv";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("secret must not be empty")]
    EmptySecret,
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
    #[error("cipher setup failed: {0}")]
    Setup(String),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Symmetric cipher keyed from a text secret.
pub struct StoreCipher {
    key: [u8; DES_BLOCK_LEN],
    iv: [u8; DES_BLOCK_LEN],
}

impl StoreCipher {
    pub fn new(secret: &str) -> Result<Self, CipherError> {
        if secret.is_empty() {
            return Err(CipherError::EmptySecret);
        }
        let mut key = [0u8; DES_BLOCK_LEN];
        let mut iv = [0u8; DES_BLOCK_LEN];
        let mut key_bytes = derive(secret, KEY_INFO)?;
        let mut iv_bytes = derive(secret, IV_INFO)?;
        key.copy_from_slice(&key_bytes);
        iv.copy_from_slice(&iv_bytes);
        key_bytes.zeroize();
        iv_bytes.zeroize();
        Ok(Self { key, iv })
    }

    /// Encrypts text and returns the ciphertext as padded base64.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let encryptor = DesCbcEnc::new_from_slices(&self.key, &self.iv)
            .map_err(|e| CipherError::Setup(format!("{e}")))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(STANDARD.encode(ciphertext))
    }

    /// Reverses [`StoreCipher::encrypt`]. Fails when the text is not base64,
    /// the padding does not check out, or the plaintext is not UTF-8.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let ciphertext = STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| CipherError::Base64DecodeFailed(format!("{e}")))?;
        if ciphertext.is_empty() || ciphertext.len() % DES_BLOCK_LEN != 0 {
            return Err(CipherError::DecryptionFailed(format!(
                "ciphertext length {} is not a whole number of blocks",
                ciphertext.len()
            )));
        }

        let decryptor = DesCbcDec::new_from_slices(&self.key, &self.iv)
            .map_err(|e| CipherError::Setup(format!("{e}")))?;
        let plaintext = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::DecryptionFailed("bad padding".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|e| CipherError::DecryptionFailed(format!("plaintext is not utf-8: {e}")))
    }
}

impl Drop for StoreCipher {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

fn derive(secret: &str, info: &[u8]) -> Result<Vec<u8>, CipherError> {
    hkdf_expand(secret.as_bytes(), KDF_SALT, info, DES_BLOCK_LEN)
        .map_err(|e| CipherError::DerivationFailed(format!("{e}")))
}
