//! Encryption boundary for credential payloads.
//!
//! ChaCha20-Poly1305 with a SHA-256 derived key. Ciphertext is stored as
//! `enc2:` + base64(nonce || ciphertext || tag). A payload that is already a
//! JSON object is treated as plaintext and passed through unchanged.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};

pub const ENCRYPTED_PREFIX: &str = "enc2:";

const NONCE_SIZE: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,
    /// Wrong key or tampered data.
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("invalid base64")]
    InvalidBase64,
    #[error("invalid utf-8")]
    InvalidUtf8,
    #[error("payload json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a json object")]
    NotAnObject,
}

#[derive(Clone)]
pub struct Encryptor {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}

impl Encryptor {
    pub fn new(secret: &str) -> Self {
        let key = derive_key(secret);
        Self::from_raw_key(&key)
    }

    pub fn from_raw_key(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    pub fn is_encrypted(text: &str) -> bool {
        text.starts_with(ENCRYPTED_PREFIX)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(format!("{ENCRYPTED_PREFIX}{}", BASE64.encode(&combined)))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, CryptoError> {
        let encoded = encrypted
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or(CryptoError::InvalidFormat)?;
        let combined = BASE64
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidBase64)?;
        if combined.len() < NONCE_SIZE {
            return Err(CryptoError::InvalidFormat);
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Serializes `payload` and encrypts it; store the result as a JSON string.
    pub fn encrypt_payload(&self, payload: &JsonValue) -> Result<String, CryptoError> {
        let plaintext = serde_json::to_string(payload)?;
        self.encrypt(&plaintext)
    }

    /// Inverse of [`encrypt_payload`](Self::encrypt_payload). Anything that is
    /// not a string (a plain object injected for dev/test) passes through.
    pub fn decrypt_value(&self, stored: &JsonValue) -> Result<JsonValue, CryptoError> {
        match stored {
            JsonValue::String(ciphertext) => {
                let plaintext = self.decrypt(ciphertext)?;
                Ok(serde_json::from_str(&plaintext)?)
            }
            other => Ok(other.clone()),
        }
    }

    /// Decrypted provider fields, in payload order.
    pub fn decrypt_payload(
        &self,
        stored: &JsonValue,
    ) -> Result<Map<String, JsonValue>, CryptoError> {
        match self.decrypt_value(stored)? {
            JsonValue::Object(fields) => Ok(fields),
            _ => Err(CryptoError::NotAnObject),
        }
    }
}

fn derive_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}
