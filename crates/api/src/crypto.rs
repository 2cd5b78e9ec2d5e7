//! Credential encryption
//!
//! Provider API keys are stored under AES-256-GCM with a server-held key.
//! A fresh 12-byte nonce is generated per value and prepended to the
//! ciphertext, so each stored blob decrypts on its own.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid key length (expected base64 of 32 bytes)")]
    InvalidKeyLength,
}

pub struct SecretsCipher {
    cipher: Aes256Gcm,
}

impl SecretsCipher {
    pub fn new(key_base64: &str) -> Result<Self, CryptoError> {
        let key_bytes = BASE64
            .decode(key_base64)
            .map_err(|_| CryptoError::InvalidKeyLength)?;

        if key_bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength);
        }

        if key_bytes.iter().all(|&b| b == key_bytes[0]) {
            tracing::warn!("Credential encryption key has uniform bytes - replace it");
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut blob = Vec::with_capacity(12 + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<String, CryptoError> {
        if blob.len() < 12 {
            return Err(CryptoError::DecryptionFailed("blob too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

/// Masked preview of a stored key: first 3 + last 4 characters. Keys too
/// short to mask safely collapse to a fixed placeholder so the original can
/// never be reconstructed from the preview.
pub fn mask_key(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 32 bytes of "abcdefghijklmnopqrstuvwxyz123456" in base64
    const TEST_KEY: &str = "YWJjZGVmZ2hpamtsbW5vcHFyc3R1dnd4eXoxMjM0NTY=";

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = SecretsCipher::new(TEST_KEY).unwrap();

        let plaintext = "sk-my-provider-key-12345";
        let blob = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&blob).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_nonce_varies_per_encryption() {
        let cipher = SecretsCipher::new(TEST_KEY).unwrap();
        let a = cipher.encrypt("same-value").unwrap();
        let b = cipher.encrypt("same-value").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_blob_fails() {
        let cipher = SecretsCipher::new(TEST_KEY).unwrap();
        let mut blob = cipher.encrypt("sk-value").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(cipher.decrypt(&blob).is_err());
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(SecretsCipher::new("dG9vLXNob3J0").is_err());
        assert!(SecretsCipher::new("not base64 !!!").is_err());
    }

    #[test]
    fn test_mask_key_preview() {
        assert_eq!(mask_key("sk-ABCDEFGHIJKL"), "sk-...IJKL");
        let masked = mask_key("sk-ABCDEFGHIJKL");
        assert_ne!(masked, "sk-ABCDEFGHIJKL");
    }

    #[test]
    fn test_mask_key_short_values_collapse() {
        assert_eq!(mask_key("sk-12345"), "***");
        assert_eq!(mask_key(""), "***");
    }
}
