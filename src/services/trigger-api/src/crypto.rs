//! # Token Cipher
//!
//! AES-256-GCM encryption for third-party API tokens stored at rest.
//! Ciphertexts are base64-encoded `nonce || ciphertext+tag` so a single
//! column holds everything needed to decrypt.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{ApiError, Result};

/// 96-bit nonce, the GCM default.
const NONCE_LEN: usize = 12;

/// Encrypts and decrypts bot tokens with a process-wide key.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let key_bytes = BASE64
            .decode(encoded)
            .map_err(|e| ApiError::configuration(format!("Invalid encryption key: {}", e)))?;
        if key_bytes.len() != 32 {
            return Err(ApiError::configuration(format!(
                "Encryption key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt a plaintext token. Every call uses a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| ApiError::crypto("Token encryption failed"))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypt a base64 `nonce || ciphertext+tag` blob.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|_| ApiError::crypto("Ciphertext is not valid base64"))?;
        if combined.len() <= NONCE_LEN {
            return Err(ApiError::crypto("Ciphertext too short"));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| ApiError::crypto("Token decryption failed"))?;
        String::from_utf8(plaintext).map_err(|_| ApiError::crypto("Decrypted token is not UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TokenCipher {
        let key = BASE64.encode([7u8; 32]);
        TokenCipher::from_base64_key(&key).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();
        let token = "123456789:AAHn-exampleTelegramBotToken";
        let encrypted = cipher.encrypt(token).unwrap();
        assert_ne!(encrypted, token);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), token);
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = cipher();
        let a = cipher.encrypt("same-token").unwrap();
        let b = cipher.encrypt("same-token").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_rejects_tampered_ciphertext() {
        let cipher = cipher();
        let mut bytes = BASE64.decode(cipher.encrypt("token").unwrap()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(cipher.decrypt(&BASE64.encode(bytes)).is_err());
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        let key = BASE64.encode([7u8; 16]);
        assert!(TokenCipher::from_base64_key(&key).is_err());
    }
}
