// ABOUTME: AES-256-GCM token cipher with nonce-prepended base64 ciphertext
// ABOUTME: Encrypts OAuth tokens before storage; decrypt failure means re-authorize
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Symmetric cipher for OAuth tokens at rest.
//!
//! Layout: 12-byte random nonce prepended to the AES-256-GCM ciphertext,
//! base64 (STANDARD) encoded. The key is process-wide, loaded once at
//! startup from configuration.
//!
//! Empty input maps to empty output in both directions, so optional token
//! columns can be piped through the cipher without special-casing.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::errors::CryptoError;

/// GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Symmetric encrypt/decrypt for stored credentials.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
}

impl TokenCipher {
    /// Create a cipher from raw key bytes.
    #[must_use]
    pub const fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Create a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid base64: {e}")))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("key must be exactly 32 bytes".to_owned()))?;
        Ok(Self { key })
    }

    /// Generate a random key, base64-encoded, for development setups.
    #[must_use]
    pub fn generate_key() -> String {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        BASE64_STANDARD.encode(key)
    }

    /// Encrypt a plaintext token. Empty input returns an empty string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(BASE64_STANDARD.encode(result))
    }

    /// Decrypt a stored token. Empty input returns an empty string.
    ///
    /// Any failure means the stored credentials are unusable; the caller
    /// must force re-authorization rather than retry.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let data = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::MalformedCiphertext(format!("invalid base64: {e}")))?;

        if data.len() < NONCE_LEN {
            return Err(CryptoError::MalformedCiphertext(
                "ciphertext shorter than nonce".to_owned(),
            ));
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = GenericArray::from_slice(&data[..NONCE_LEN]);

        let plaintext = cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|_| CryptoError::DecryptFailed)?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::MalformedCiphertext("plaintext is not utf-8".to_owned()))
    }
}
