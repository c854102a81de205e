//! At-rest encryption for client secrets.
//!
//! AES-256-GCM with a fresh random nonce per call. The nonce is prepended to
//! the ciphertext and the combined bytes are base64-encoded behind a `v1:`
//! version prefix, so the blob format can evolve under future key rotation.

use aes_gcm::{
    aead::{Aead, OsRng},
    AeadCore, Aes256Gcm, KeyInit,
};
use base64::Engine;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AppError;

const BLOB_VERSION: &str = "v1";
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for client secrets.
///
/// The key is process-wide, read-only after initialization, and scrubbed
/// from memory on drop.
pub struct SecretCipher {
    key: ZeroizeKey,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct ZeroizeKey([u8; 32]);

impl Clone for SecretCipher {
    fn clone(&self) -> Self {
        Self {
            key: ZeroizeKey(self.key.0),
        }
    }
}

impl SecretCipher {
    /// Create from a base64-encoded 32-byte key (out-of-band configuration).
    pub fn from_base64(key_b64: &str) -> Result<Self, AppError> {
        let mut key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_b64)
            .map_err(|e| {
                AppError::Config(anyhow::anyhow!("ENCRYPTION_KEY is not valid base64: {}", e))
            })?;
        if key_bytes.len() != 32 {
            key_bytes.zeroize();
            return Err(AppError::Config(anyhow::anyhow!(
                "ENCRYPTION_KEY must be exactly 32 bytes (base64-encoded)"
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        key_bytes.zeroize();
        Ok(Self {
            key: ZeroizeKey(key),
        })
    }

    /// Encrypt plaintext into a text-safe blob: `v1:` + base64(nonce || ciphertext).
    #[allow(deprecated)] // aes-gcm 0.10 uses generic-array 0.x internally
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key.0).map_err(|_| {
            tracing::error!("Cipher construction failed: invalid key length");
            AppError::Codec
        })?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher.encrypt(&nonce, plaintext.as_bytes()).map_err(|e| {
            tracing::error!(error = %e, "Secret encryption failed");
            AppError::Codec
        })?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(format!(
            "{}:{}",
            BLOB_VERSION,
            base64::engine::general_purpose::STANDARD.encode(combined)
        ))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails closed on an unknown version, malformed base64, truncated input,
    /// or tag verification failure; never returns partial plaintext.
    #[allow(deprecated)]
    pub fn decrypt(&self, blob: &str) -> Result<String, AppError> {
        let encoded = blob
            .strip_prefix(&format!("{}:", BLOB_VERSION))
            .ok_or_else(|| {
                tracing::error!("Secret blob has unknown version prefix");
                AppError::Codec
            })?;

        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| {
                tracing::error!(error = %e, "Secret blob is not valid base64");
                AppError::Codec
            })?;

        if combined.len() <= NONCE_LEN {
            tracing::error!("Secret blob too short to contain nonce and ciphertext");
            return Err(AppError::Codec);
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key.0).map_err(|_| AppError::Codec)?;
        let plaintext = cipher
            .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| {
                tracing::error!(error = %e, "Secret decryption failed");
                AppError::Codec
            })?;

        String::from_utf8(plaintext).map_err(|_| AppError::Codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> SecretCipher {
        let key = [42u8; 32];
        let key_b64 = base64::engine::general_purpose::STANDARD.encode(key);
        SecretCipher::from_base64(&key_b64).unwrap()
    }

    #[test]
    fn roundtrip() {
        let cipher = test_cipher();
        let plaintext = "super-secret-client-credential";

        let blob = cipher.encrypt(plaintext).unwrap();
        assert!(blob.starts_with("v1:"));
        assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn fresh_nonce_per_call() {
        let cipher = test_cipher();
        let blob1 = cipher.encrypt("same-plaintext").unwrap();
        let blob2 = cipher.encrypt("same-plaintext").unwrap();
        assert_ne!(blob1, blob2);
    }

    #[test]
    fn tampered_blob_fails_closed() {
        let cipher = test_cipher();
        let blob = cipher.encrypt("plaintext").unwrap();

        let mut combined = base64::engine::general_purpose::STANDARD
            .decode(blob.strip_prefix("v1:").unwrap())
            .unwrap();
        let last = combined.len() - 1;
        combined[last] ^= 0x01;
        let tampered = format!(
            "v1:{}",
            base64::engine::general_purpose::STANDARD.encode(combined)
        );

        assert!(matches!(cipher.decrypt(&tampered), Err(AppError::Codec)));
    }

    #[test]
    fn malformed_input_fails_closed() {
        let cipher = test_cipher();
        assert!(matches!(cipher.decrypt("garbage"), Err(AppError::Codec)));
        assert!(matches!(
            cipher.decrypt("v1:not-base64!!!"),
            Err(AppError::Codec)
        ));
        assert!(matches!(cipher.decrypt("v1:AAAA"), Err(AppError::Codec)));
        assert!(matches!(
            cipher.decrypt("v2:AAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
            Err(AppError::Codec)
        ));
    }

    #[test]
    fn rejects_wrong_size_keys() {
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(SecretCipher::from_base64(&short).is_err());
        assert!(SecretCipher::from_base64("*not base64*").is_err());
    }
}
