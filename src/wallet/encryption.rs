//! Private key encryption using AES-256-GCM under a SHA-256 derived master key
//!
//! Wire format: `base64(nonce[12] || tag[16] || ciphertext)`.

use crate::error::{CustodyError, Result};
use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Key, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Process-wide secret all wallet keys are encrypted under
pub struct MasterSecret {
    key: Zeroizing<Vec<u8>>,
}

impl MasterSecret {
    /// Derive the symmetric key. Empty secrets are a configuration error.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(CustodyError::Configuration(
                "ENCRYPTION_SECRET must not be empty".to_string(),
            ));
        }
        let key = Zeroizing::new(Sha256::digest(secret).to_vec());
        Ok(Self { key })
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]))
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

/// Base64 `nonce || tag || ciphertext`, opaque outside this module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct EncryptedBlob(String);

impl EncryptedBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EncryptedBlob {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Encrypt a short secret under the master key with a fresh random nonce
pub fn encrypt(plaintext: &str, secret: &MasterSecret) -> Result<EncryptedBlob> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = secret
        .cipher()
        .encrypt_in_place_detached(Nonce::from_slice(&nonce_bytes), b"", &mut buffer)
        .map_err(|e| CustodyError::MalformedInput(format!("encryption failed: {}", e)))?;

    let mut payload = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&tag);
    payload.extend_from_slice(&buffer);

    Ok(EncryptedBlob(STANDARD.encode(payload)))
}

/// Decrypt a blob. The tag is verified before any plaintext is released.
pub fn decrypt(blob: &EncryptedBlob, secret: &MasterSecret) -> Result<Zeroizing<String>> {
    let payload = STANDARD
        .decode(blob.as_str())
        .map_err(|e| CustodyError::MalformedInput(format!("invalid base64: {}", e)))?;

    if payload.len() < NONCE_LEN + TAG_LEN {
        return Err(CustodyError::MalformedInput(format!(
            "expected at least {} bytes, got {}",
            NONCE_LEN + TAG_LEN,
            payload.len()
        )));
    }

    let (nonce, rest) = payload.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    secret
        .cipher()
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| CustodyError::AuthenticationFailure)?;

    let text = std::str::from_utf8(&buffer)
        .map_err(|_| CustodyError::MalformedInput("plaintext is not UTF-8".to_string()))?;
    Ok(Zeroizing::new(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> MasterSecret {
        MasterSecret::new(b"my_secure_password").unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let secret = secret();
        for plaintext in ["", "a", "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T"] {
            let blob = encrypt(plaintext, &secret).unwrap();
            assert_eq!(decrypt(&blob, &secret).unwrap().as_str(), plaintext);
        }
    }

    #[test]
    fn test_wrong_secret() {
        let blob = encrypt("private", &secret()).unwrap();
        let other = MasterSecret::new(b"wrong_password").unwrap();

        let result = decrypt(&blob, &other);
        assert!(matches!(result, Err(CustodyError::AuthenticationFailure)));
    }

    #[test]
    fn test_any_bit_flip_fails_authentication() {
        let secret = secret();
        let blob = encrypt("sensitive key material", &secret).unwrap();
        let raw = STANDARD.decode(blob.as_str()).unwrap();

        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                let tampered = EncryptedBlob::from(STANDARD.encode(&tampered));
                assert!(
                    matches!(decrypt(&tampered, &secret), Err(CustodyError::AuthenticationFailure)),
                    "flip of byte {} bit {} was not detected",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let secret = secret();
        let a = STANDARD.decode(encrypt("same", &secret).unwrap().as_str()).unwrap();
        let b = STANDARD.decode(encrypt("same", &secret).unwrap().as_str()).unwrap();

        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_layout() {
        let blob = encrypt("abc", &secret()).unwrap();
        let raw = STANDARD.decode(blob.as_str()).unwrap();
        assert_eq!(raw.len(), NONCE_LEN + TAG_LEN + 3);
    }

    #[test]
    fn test_malformed_input() {
        let secret = secret();

        let short = EncryptedBlob::from(STANDARD.encode([0u8; 27]));
        assert!(matches!(decrypt(&short, &secret), Err(CustodyError::MalformedInput(_))));

        let not_base64 = EncryptedBlob::from("not base64!!".to_string());
        assert!(matches!(decrypt(&not_base64, &secret), Err(CustodyError::MalformedInput(_))));
    }

    #[test]
    fn test_empty_secret_is_configuration_error() {
        assert!(matches!(MasterSecret::new(b""), Err(CustodyError::Configuration(_))));
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", secret()), "MasterSecret(<redacted>)");
    }
}
