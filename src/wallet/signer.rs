//! Rebuilds a signing keypair from an encrypted wallet record

use super::encryption::{decrypt, EncryptedBlob, MasterSecret};
use crate::error::{CustodyError, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::signer::keypair::keypair_from_seed;
use std::str::FromStr;
use tracing::error;
use zeroize::Zeroizing;

/// Decrypt a wallet's private key and materialize its signer.
///
/// The keypair is re-derived from the 32-byte seed and must agree with both
/// the public half of the stored keypair and the separately stored public key.
pub fn resolve_signer(
    encrypted_public_key: &EncryptedBlob,
    encrypted_private_key: &EncryptedBlob,
    secret: &MasterSecret,
) -> Result<Keypair> {
    let secret_text = decrypt(encrypted_private_key, secret)?;
    let public_text = decrypt(encrypted_public_key, secret)?;

    let expected = Pubkey::from_str(public_text.trim())
        .map_err(|_| integrity("stored public key is not a valid address"))?;

    let bytes = Zeroizing::new(
        bs58::decode(secret_text.as_str())
            .into_vec()
            .map_err(|_| integrity("private key is not valid base58"))?,
    );
    if bytes.len() != 64 {
        return Err(integrity(&format!(
            "private key is {} bytes, expected 64",
            bytes.len()
        )));
    }

    let keypair = keypair_from_seed(&bytes[..32])
        .map_err(|_| integrity("private key seed is unusable"))?;

    if keypair.pubkey().to_bytes()[..] != bytes[32..] {
        return Err(integrity("public half of stored keypair does not match its seed"));
    }
    if keypair.pubkey() != expected {
        return Err(integrity("stored public key does not match private key"));
    }

    Ok(keypair)
}

fn integrity(detail: &str) -> CustodyError {
    error!("[Signer] Integrity violation: {}", detail);
    CustodyError::IntegrityViolation(detail.to_string())
}
