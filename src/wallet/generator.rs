//! Wallet generation using solana-sdk

use solana_sdk::signature::{Keypair, Signer};
use zeroize::Zeroizing;

/// A newly generated wallet in its at-rest text forms
pub struct GeneratedWallet {
    /// Base58 public key
    pub public_key: String,
    /// Base58 of the 64-byte `secret || public` keypair - never logged
    pub secret_key: Zeroizing<String>,
}

/// Generate a new random wallet
pub fn generate_wallet() -> GeneratedWallet {
    let keypair = Keypair::new();
    let bytes = Zeroizing::new(keypair.to_bytes().to_vec());

    GeneratedWallet {
        public_key: keypair.pubkey().to_string(),
        secret_key: Zeroizing::new(bs58::encode(&bytes[..]).into_string()),
    }
}
