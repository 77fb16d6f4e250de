//! Wallet key custody
//!
//! Provides keypair generation, encrypted storage format and signer
//! reconstruction.

mod encryption;
mod generator;
mod signer;

pub use encryption::{decrypt, encrypt, EncryptedBlob, MasterSecret};
pub use generator::{generate_wallet, GeneratedWallet};
pub use signer::resolve_signer;
