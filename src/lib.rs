//! Whacklet custodial wallet core
//!
//! Keeps named Solana wallets for chat users, encrypted at rest under a single
//! master secret, and performs transfers and Token-2022 NFT mints on their behalf.
//!
//! 1. **Custody**: keypairs are generated server-side, both halves are sealed
//!    with AES-256-GCM, and signers are rebuilt and checked only when a command
//!    needs one.
//!
//! 2. **Transactions**: instruction sequences are ordered plans validated before
//!    any network call, then signed and submitted with typed failure outcomes.

pub mod config;
pub mod custody;
pub mod db;
pub mod error;
pub mod registry;
pub mod rpc;
pub mod submitter;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use config::Config;
pub use custody::Custodian;
pub use db::{Database, MintedAsset};
pub use error::{CustodyError, Result, SubmissionError};
pub use registry::WalletRegistry;
pub use rpc::{ChainRpc, SolanaRpc};
pub use submitter::Submitter;
pub use transaction::{NftMetadata, TransactionBuilder};
pub use types::{
    MintReceipt, NftTransferReceipt, TokenHolding, TransferReceipt, WalletBalance, WalletInfo,
};
pub use wallet::{decrypt, encrypt, generate_wallet, resolve_signer, EncryptedBlob, GeneratedWallet, MasterSecret};
