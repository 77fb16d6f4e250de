//! Result values handed back to the command layer

use rust_decimal::Decimal;
use serde::Serialize;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use std::fmt;

/// Decimal exponent of SOL relative to lamports
pub const SOL_DECIMALS: u32 = 9;

/// A wallet as shown to its owner
#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub id: i64,
    pub name: String,
    pub public_key: String,
    pub is_default: bool,
}

/// Native balance of a named wallet
#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub name: String,
    pub address: String,
    pub lamports: u64,
    pub sol: Decimal,
}

impl WalletBalance {
    pub fn new(name: String, address: String, lamports: u64) -> Self {
        Self {
            name,
            address,
            lamports,
            sol: lamports_to_sol(lamports),
        }
    }
}

impl fmt::Display for WalletBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} SOL", self.sol)
    }
}

/// Outcome of a native SOL transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub wallet_name: String,
    pub from: String,
    pub to: String,
    pub lamports: u64,
    pub sol: Decimal,
    pub signature: String,
}

/// Outcome of an NFT mint
#[derive(Debug, Clone, Serialize)]
pub struct MintReceipt {
    pub name: String,
    pub mint_address: String,
    pub holding_account: String,
    pub signature: String,
}

/// Outcome of an NFT transfer
#[derive(Debug, Clone, Serialize)]
pub struct NftTransferReceipt {
    pub wallet_name: String,
    pub from: String,
    pub to: String,
    pub mint_address: String,
    pub created_receiver_account: bool,
    pub signature: String,
}

/// One token account held by an owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenHolding {
    pub account: String,
    pub mint: String,
    /// UI amount as reported by the node, already scaled by `decimals`
    pub amount: String,
    pub decimals: u8,
}

/// Convert lamports into SOL without floating point
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    (Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)).normalize()
}
