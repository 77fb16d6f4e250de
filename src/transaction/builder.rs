//! Builds native transfer, NFT mint and NFT transfer transactions
//!
//! Builders fetch a fresh blockhash right before assembling and never submit.

use super::amount::parse_sol_amount;
use super::plan::{Step, TransactionPlan};
use crate::error::{CustodyError, Result};
use crate::rpc::ChainRpc;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account,
};
use spl_token_2022::extension::{metadata_pointer, ExtensionType};
use spl_token_2022::instruction::{initialize_mint, mint_to, set_authority, transfer_checked, AuthorityType};
use spl_token_2022::state::Mint;
use spl_token_metadata_interface::state::TokenMetadata;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Longest NFT name accepted for inline metadata, in bytes
pub const MAX_NAME_LEN: usize = 32;
/// Longest NFT symbol accepted for inline metadata, in bytes
pub const MAX_SYMBOL_LEN: usize = 10;
/// Longest metadata URI accepted for inline metadata, in bytes
pub const MAX_URI_LEN: usize = 200;

/// NFTs are a single indivisible unit
const NFT_DECIMALS: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    NativeTransfer,
    NftMint,
    NftTransfer,
}

/// An unsigned transaction ready for the submitter
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub kind: OperationKind,
    pub fee_payer: Pubkey,
    pub plan: TransactionPlan,
    pub recent_blockhash: Hash,
}

/// A native transfer along with its resolved amount and destination
#[derive(Debug)]
pub struct NativeTransferDraft {
    pub transaction: BuiltTransaction,
    pub to: Pubkey,
    pub lamports: u64,
}

/// A mint transaction; the fresh mint keypair must co-sign it
#[derive(Debug)]
pub struct NftMintDraft {
    pub transaction: BuiltTransaction,
    pub mint: Keypair,
    pub holding_account: Pubkey,
}

#[derive(Debug)]
pub struct NftTransferDraft {
    pub transaction: BuiltTransaction,
    pub to: Pubkey,
    pub mint: Pubkey,
    pub creates_receiver_account: bool,
}

/// Inline metadata for a new NFT
#[derive(Debug, Clone)]
pub struct NftMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

impl NftMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            uri: uri.into(),
        }
    }

    /// Reject metadata that cannot be stored inline
    pub fn validate(&self) -> Result<()> {
        check_field("name", &self.name, MAX_NAME_LEN)?;
        check_field("symbol", &self.symbol, MAX_SYMBOL_LEN)?;
        check_field("uri", &self.uri, MAX_URI_LEN)
    }
}

fn check_field(field: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() {
        return Err(CustodyError::build(format!("{} must not be empty", field)));
    }
    if value.len() > max {
        return Err(CustodyError::build(format!(
            "{} is {} bytes, inline metadata allows at most {}",
            field,
            value.len(),
            max
        )));
    }
    Ok(())
}

/// Parse a user-supplied base58 address
pub fn parse_address(value: &str) -> Result<Pubkey> {
    let trimmed = value.trim();
    Pubkey::from_str(trimmed).map_err(|_| CustodyError::InvalidAddress(trimmed.to_string()))
}

/// Account sizes for a metadata-carrying mint
fn mint_account_sizes(metadata: &TokenMetadata) -> Result<(usize, usize)> {
    let mint_len = ExtensionType::try_calculate_account_len::<Mint>(&[ExtensionType::MetadataPointer])
        .map_err(CustodyError::build)?;
    let metadata_len = metadata.tlv_size_of().map_err(CustodyError::build)?;
    Ok((mint_len, metadata_len))
}

/// Assembles transactions against a live blockhash
pub struct TransactionBuilder {
    rpc: Arc<dyn ChainRpc>,
}

impl TransactionBuilder {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    /// Move `amount` SOL from the payer to `to`
    pub async fn native_transfer(&self, payer: &Pubkey, to: &str, amount: &str) -> Result<NativeTransferDraft> {
        let to = parse_address(to)?;
        let lamports = parse_sol_amount(amount)?;

        let mut plan = TransactionPlan::new();
        plan.push(Step::NativeTransfer, system_instruction::transfer(payer, &to, lamports));

        let transaction = self.finish(OperationKind::NativeTransfer, payer, plan).await?;
        Ok(NativeTransferDraft {
            transaction,
            to,
            lamports,
        })
    }

    /// Create a Token-2022 NFT with inline metadata and mint one unit to the payer
    pub async fn nft_mint(&self, payer: &Pubkey, metadata: &NftMetadata) -> Result<NftMintDraft> {
        metadata.validate()?;

        let mint = Keypair::new();
        let mint_pubkey = mint.pubkey();
        let token_program = spl_token_2022::id();

        let token_metadata = TokenMetadata {
            mint: mint_pubkey,
            name: metadata.name.clone(),
            symbol: metadata.symbol.clone(),
            uri: metadata.uri.clone(),
            ..Default::default()
        };
        let (mint_len, metadata_len) = mint_account_sizes(&token_metadata)?;

        // the mint account grows into the metadata on initialization, so fund both up front
        let lamports = self
            .rpc
            .get_minimum_balance_for_rent_exemption(mint_len + metadata_len)
            .await?;

        let holding_account =
            get_associated_token_address_with_program_id(payer, &mint_pubkey, &token_program);

        debug!(
            "[Builder] Mint {} needs {} + {} bytes, {} lamports",
            mint_pubkey, mint_len, metadata_len, lamports
        );

        let mut plan = TransactionPlan::new();
        plan.push(
            Step::CreateMintAccount,
            system_instruction::create_account(payer, &mint_pubkey, lamports, mint_len as u64, &token_program),
        )
        .push(
            Step::InitializeMetadataPointer,
            metadata_pointer::instruction::initialize(
                &token_program,
                &mint_pubkey,
                Some(*payer),
                Some(mint_pubkey),
            )
            .map_err(CustodyError::build)?,
        )
        .push(
            Step::InitializeMint,
            initialize_mint(&token_program, &mint_pubkey, payer, None, NFT_DECIMALS)
                .map_err(CustodyError::build)?,
        )
        .push(
            Step::InitializeMetadata,
            spl_token_metadata_interface::instruction::initialize(
                &token_program,
                &mint_pubkey,
                payer,
                &mint_pubkey,
                payer,
                metadata.name.clone(),
                metadata.symbol.clone(),
                metadata.uri.clone(),
            ),
        )
        .push(
            Step::CreateHoldingAccount,
            create_associated_token_account(payer, payer, &mint_pubkey, &token_program),
        )
        .push(
            Step::MintOne,
            mint_to(&token_program, &mint_pubkey, &holding_account, payer, &[], 1)
                .map_err(CustodyError::build)?,
        )
        .push(
            Step::RevokeMintAuthority,
            set_authority(
                &token_program,
                &mint_pubkey,
                None,
                AuthorityType::MintTokens,
                payer,
                &[],
            )
            .map_err(CustodyError::build)?,
        );

        let transaction = self.finish(OperationKind::NftMint, payer, plan).await?;
        Ok(NftMintDraft {
            transaction,
            mint,
            holding_account,
        })
    }

    /// Send one unit of `mint` from the payer's holding account to `to`'s
    pub async fn nft_transfer(&self, payer: &Pubkey, to: &str, mint: &str) -> Result<NftTransferDraft> {
        let to = parse_address(to)?;
        let mint = parse_address(mint)?;
        let token_program = spl_token_2022::id();

        let sender_account = get_associated_token_address_with_program_id(payer, &mint, &token_program);
        let receiver_account = get_associated_token_address_with_program_id(&to, &mint, &token_program);

        let creates_receiver_account = !self.rpc.account_exists(&receiver_account).await?;

        let mut plan = TransactionPlan::new();
        if creates_receiver_account {
            plan.push(
                Step::CreateReceiverHoldingAccount,
                create_associated_token_account(payer, &to, &mint, &token_program),
            );
        }
        plan.push(
            Step::TransferOne,
            transfer_checked(
                &token_program,
                &sender_account,
                &mint,
                &receiver_account,
                payer,
                &[],
                1,
                NFT_DECIMALS,
            )
            .map_err(CustodyError::build)?,
        );

        let transaction = self.finish(OperationKind::NftTransfer, payer, plan).await?;
        Ok(NftTransferDraft {
            transaction,
            to,
            mint,
            creates_receiver_account,
        })
    }

    /// Validate ordering, then attach a blockhash fetched at this moment
    async fn finish(&self, kind: OperationKind, payer: &Pubkey, plan: TransactionPlan) -> Result<BuiltTransaction> {
        plan.validate()?;
        let recent_blockhash = self.rpc.get_latest_blockhash().await?;

        Ok(BuiltTransaction {
            kind,
            fee_payer: *payer,
            plan,
            recent_blockhash,
        })
    }
}
