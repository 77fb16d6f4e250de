//! Command-level operations over the registry, builder and submitter
//!
//! Every operation that spends funds resolves the default wallet once at the
//! start and uses that wallet for the rest of the command.

use crate::db::{Database, MintedAsset};
use crate::error::Result;
use crate::registry::WalletRegistry;
use crate::rpc::ChainRpc;
use crate::submitter::Submitter;
use crate::transaction::{NftMetadata, TransactionBuilder};
use crate::types::{
    lamports_to_sol, MintReceipt, NftTransferReceipt, TokenHolding, TransferReceipt, WalletBalance,
    WalletInfo,
};
use crate::wallet::MasterSecret;
use solana_sdk::signature::Signer;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Custodian {
    db: Arc<Database>,
    registry: WalletRegistry,
    rpc: Arc<dyn ChainRpc>,
    builder: TransactionBuilder,
    submitter: Submitter,
}

impl Custodian {
    pub fn new(db: Arc<Database>, secret: Arc<MasterSecret>, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            registry: WalletRegistry::new(db.clone(), secret),
            builder: TransactionBuilder::new(rpc.clone()),
            submitter: Submitter::new(rpc.clone()),
            db,
            rpc,
        }
    }

    pub async fn create_wallet(&self, chat_id: &str, name: &str) -> Result<String> {
        self.registry.get_or_create_wallet(chat_id, name).await
    }

    pub async fn list_wallets(&self, chat_id: &str) -> Result<Vec<WalletInfo>> {
        self.registry.list_wallets(chat_id).await
    }

    /// Balance of a named wallet
    pub async fn balance(&self, chat_id: &str, name: &str) -> Result<WalletBalance> {
        let wallet = self.registry.find_wallet(chat_id, name).await?;
        let address = self.registry.wallet_address(&wallet)?;
        let lamports = self.rpc.get_balance(&address).await?;

        Ok(WalletBalance::new(wallet.name, address.to_string(), lamports))
    }

    pub async fn default_wallet(&self, chat_id: &str) -> Result<WalletInfo> {
        self.registry.default_wallet_info(chat_id).await
    }

    pub async fn set_default_wallet(&self, chat_id: &str, name: &str) -> Result<WalletInfo> {
        self.registry.set_default_wallet(chat_id, name).await
    }

    /// Send native SOL from the default wallet
    pub async fn transfer(&self, chat_id: &str, to: &str, amount: &str) -> Result<TransferReceipt> {
        let wallet = self.registry.resolve_default(chat_id).await?;
        let payer = self.registry.signer(&wallet)?;

        let draft = self.builder.native_transfer(&payer.pubkey(), to, amount).await?;
        let signature = self.submitter.submit(&draft.transaction, &[&payer]).await?;

        info!(
            "[Custody] Chat {} sent {} lamports from '{}' to {}",
            chat_id, draft.lamports, wallet.name, draft.to
        );

        Ok(TransferReceipt {
            wallet_name: wallet.name,
            from: payer.pubkey().to_string(),
            to: draft.to.to_string(),
            lamports: draft.lamports,
            sol: lamports_to_sol(draft.lamports),
            signature: signature.to_string(),
        })
    }

    /// Mint a one-of-one NFT into the default wallet
    pub async fn create_nft(
        &self,
        chat_id: &str,
        name: &str,
        symbol: &str,
        uri: &str,
    ) -> Result<MintReceipt> {
        let user = self.registry.user(chat_id).await?;
        let wallet = self.registry.resolve_default(chat_id).await?;
        let payer = self.registry.signer(&wallet)?;

        let metadata = NftMetadata::new(name, symbol, uri);
        let draft = self.builder.nft_mint(&payer.pubkey(), &metadata).await?;
        let signature = self
            .submitter
            .submit(&draft.transaction, &[&payer, &draft.mint])
            .await?;

        let mint_address = draft.mint.pubkey().to_string();
        // the mint exists on chain now; losing the local record only affects listing
        if let Err(e) = self
            .db
            .record_minted_asset(user.id, &metadata.name, &mint_address)
            .await
        {
            warn!("[Custody] Minted {} but failed to record it: {}", mint_address, e);
        }

        info!("[Custody] Chat {} minted '{}' at {}", chat_id, metadata.name, mint_address);

        Ok(MintReceipt {
            name: metadata.name,
            mint_address,
            holding_account: draft.holding_account.to_string(),
            signature: signature.to_string(),
        })
    }

    /// Move one NFT unit from the default wallet
    pub async fn transfer_nft(&self, chat_id: &str, to: &str, mint: &str) -> Result<NftTransferReceipt> {
        let wallet = self.registry.resolve_default(chat_id).await?;
        let payer = self.registry.signer(&wallet)?;

        let draft = self.builder.nft_transfer(&payer.pubkey(), to, mint).await?;
        let signature = self.submitter.submit(&draft.transaction, &[&payer]).await?;

        info!(
            "[Custody] Chat {} sent NFT {} from '{}' to {}",
            chat_id, draft.mint, wallet.name, draft.to
        );

        Ok(NftTransferReceipt {
            wallet_name: wallet.name,
            from: payer.pubkey().to_string(),
            to: draft.to.to_string(),
            mint_address: draft.mint.to_string(),
            created_receiver_account: draft.creates_receiver_account,
            signature: signature.to_string(),
        })
    }

    /// Token-2022 accounts owned by the default wallet
    pub async fn token_holdings(&self, chat_id: &str) -> Result<Vec<TokenHolding>> {
        let wallet = self.registry.resolve_default(chat_id).await?;
        let owner = self.registry.wallet_address(&wallet)?;
        self.rpc.get_token_holdings(&owner, &spl_token_2022::id()).await
    }

    pub async fn minted_assets(&self, chat_id: &str) -> Result<Vec<MintedAsset>> {
        let user = self.registry.user(chat_id).await?;
        Ok(self.db.minted_assets_for_user(user.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CustodyError, SubmissionError};
    use crate::rpc::mock::MockRpc;
    use rust_decimal_macros::dec;
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    async fn custodian() -> (Arc<MockRpc>, Custodian) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let secret = Arc::new(MasterSecret::new(b"custody-test").unwrap());
        let rpc = Arc::new(MockRpc::new());
        (rpc.clone(), Custodian::new(db, secret, rpc))
    }

    fn fund(rpc: &MockRpc, address: &str, lamports: u64) {
        rpc.balances
            .lock()
            .unwrap()
            .insert(Pubkey::from_str(address).unwrap(), lamports);
    }

    #[tokio::test]
    async fn test_balance_by_name() {
        let (rpc, custodian) = custodian().await;
        custodian.create_wallet("42", "Bob").await.unwrap();
        let savings = custodian.create_wallet("42", "Savings").await.unwrap();
        fund(&rpc, &savings, 2_500_000_000);

        let balance = custodian.balance("42", "Savings").await.unwrap();
        assert_eq!(balance.address, savings);
        assert_eq!(balance.sol, dec!(2.5));

        assert!(matches!(
            custodian.balance("42", "Nope").await,
            Err(CustodyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transfer_from_default_wallet() {
        let (rpc, custodian) = custodian().await;
        let from = custodian.create_wallet("42", "Bob").await.unwrap();
        let to = Pubkey::new_unique().to_string();

        let receipt = custodian.transfer("42", &to, "0.25").await.unwrap();

        assert_eq!(receipt.from, from);
        assert_eq!(receipt.to, to);
        assert_eq!(receipt.lamports, 250_000_000);
        assert_eq!(rpc.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_balance_surfaces_submission_error() {
        let (rpc, custodian) = custodian().await;
        custodian.create_wallet("42", "Bob").await.unwrap();
        let before = custodian.list_wallets("42").await.unwrap();
        rpc.fail_sends_with(SubmissionError::SimulationFailed {
            detail: "insufficient lamports".into(),
            logs: vec!["Transfer: insufficient lamports 0, need 5000000000".into()],
        });

        let result = custodian
            .transfer("42", &Pubkey::new_unique().to_string(), "5")
            .await;

        assert!(matches!(
            result,
            Err(CustodyError::Submission(SubmissionError::SimulationFailed { .. }))
        ));
        let after = custodian.list_wallets("42").await.unwrap();
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].public_key, after[0].public_key);
        assert!(after[0].is_default);
        assert!(custodian.minted_assets("42").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_without_wallet() {
        let (rpc, custodian) = custodian().await;
        let result = custodian
            .transfer("7", &Pubkey::new_unique().to_string(), "1")
            .await;
        assert!(matches!(result, Err(CustodyError::NotFound(_))));
        assert_eq!(rpc.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_uri_never_reaches_network() {
        let (rpc, custodian) = custodian().await;
        custodian.create_wallet("42", "Bob").await.unwrap();
        let uri = "x".repeat(500);

        let result = custodian.create_nft("42", "Art", "ART", &uri).await;

        assert!(matches!(result, Err(CustodyError::BuildFailure(_))));
        assert_eq!(rpc.call_count(), 0);
        assert!(custodian.minted_assets("42").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_nft_records_asset() {
        let (rpc, custodian) = custodian().await;
        custodian.create_wallet("42", "Bob").await.unwrap();

        let receipt = custodian
            .create_nft("42", "Art", "ART", "https://example.com/art.json")
            .await
            .unwrap();

        let sent = rpc.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].signatures.len(), 2);

        let assets = custodian.minted_assets("42").await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].mint_address, receipt.mint_address);
        assert_eq!(assets[0].name, "Art");
    }

    #[tokio::test]
    async fn test_failed_mint_records_nothing() {
        let (rpc, custodian) = custodian().await;
        custodian.create_wallet("42", "Bob").await.unwrap();
        rpc.fail_sends_with(SubmissionError::Rejected("insufficient funds for rent".into()));

        let result = custodian.create_nft("42", "Art", "ART", "https://a").await;

        assert!(matches!(result, Err(CustodyError::Submission(_))));
        assert!(custodian.minted_assets("42").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_nft_uses_default_wallet() {
        let (_, custodian) = custodian().await;
        custodian.create_wallet("42", "Bob").await.unwrap();
        let second = custodian.create_wallet("42", "Vault").await.unwrap();
        custodian.set_default_wallet("42", "Vault").await.unwrap();

        let receipt = custodian
            .transfer_nft("42", &Pubkey::new_unique().to_string(), &Pubkey::new_unique().to_string())
            .await
            .unwrap();

        assert_eq!(receipt.wallet_name, "Vault");
        assert_eq!(receipt.from, second);
        assert!(receipt.created_receiver_account);
    }

    #[tokio::test]
    async fn test_token_holdings() {
        let (rpc, custodian) = custodian().await;
        custodian.create_wallet("42", "Bob").await.unwrap();
        let holding = TokenHolding {
            account: Pubkey::new_unique().to_string(),
            mint: Pubkey::new_unique().to_string(),
            amount: "1".to_string(),
            decimals: 0,
        };
        rpc.holdings.lock().unwrap().push(holding.clone());

        let holdings = custodian.token_holdings("42").await.unwrap();
        assert_eq!(holdings, vec![holding]);
    }
}
