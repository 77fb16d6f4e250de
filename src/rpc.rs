//! Solana RPC access
//!
//! `ChainRpc` is the only way the custody core talks to the network. The
//! production implementation wraps the nonblocking `solana-client` RpcClient.

use crate::error::{CustodyError, Result, SubmissionError};
use crate::types::TokenHolding;
use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::{RpcError, RpcResponseErrorData, TokenAccountsFilter};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::time::Duration;
use tracing::debug;

/// Network operations consumed by the custody core
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Native balance in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    /// Freshness token for a transaction about to be built
    async fn get_latest_blockhash(&self) -> Result<Hash>;

    /// Lamports an account of `data_len` bytes needs to be rent exempt
    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64>;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool>;

    /// Token accounts owned by `owner` under the given token program
    async fn get_token_holdings(&self, owner: &Pubkey, program_id: &Pubkey) -> Result<Vec<TokenHolding>>;

    /// Broadcast a signed transaction and wait for confirmation
    async fn send_and_confirm(&self, transaction: &Transaction) -> std::result::Result<Signature, SubmissionError>;
}

/// `ChainRpc` backed by a Solana JSON-RPC endpoint
pub struct SolanaRpc {
    client: RpcClient,
}

impl SolanaRpc {
    pub fn new(url: &str, timeout: Duration, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url.to_string(), timeout, commitment),
        }
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        self.client.get_balance(address).await.map_err(read_error)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        self.client.get_latest_blockhash().await.map_err(read_error)
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(read_error)
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map_err(read_error)?;
        Ok(response.value.is_some())
    }

    async fn get_token_holdings(&self, owner: &Pubkey, program_id: &Pubkey) -> Result<Vec<TokenHolding>> {
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(*program_id))
            .await
            .map_err(read_error)?;

        let holdings = accounts
            .into_iter()
            .filter_map(|keyed| match keyed.account.data {
                UiAccountData::Json(parsed) => parse_token_holding(keyed.pubkey, &parsed.parsed),
                _ => None,
            })
            .collect();

        Ok(holdings)
    }

    async fn send_and_confirm(&self, transaction: &Transaction) -> std::result::Result<Signature, SubmissionError> {
        self.client
            .send_and_confirm_transaction(transaction)
            .await
            .map_err(|e| classify_submission_error(&e))
    }
}

fn read_error(err: ClientError) -> CustodyError {
    debug!("[Rpc] Read failed: {}", err);
    CustodyError::Rpc(err.to_string())
}

/// Extract mint and amount from a jsonParsed SPL token account
pub(crate) fn parse_token_holding(account: String, parsed: &serde_json::Value) -> Option<TokenHolding> {
    let info = parsed.get("info")?;
    let amount = info.get("tokenAmount")?;

    Some(TokenHolding {
        account,
        mint: info.get("mint")?.as_str()?.to_string(),
        amount: amount.get("uiAmountString")?.as_str()?.to_string(),
        decimals: amount.get("decimals")?.as_u64()? as u8,
    })
}

/// Sort a send/confirm failure into the outcome categories callers branch on
pub(crate) fn classify_submission_error(err: &ClientError) -> SubmissionError {
    match err.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            message,
            data: RpcResponseErrorData::SendTransactionPreflightFailure(simulation),
            ..
        }) => SubmissionError::SimulationFailed {
            detail: simulation
                .err
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| message.clone()),
            logs: simulation.logs.clone().unwrap_or_default(),
        },
        ClientErrorKind::RpcError(RpcError::ForUser(message))
            if message.contains("unable to confirm transaction") =>
        {
            SubmissionError::Timeout(message.clone())
        }
        ClientErrorKind::Reqwest(e) if e.is_timeout() => SubmissionError::Timeout(e.to_string()),
        ClientErrorKind::TransactionError(e) => SubmissionError::Rejected(e.to_string()),
        _ => SubmissionError::Rejected(err.to_string()),
    }
}
