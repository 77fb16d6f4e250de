//! Signs, broadcasts and confirms built transactions
//!
//! No retries here: an expired blockhash means the whole command has to be
//! rebuilt, which is the caller's decision.

use crate::error::SubmissionError;
use crate::rpc::ChainRpc;
use crate::transaction::BuiltTransaction;
use solana_sdk::message::Message;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Submitter {
    rpc: Arc<dyn ChainRpc>,
}

impl Submitter {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    /// Sign with every required signer and wait for confirmation
    pub async fn submit(
        &self,
        built: &BuiltTransaction,
        signers: &[&Keypair],
    ) -> Result<Signature, SubmissionError> {
        let transaction = sign(built, signers)?;

        info!(
            "[Submitter] Sending {:?} transaction with {} instruction(s) from {}",
            built.kind,
            transaction.message.instructions.len(),
            built.fee_payer
        );

        match self.rpc.send_and_confirm(&transaction).await {
            Ok(signature) => {
                info!("[Submitter] Confirmed {}", signature);
                Ok(signature)
            }
            Err(e) => {
                warn!("[Submitter] {:?} transaction failed: {}", built.kind, e);
                if let SubmissionError::SimulationFailed { logs, .. } = &e {
                    for line in logs {
                        warn!("[Submitter]   {}", line);
                    }
                }
                Err(e)
            }
        }
    }
}

/// Build the message over the builder's blockhash and apply all signatures
pub fn sign(built: &BuiltTransaction, signers: &[&Keypair]) -> Result<Transaction, SubmissionError> {
    let message = Message::new_with_blockhash(
        &built.plan.instructions(),
        Some(&built.fee_payer),
        &built.recent_blockhash,
    );
    let mut transaction = Transaction::new_unsigned(message);

    transaction
        .try_sign(signers, built.recent_blockhash)
        .map_err(|e| SubmissionError::Signing(e.to_string()))?;

    Ok(transaction)
}
