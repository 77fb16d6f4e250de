//! Error taxonomy for the custody core
//!
//! Every public operation returns either a definite success payload or one of
//! these variants. Messages never carry decrypted key material.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CustodyError>;

/// Errors surfaced by the custody core
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Missing or unusable startup configuration (secret, RPC endpoint)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Ciphertext tag did not verify: wrong secret, corruption or tampering
    #[error("encrypted wallet data failed authentication")]
    AuthenticationFailure,

    /// Encrypted blob is not valid base64 or is too short
    #[error("malformed encrypted data: {0}")]
    MalformedInput(String),

    /// Decrypted key material does not agree with itself
    #[error("wallet key material is inconsistent: {0}")]
    IntegrityViolation(String),

    /// No such user, wallet or default wallet
    #[error("{0} not found")]
    NotFound(String),

    /// User-supplied address does not parse
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// User-supplied argument is unusable (empty name, bad amount)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Instruction construction failed
    #[error("failed to build transaction: {0}")]
    BuildFailure(String),

    /// Sending or confirming a transaction failed
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// A read-side RPC call (balance, blockhash, rent, accounts) failed
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Distinct outcomes of a failed submission
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    /// Preflight simulation rejected the transaction
    #[error("transaction simulation failed: {detail}")]
    SimulationFailed { detail: String, logs: Vec<String> },

    /// The node rejected the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Confirmation was not observed before the deadline
    #[error("timed out waiting for confirmation: {0}")]
    Timeout(String),

    /// The provided signers do not cover the transaction's required signatures
    #[error("signing failed: {0}")]
    Signing(String),
}

impl CustodyError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CustodyError::NotFound(what.into())
    }

    pub fn build(detail: impl std::fmt::Display) -> Self {
        CustodyError::BuildFailure(detail.to_string())
    }

    /// Whether re-issuing the whole command could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CustodyError::Submission(e) => e.is_retryable(),
            CustodyError::Rpc(_) => true,
            _ => false,
        }
    }

    /// Message suitable for the chat user, grouped by cause category
    pub fn user_message(&self) -> String {
        match self {
            CustodyError::Configuration(_) => {
                "The wallet service is misconfigured. Please contact the operator.".to_string()
            }
            CustodyError::AuthenticationFailure
            | CustodyError::MalformedInput(_)
            | CustodyError::IntegrityViolation(_) => {
                "Cannot access wallet. Please contact the operator.".to_string()
            }
            CustodyError::NotFound(what) => {
                format!("No {} found. Create one with `whacklet create-wallet <name>`.", what)
            }
            CustodyError::InvalidAddress(addr) => format!("'{}' is not a valid address.", addr),
            CustodyError::InvalidInput(msg) => format!("Invalid input: {}.", msg),
            CustodyError::BuildFailure(msg) => format!("Could not build transaction: {}.", msg),
            CustodyError::Submission(e) => e.user_message(),
            CustodyError::Rpc(_) => "The network is unreachable right now. Try again.".to_string(),
            CustodyError::Storage(_) => "Storage error. Please try again later.".to_string(),
        }
    }
}

impl SubmissionError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SubmissionError::Signing(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::SimulationFailed { detail, .. } => {
                format!("Transaction was rejected in simulation: {}", detail)
            }
            SubmissionError::Rejected(msg) => format!("Transaction was rejected: {}", msg),
            SubmissionError::Timeout(_) => {
                "Transaction was not confirmed in time. Check the explorer before retrying."
                    .to_string()
            }
            SubmissionError::Signing(_) => "Transaction could not be signed.".to_string(),
        }
    }
}
