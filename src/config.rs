//! Configuration management for the custodian

use crate::error::{CustodyError, Result};
use crate::wallet::MasterSecret;
use solana_sdk::commitment_config::CommitmentConfig;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Custodian configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Secret all wallet keys are encrypted under
    pub master_secret: Arc<MasterSecret>,

    /// Solana JSON-RPC endpoint
    pub rpc_url: String,

    /// Path to SQLite database
    pub database_path: String,

    /// How long RPC calls (including confirmation waits) may take
    pub rpc_timeout: Duration,

    /// Commitment level for reads and confirmation
    pub commitment: CommitmentConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let secret = required("ENCRYPTION_SECRET")?;
        let master_secret = Arc::new(MasterSecret::new(secret.as_bytes())?);

        let rpc_url = required("RPC_URL")?;

        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "whacklet.db".to_string());

        let rpc_timeout = env::var("RPC_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        let commitment = match env::var("RPC_COMMITMENT") {
            Ok(v) if !v.is_empty() => CommitmentConfig::from_str(&v).map_err(|_| {
                CustodyError::Configuration(format!(
                    "RPC_COMMITMENT must be processed, confirmed or finalized, got '{}'",
                    v
                ))
            })?,
            _ => CommitmentConfig::confirmed(),
        };

        Ok(Self {
            master_secret,
            rpc_url,
            database_path,
            rpc_timeout,
            commitment,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CustodyError::Configuration(format!("{} is required", name)))
}
