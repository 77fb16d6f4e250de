//! Per-user named wallets and the default wallet pointer

use crate::db::{is_unique_violation, Database, UserRecord, WalletRecord};
use crate::error::{CustodyError, Result};
use crate::types::WalletInfo;
use crate::wallet::{decrypt, encrypt, generate_wallet, resolve_signer, MasterSecret};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns wallet creation and default-pointer writes
pub struct WalletRegistry {
    db: Arc<Database>,
    secret: Arc<MasterSecret>,
}

impl WalletRegistry {
    pub fn new(db: Arc<Database>, secret: Arc<MasterSecret>) -> Self {
        Self { db, secret }
    }

    /// Return the public key of `(chat_id, name)`, creating the wallet if needed.
    ///
    /// A brand-new user's first wallet becomes their default. Later wallets
    /// leave the default alone.
    pub async fn get_or_create_wallet(&self, chat_id: &str, name: &str) -> Result<String> {
        let name = normalize_name(name)?;

        if let Some(public_key) = self.existing_public_key(chat_id, name).await? {
            debug!("[Registry] Wallet '{}' already exists for chat {}", name, chat_id);
            return Ok(public_key);
        }

        match self.create(chat_id, name).await {
            Ok(public_key) => Ok(public_key),
            Err(CustodyError::Storage(e)) if is_unique_violation(&e) => {
                // lost a race with a concurrent create for the same user or wallet name
                warn!(
                    "[Registry] Concurrent create for chat {} wallet '{}', re-reading",
                    chat_id, name
                );
                match self.existing_public_key(chat_id, name).await? {
                    Some(public_key) => Ok(public_key),
                    None => self.create(chat_id, name).await,
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Point the user's default at the wallet called `name`
    pub async fn set_default_wallet(&self, chat_id: &str, name: &str) -> Result<WalletInfo> {
        let user = self.user(chat_id).await?;
        let wallet = self
            .db
            .find_wallet(user.id, name.trim())
            .await?
            .ok_or_else(|| CustodyError::not_found(format!("wallet named '{}'", name.trim())))?;

        if !self.db.set_default_wallet(user.id, wallet.id).await? {
            warn!(
                "[Registry] Chat {} wallet '{}' vanished before it could become default",
                chat_id, wallet.name
            );
            return Err(CustodyError::not_found(format!("wallet named '{}'", wallet.name)));
        }
        info!("[Registry] Chat {} default wallet is now '{}'", chat_id, wallet.name);

        self.info(&wallet, true)
    }

    /// The wallet the user's default pointer references
    pub async fn resolve_default(&self, chat_id: &str) -> Result<WalletRecord> {
        let user = self.user(chat_id).await?;
        let wallet_id = user
            .default_wallet_id
            .ok_or_else(|| CustodyError::not_found("default wallet"))?;

        match self.db.find_wallet_by_id(user.id, wallet_id).await? {
            Some(wallet) => Ok(wallet),
            None => {
                warn!(
                    "[Registry] Chat {} default wallet {} no longer exists",
                    chat_id, wallet_id
                );
                Err(CustodyError::not_found("default wallet"))
            }
        }
    }

    /// Default wallet with its decrypted address
    pub async fn default_wallet_info(&self, chat_id: &str) -> Result<WalletInfo> {
        let wallet = self.resolve_default(chat_id).await?;
        self.info(&wallet, true)
    }

    /// A user's wallet by exact name
    pub async fn find_wallet(&self, chat_id: &str, name: &str) -> Result<WalletRecord> {
        let user = self.user(chat_id).await?;
        self.db
            .find_wallet(user.id, name.trim())
            .await?
            .ok_or_else(|| CustodyError::not_found(format!("wallet named '{}'", name.trim())))
    }

    /// All of a user's wallets with decrypted addresses
    pub async fn list_wallets(&self, chat_id: &str) -> Result<Vec<WalletInfo>> {
        let user = self.user(chat_id).await?;
        let wallets = self.db.wallets_for_user(user.id).await?;

        wallets
            .iter()
            .map(|w| self.info(w, user.default_wallet_id == Some(w.id)))
            .collect()
    }

    /// Decrypted, parsed address of a stored wallet
    pub fn wallet_address(&self, wallet: &WalletRecord) -> Result<Pubkey> {
        let text = decrypt(&wallet.encrypted_public_key, &self.secret)?;
        Pubkey::from_str(text.trim()).map_err(|_| {
            CustodyError::IntegrityViolation(format!(
                "wallet {} stores an unparseable public key",
                wallet.id
            ))
        })
    }

    /// Materialize the signer for a stored wallet
    pub fn signer(&self, wallet: &WalletRecord) -> Result<Keypair> {
        resolve_signer(
            &wallet.encrypted_public_key,
            &wallet.encrypted_private_key,
            &self.secret,
        )
    }

    pub(crate) async fn user(&self, chat_id: &str) -> Result<UserRecord> {
        self.db
            .find_user(chat_id)
            .await?
            .ok_or_else(|| CustodyError::not_found("wallet"))
    }

    async fn existing_public_key(&self, chat_id: &str, name: &str) -> Result<Option<String>> {
        let Some(user) = self.db.find_user(chat_id).await? else {
            return Ok(None);
        };
        match self.db.find_wallet(user.id, name).await? {
            Some(wallet) => Ok(Some(decrypt(&wallet.encrypted_public_key, &self.secret)?.as_str().to_string())),
            None => Ok(None),
        }
    }

    async fn create(&self, chat_id: &str, name: &str) -> Result<String> {
        let generated = generate_wallet();
        let encrypted_public_key = encrypt(&generated.public_key, &self.secret)?;
        let encrypted_private_key = encrypt(&generated.secret_key, &self.secret)?;

        match self.db.find_user(chat_id).await? {
            Some(user) => {
                self.db
                    .create_wallet(user.id, name, &encrypted_public_key, &encrypted_private_key)
                    .await?;
            }
            None => {
                self.db
                    .create_user_with_wallet(chat_id, name, &encrypted_public_key, &encrypted_private_key)
                    .await?;
                info!("[Registry] Registered chat {}", chat_id);
            }
        }

        info!(
            "[Registry] Wallet '{}' created for chat {}: {}",
            name, chat_id, generated.public_key
        );
        Ok(generated.public_key)
    }

    fn info(&self, wallet: &WalletRecord, is_default: bool) -> Result<WalletInfo> {
        Ok(WalletInfo {
            id: wallet.id,
            name: wallet.name.clone(),
            public_key: decrypt(&wallet.encrypted_public_key, &self.secret)?.as_str().to_string(),
            is_default,
        })
    }
}

/// Wallet names are used verbatim apart from surrounding whitespace
fn normalize_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CustodyError::InvalidInput("wallet name must not be empty".to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;

    async fn registry() -> (Arc<Database>, WalletRegistry) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let secret = Arc::new(MasterSecret::new(b"registry-test").unwrap());
        (db.clone(), WalletRegistry::new(db, secret))
    }

    #[tokio::test]
    async fn test_scenario_new_chat_creates_default_wallet() {
        let (db, registry) = registry().await;

        let public_key = registry.get_or_create_wallet("42", "Bob").await.unwrap();

        assert!(Pubkey::from_str(&public_key).is_ok());
        let user = db.find_user("42").await.unwrap().unwrap();
        let wallets = db.wallets_for_user(user.id).await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].name, "Bob");
        assert_eq!(user.default_wallet_id, Some(wallets[0].id));
    }

    #[tokio::test]
    async fn test_idempotent_by_owner_and_name() {
        let (db, registry) = registry().await;

        let first = registry.get_or_create_wallet("1", "Alice").await.unwrap();
        let second = registry.get_or_create_wallet("1", "Alice").await.unwrap();

        assert_eq!(first, second);
        let user = db.find_user("1").await.unwrap().unwrap();
        assert_eq!(db.wallets_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_name_different_owners() {
        let (_, registry) = registry().await;
        let a = registry.get_or_create_wallet("1", "Alice").await.unwrap();
        let b = registry.get_or_create_wallet("2", "Alice").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_second_wallet_keeps_default() {
        let (_, registry) = registry().await;
        let first = registry.get_or_create_wallet("9", "Main").await.unwrap();
        registry.get_or_create_wallet("9", "Savings").await.unwrap();

        let default = registry.default_wallet_info("9").await.unwrap();
        assert_eq!(default.name, "Main");
        assert_eq!(default.public_key, first);
    }

    #[tokio::test]
    async fn test_names_trimmed_and_case_sensitive() {
        let (_, registry) = registry().await;
        let a = registry.get_or_create_wallet("5", "  Alice ").await.unwrap();
        let b = registry.get_or_create_wallet("5", "Alice").await.unwrap();
        let c = registry.get_or_create_wallet("5", "alice").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(matches!(
            registry.get_or_create_wallet("5", "   ").await,
            Err(CustodyError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_set_default_wallet() {
        let (_, registry) = registry().await;
        registry.get_or_create_wallet("3", "Main").await.unwrap();
        let savings = registry.get_or_create_wallet("3", "Savings").await.unwrap();

        let info = registry.set_default_wallet("3", "Savings").await.unwrap();
        assert_eq!(info.public_key, savings);

        let wallets = registry.list_wallets("3").await.unwrap();
        let flagged: Vec<_> = wallets.iter().filter(|w| w.is_default).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].name, "Savings");
    }

    #[tokio::test]
    async fn test_set_default_not_found() {
        let (_, registry) = registry().await;
        assert!(matches!(
            registry.set_default_wallet("nobody", "Main").await,
            Err(CustodyError::NotFound(_))
        ));

        registry.get_or_create_wallet("3", "Main").await.unwrap();
        assert!(matches!(
            registry.set_default_wallet("3", "Missing").await,
            Err(CustodyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_default_missing_user() {
        let (_, registry) = registry().await;
        assert!(matches!(
            registry.resolve_default("ghost").await,
            Err(CustodyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dangling_default_is_not_found() {
        let (db, registry) = registry().await;
        registry.get_or_create_wallet("8", "Main").await.unwrap();
        let user = db.find_user("8").await.unwrap().unwrap();

        // point at a wallet id this user does not own
        sqlx::query("UPDATE users SET default_wallet_id = 999 WHERE id = ?")
            .bind(user.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(matches!(
            registry.resolve_default("8").await,
            Err(CustodyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_signer_matches_wallet_address() {
        let (_, registry) = registry().await;
        let public_key = registry.get_or_create_wallet("4", "Main").await.unwrap();

        let wallet = registry.resolve_default("4").await.unwrap();
        let signer = registry.signer(&wallet).unwrap();

        assert_eq!(signer.pubkey().to_string(), public_key);
        assert_eq!(registry.wallet_address(&wallet).unwrap(), signer.pubkey());
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_wallet() {
        let (db, registry) = registry().await;
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create_wallet("77", "Race").await })
            })
            .collect();

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap().unwrap());
        }
        keys.dedup();
        assert_eq!(keys.len(), 1);

        let user = db.find_user("77").await.unwrap().unwrap();
        assert_eq!(db.wallets_for_user(user.id).await.unwrap().len(), 1);
    }
}
