//! SQLite database for users, custodied wallets and minted assets

use crate::wallet::EncryptedBlob;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

/// A chat user known to the custodian
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub chat_id: String,
    pub default_wallet_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A custodied wallet; both key halves are encrypted at rest
#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub encrypted_public_key: EncryptedBlob,
    pub encrypted_private_key: EncryptedBlob,
    pub created_at: DateTime<Utc>,
}

/// An NFT mint created on behalf of a user
#[derive(Debug, Clone, Serialize)]
pub struct MintedAsset {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub mint_address: String,
    pub created_at: DateTime<Utc>,
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> sqlx::Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// Private in-memory database; a single connection so every query sees the same data
    pub async fn in_memory() -> sqlx::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize database schema
    async fn initialize(&self) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT NOT NULL UNIQUE,
                default_wallet_id INTEGER,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                encrypted_public_key TEXT NOT NULL,
                encrypted_private_key TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, name),
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS minted_assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                mint_address TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_wallets_user ON wallets(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_minted_assets_user ON minted_assets(user_id)")
            .execute(&self.pool)
            .await?;

        info!("Database initialized");
        Ok(())
    }

    // ==================== USERS ====================

    /// Find a user by external chat identity
    pub async fn find_user(&self, chat_id: &str) -> sqlx::Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Create a user together with its first wallet, which becomes the default
    pub async fn create_user_with_wallet(
        &self,
        chat_id: &str,
        name: &str,
        encrypted_public_key: &EncryptedBlob,
        encrypted_private_key: &EncryptedBlob,
    ) -> sqlx::Result<(UserRecord, WalletRecord)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query("INSERT INTO users (chat_id, created_at) VALUES (?, ?)")
            .bind(chat_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let wallet_id = sqlx::query(
            r#"
            INSERT INTO wallets (user_id, name, encrypted_public_key, encrypted_private_key, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(encrypted_public_key)
        .bind(encrypted_private_key)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("UPDATE users SET default_wallet_id = ? WHERE id = ?")
            .bind(wallet_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((
            UserRecord {
                id: user_id,
                chat_id: chat_id.to_string(),
                default_wallet_id: Some(wallet_id),
                created_at: now,
            },
            WalletRecord {
                id: wallet_id,
                user_id,
                name: name.to_string(),
                encrypted_public_key: encrypted_public_key.clone(),
                encrypted_private_key: encrypted_private_key.clone(),
                created_at: now,
            },
        ))
    }

    /// Point a user's default at one of their wallets.
    /// Returns false when the user does not own that wallet.
    pub async fn set_default_wallet(&self, user_id: i64, wallet_id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET default_wallet_id = ? WHERE id = ? AND EXISTS (SELECT 1 FROM wallets WHERE id = ? AND user_id = ?)",
        )
        .bind(wallet_id)
        .bind(user_id)
        .bind(wallet_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== WALLETS ====================

    /// Add a named wallet for an existing user
    pub async fn create_wallet(
        &self,
        user_id: i64,
        name: &str,
        encrypted_public_key: &EncryptedBlob,
        encrypted_private_key: &EncryptedBlob,
    ) -> sqlx::Result<WalletRecord> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO wallets (user_id, name, encrypted_public_key, encrypted_private_key, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(encrypted_public_key)
        .bind(encrypted_private_key)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(WalletRecord {
            id: result.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            encrypted_public_key: encrypted_public_key.clone(),
            encrypted_private_key: encrypted_private_key.clone(),
            created_at: now,
        })
    }

    /// Find a user's wallet by its exact name
    pub async fn find_wallet(&self, user_id: i64, name: &str) -> sqlx::Result<Option<WalletRecord>> {
        let row = sqlx::query("SELECT * FROM wallets WHERE user_id = ? AND name = ?")
            .bind(user_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_wallet).transpose()
    }

    /// Find a wallet by id, restricted to its owner
    pub async fn find_wallet_by_id(
        &self,
        user_id: i64,
        wallet_id: i64,
    ) -> sqlx::Result<Option<WalletRecord>> {
        let row = sqlx::query("SELECT * FROM wallets WHERE id = ? AND user_id = ?")
            .bind(wallet_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_wallet).transpose()
    }

    /// All wallets of a user in creation order
    pub async fn wallets_for_user(&self, user_id: i64) -> sqlx::Result<Vec<WalletRecord>> {
        let rows = sqlx::query("SELECT * FROM wallets WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_wallet).collect()
    }

    // ==================== MINTED ASSETS ====================

    /// Record a successfully minted NFT
    pub async fn record_minted_asset(
        &self,
        user_id: i64,
        name: &str,
        mint_address: &str,
    ) -> sqlx::Result<MintedAsset> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO minted_assets (user_id, name, mint_address, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(name)
        .bind(mint_address)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(MintedAsset {
            id: result.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            mint_address: mint_address.to_string(),
            created_at: now,
        })
    }

    /// Minted assets of a user, newest first
    pub async fn minted_assets_for_user(&self, user_id: i64) -> sqlx::Result<Vec<MintedAsset>> {
        let rows = sqlx::query("SELECT * FROM minted_assets WHERE user_id = ? ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| {
                Ok(MintedAsset {
                    id: r.try_get("id")?,
                    user_id: r.try_get("user_id")?,
                    name: r.try_get("name")?,
                    mint_address: r.try_get("mint_address")?,
                    created_at: parse_timestamp(r, "created_at")?,
                })
            })
            .collect()
    }
}

/// Whether a storage error is a UNIQUE constraint collision
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

fn row_to_user(row: &SqliteRow) -> sqlx::Result<UserRecord> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        default_wallet_id: row.try_get("default_wallet_id")?,
        created_at: parse_timestamp(row, "created_at")?,
    })
}

fn row_to_wallet(row: &SqliteRow) -> sqlx::Result<WalletRecord> {
    Ok(WalletRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        encrypted_public_key: row.try_get("encrypted_public_key")?,
        encrypted_private_key: row.try_get("encrypted_private_key")?,
        created_at: parse_timestamp(row, "created_at")?,
    })
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> sqlx::Result<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}
