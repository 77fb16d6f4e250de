//! Whacklet CLI
//!
//! Runs one custodial wallet command on behalf of a chat user.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use whacklet::{Config, CustodyError, Custodian, Database, SolanaRpc};

#[derive(Parser)]
#[command(name = "whacklet")]
#[command(about = "Custodial Solana wallets for chat users")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Chat identity the command runs for
    #[arg(short, long, env = "WHACKLET_CHAT_ID", global = true)]
    chat_id: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a named wallet (returns the existing one if the name is taken)
    CreateWallet {
        /// Wallet name; may contain spaces
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// List all wallets
    Wallets,

    /// Show the balance of a named wallet
    Balance {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Show the default wallet
    DefaultWallet,

    /// Make a named wallet the default
    SetDefault {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Send SOL from the default wallet
    Transfer {
        /// Destination address
        to: String,

        /// Amount in SOL, e.g. 0.5
        amount: String,
    },

    /// Mint a one-of-one NFT into the default wallet
    Nft {
        name: String,
        symbol: String,
        uri: String,
    },

    /// Send an NFT from the default wallet
    TransferNft {
        /// Destination address
        to: String,

        /// Mint address of the NFT
        mint: String,
    },

    /// List Token-2022 holdings of the default wallet
    Tokens,

    /// List NFTs minted through this custodian
    Assets,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the level picked here
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", failure_message(&e));
        std::process::exit(1);
    }
}

/// Configuration errors keep the setting name; everything else uses the chat-safe text
fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<CustodyError>() {
        Some(e @ CustodyError::Configuration(_)) => e.to_string(),
        Some(e) => e.user_message(),
        None => format!("{:#}", err),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let chat_id = cli
        .chat_id
        .ok_or_else(|| CustodyError::InvalidInput("--chat-id or WHACKLET_CHAT_ID is required".to_string()))?;

    // Load configuration
    let config = Config::from_env()?;
    debug!("[Main] RPC {} | database {}", config.rpc_url, config.database_path);

    let db = Arc::new(Database::new(&config.database_path).await?);
    let rpc = Arc::new(SolanaRpc::new(&config.rpc_url, config.rpc_timeout, config.commitment));
    let custodian = Custodian::new(db, config.master_secret.clone(), rpc);
    let json = cli.json;

    match cli.command {
        Commands::CreateWallet { name } => {
            let name = name.join(" ");
            let public_key = custodian.create_wallet(&chat_id, &name).await?;
            if json {
                print_json(&serde_json::json!({ "name": name.trim(), "public_key": public_key }))?;
            } else {
                println!("Wallet '{}' created: {}", name.trim(), public_key);
            }
        }
        Commands::Wallets => {
            let wallets = custodian.list_wallets(&chat_id).await?;
            if json {
                return print_json(&wallets);
            }
            println!("\nWallets ({}):", wallets.len());
            println!("{}", "-".repeat(70));
            for wallet in &wallets {
                let marker = if wallet.is_default { " [DEFAULT]" } else { "" };
                println!("  {:<20} {}{}", wallet.name, wallet.public_key, marker);
            }
        }
        Commands::Balance { name } => {
            let balance = custodian.balance(&chat_id, &name.join(" ")).await?;
            if json {
                return print_json(&balance);
            }
            println!("{} ({}): {}", balance.name, balance.address, balance);
        }
        Commands::DefaultWallet => {
            let wallet = custodian.default_wallet(&chat_id).await?;
            if json {
                return print_json(&wallet);
            }
            println!("Default wallet: {} ({})", wallet.name, wallet.public_key);
        }
        Commands::SetDefault { name } => {
            let wallet = custodian.set_default_wallet(&chat_id, &name.join(" ")).await?;
            if json {
                return print_json(&wallet);
            }
            println!("Default wallet is now {} ({})", wallet.name, wallet.public_key);
        }
        Commands::Transfer { to, amount } => {
            let receipt = custodian.transfer(&chat_id, &to, &amount).await?;
            if json {
                return print_json(&receipt);
            }
            println!("Sent {} SOL from {} to {}", receipt.sol, receipt.wallet_name, receipt.to);
            println!("  Signature: {}", receipt.signature);
        }
        Commands::Nft { name, symbol, uri } => {
            let receipt = custodian.create_nft(&chat_id, &name, &symbol, &uri).await?;
            if json {
                return print_json(&receipt);
            }
            println!("Minted '{}' at {}", receipt.name, receipt.mint_address);
            println!("  Held in: {}", receipt.holding_account);
            println!("  Signature: {}", receipt.signature);
        }
        Commands::TransferNft { to, mint } => {
            let receipt = custodian.transfer_nft(&chat_id, &to, &mint).await?;
            if json {
                return print_json(&receipt);
            }
            println!("Sent NFT {} from {} to {}", receipt.mint_address, receipt.wallet_name, receipt.to);
            if receipt.created_receiver_account {
                println!("  Created the receiver's token account");
            }
            println!("  Signature: {}", receipt.signature);
        }
        Commands::Tokens => {
            let holdings = custodian.token_holdings(&chat_id).await?;
            if json {
                return print_json(&holdings);
            }
            if holdings.is_empty() {
                println!("No tokens found.");
                return Ok(());
            }
            println!("\nTokens ({}):", holdings.len());
            println!("{}", "-".repeat(70));
            for holding in &holdings {
                println!("  {} x {}", holding.amount, holding.mint);
            }
        }
        Commands::Assets => {
            let assets = custodian.minted_assets(&chat_id).await?;
            if json {
                return print_json(&assets);
            }
            if assets.is_empty() {
                println!("No minted assets.");
                return Ok(());
            }
            for asset in &assets {
                println!(
                    "  {:<20} {}  {}",
                    asset.name,
                    asset.mint_address,
                    asset.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
