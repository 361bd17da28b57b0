use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod filter;
mod solana;
mod trading;

use crate::api::{DexScreenerClient, JitoClient};
use crate::config::{Config, LAMPORTS_PER_SOL};
use crate::filter::{AllowAllFilter, TokenFilter};
use crate::solana::{SolanaClient, WalletManager};
use crate::trading::{ConcurrencyGate, ExitMonitor, ExitParams, PumpListener, TradeExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Load configuration
    let config = Arc::new(Config::load()?);

    // Initialize logging at the configured level
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    info!("Configuration loaded successfully");

    // Initialize Solana client
    let client = Arc::new(SolanaClient::connect(&config.rpc_url, config.commitment()).await?);
    info!("Solana client initialized successfully");

    // Initialize trading wallet
    let wallet = Arc::new(WalletManager::new(&config.payer_private_key)?);

    // Initialize submission and price-feed clients
    let jito = Arc::new(JitoClient::new(
        (config.jito_fee_sol * LAMPORTS_PER_SOL).round() as u64,
    )?);
    let price_feed = Arc::new(DexScreenerClient::new(&config.dexscreener_url)?);

    // Wire the trade pipeline
    let executor = Arc::new(TradeExecutor::new(
        Arc::clone(&client),
        Arc::clone(&wallet),
        jito,
        Arc::clone(&config),
    ));
    let monitor = Arc::new(ExitMonitor::new(
        Arc::clone(&executor),
        Arc::clone(&price_feed),
        ExitParams::from_config(&config),
    ));
    let gate = ConcurrencyGate::new(config.max_concurrent_tokens);
    let token_filter: Arc<dyn TokenFilter> = Arc::new(AllowAllFilter);

    let listener = PumpListener::new(config, client, executor, monitor, token_filter, gate);

    // Runs until the subscription ends; a setup failure aborts the process.
    listener
        .run()
        .await
        .context("log subscription terminated")?;

    Ok(())
}
