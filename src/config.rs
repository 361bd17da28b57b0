use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::env;

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub rpc_url: String,
    pub ws_url: String,
    pub commitment_level: String,
    pub payer_private_key: String,

    pub quote_amount_lamports: u64,
    pub slippage_percent: f64,
    pub tx_fee_sol: f64,
    pub compute_unit_limit: u32,

    pub jito_mode: bool,
    pub jito_fee_sol: f64,

    pub balance_check_retries: u32,
    pub balance_check_delay_secs: u64,

    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
    pub hold_duration_secs: i64,
    pub max_sell_retries: u32, // 0 = retry until the hold-duration trigger fires

    pub max_concurrent_tokens: usize,
    pub check_filter: bool,
    pub dexscreener_url: String,
    pub log_level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let quote_amount_sol: f64 = env::var("QUOTE_AMOUNT")
            .context("QUOTE_AMOUNT not set in environment")?
            .parse()
            .context("Failed to parse QUOTE_AMOUNT")?;
        if !quote_amount_sol.is_finite() || quote_amount_sol <= 0.0 {
            bail!("QUOTE_AMOUNT must be a positive number of SOL");
        }

        let config = Self {
            rpc_url: env::var("RPC_ENDPOINT").context("RPC_ENDPOINT not set in environment")?,
            ws_url: env::var("RPC_WEBSOCKET_ENDPOINT")
                .context("RPC_WEBSOCKET_ENDPOINT not set in environment")?,
            commitment_level: env::var("COMMITMENT_LEVEL")
                .unwrap_or_else(|_| "confirmed".to_string()),
            payer_private_key: env::var("PAYER_PRIVATE_KEY")
                .context("PAYER_PRIVATE_KEY not set in environment")?,

            quote_amount_lamports: (quote_amount_sol * LAMPORTS_PER_SOL).round() as u64,
            slippage_percent: env::var("SLIPPAGE")
                .context("SLIPPAGE not set in environment")?
                .parse()
                .context("Failed to parse SLIPPAGE")?,
            tx_fee_sol: env::var("TX_FEE")
                .context("TX_FEE not set in environment")?
                .parse()
                .context("Failed to parse TX_FEE")?,
            compute_unit_limit: env::var("COMPUTE_UNIT")
                .context("COMPUTE_UNIT not set in environment")?
                .parse()
                .context("Failed to parse COMPUTE_UNIT")?,

            jito_mode: env::var("JITO_MODE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            jito_fee_sol: env::var("JITO_FEE")
                .context("JITO_FEE not set in environment")?
                .parse()
                .context("Failed to parse JITO_FEE")?,

            balance_check_retries: env::var("TX_NUM")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Failed to parse TX_NUM")?,
            balance_check_delay_secs: env::var("TX_DELAY")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("Failed to parse TX_DELAY")?,

            take_profit_percent: env::var("TAKE_PROFIT")
                .context("TAKE_PROFIT not set in environment")?
                .parse()
                .context("Failed to parse TAKE_PROFIT")?,
            stop_loss_percent: env::var("STOP_LOSS")
                .context("STOP_LOSS not set in environment")?
                .parse()
                .context("Failed to parse STOP_LOSS")?,
            hold_duration_secs: env::var("HOLD_DURATION")
                .context("HOLD_DURATION not set in environment")?
                .parse()
                .context("Failed to parse HOLD_DURATION")?,
            max_sell_retries: env::var("MAX_SELL_RETRIES")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .context("Failed to parse MAX_SELL_RETRIES")?,

            max_concurrent_tokens: env::var("MAX_CONCURRENT_TOKENS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Failed to parse MAX_CONCURRENT_TOKENS")?,
            check_filter: env::var("CHECK_FILTER")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            dexscreener_url: env::var("DEXSCREENER_API")
                .unwrap_or_else(|_| "https://api.dexscreener.com/latest/dex/tokens".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Hard bounds on every numeric setting. A value outside its range is a
    /// deployment mistake, not something to clamp quietly.
    pub fn validate(&self) -> Result<()> {
        if self.quote_amount_lamports == 0 {
            bail!("QUOTE_AMOUNT must be a positive number of SOL");
        }
        if !(0.0..=100.0).contains(&self.slippage_percent) {
            bail!("SLIPPAGE must be between 0 and 100");
        }
        if !(0.0..=0.1).contains(&self.jito_fee_sol) {
            bail!("JITO_FEE must be between 0 and 0.1 SOL");
        }
        if !(0.0..=0.01).contains(&self.tx_fee_sol) {
            bail!("TX_FEE must be between 0 and 0.01 SOL");
        }
        if self.compute_unit_limit == 0 || self.compute_unit_limit > 1_400_000 {
            bail!("COMPUTE_UNIT must be between 1 and 1400000");
        }
        if self.balance_check_retries == 0 || self.balance_check_retries > 10 {
            bail!("TX_NUM must be between 1 and 10");
        }
        if self.balance_check_delay_secs > 60 {
            bail!("TX_DELAY must be between 0 and 60 seconds");
        }
        if self.take_profit_percent <= 0.0 {
            bail!("TAKE_PROFIT must be positive");
        }
        if self.stop_loss_percent <= 0.0 {
            bail!("STOP_LOSS must be positive");
        }
        if self.hold_duration_secs <= 0 {
            bail!("HOLD_DURATION must be a positive number of seconds");
        }
        if self.max_concurrent_tokens == 0 || self.max_concurrent_tokens > 10 {
            bail!("MAX_CONCURRENT_TOKENS must be between 1 and 10");
        }
        if !["processed", "confirmed", "finalized"].contains(&self.commitment_level.as_str()) {
            bail!("COMMITMENT_LEVEL must be processed, confirmed or finalized");
        }
        Ok(())
    }

    pub fn commitment(&self) -> CommitmentConfig {
        match self.commitment_level.as_str() {
            "processed" => CommitmentConfig::processed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        }
    }

    /// Commitment used when fetching parsed transactions: `processed` is not
    /// accepted there, so it is bumped to `confirmed`.
    pub fn fetch_commitment(&self) -> CommitmentConfig {
        if self.commitment_level == "processed" {
            CommitmentConfig::confirmed()
        } else {
            self.commitment()
        }
    }

    pub fn quote_amount_sol(&self) -> f64 {
        self.quote_amount_lamports as f64 / LAMPORTS_PER_SOL
    }

    pub fn slippage_fraction(&self) -> f64 {
        self.slippage_percent / 100.0
    }
}
