// src/trading/executor.rs
//
// Buy/sell orchestration: resolve pool state, price the fee, build and sign
// one versioned transaction, preflight it with retries, then hand it to
// exactly one delivery channel. A confirmed buy is only a success once
// tokens actually show up in the wallet.

use chrono::Utc;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    transaction::VersionedTransaction,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::api::JitoClient;
use crate::config::{Config, LAMPORTS_PER_SOL};
use crate::error::SniperError;
use crate::solana::{SolanaClient, WalletManager};
use crate::trading::builder::{
    build_buy_instructions, build_sell_instructions, max_sol_cost, scaled_token_amount,
    token_out_for_sol_in, TradeSide,
};
use crate::trading::curve::{PoolResolver, TokenHandle};
use crate::trading::fees::FeeEstimator;

/// Preflight attempts before a trade is abandoned unsent.
const SIMULATE_MAX_ATTEMPTS: u32 = 3;
const SIMULATE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of one buy or sell call. Produced once, never mutated.
#[derive(Debug, Clone)]
pub struct TradeResult {
    pub side: TradeSide,
    /// Executed price in SOL per token. Set on buy (the cost basis the exit
    /// monitor works from); sells do not compute one.
    pub price: Option<f64>,
    /// Wall clock at confirmation, unix seconds.
    pub timestamp: i64,
    /// Transaction signature, or bundle id in relay mode.
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct BuyOutcome {
    pub handle: TokenHandle,
    pub tokens_received: f64,
    pub result: TradeResult,
}

/// One preflight attempt either came back clean or reported an on-chain
/// execution error.
pub enum SimOutcome {
    Clean,
    ExecutionError(String),
}

/// Run a simulation closure until it comes back clean, up to `max_attempts`.
/// Execution errors and transport errors both count as failed attempts;
/// exhaustion means the transaction must not be submitted.
pub async fn simulate_with_retry<F, Fut>(
    max_attempts: u32,
    delay: Duration,
    mut attempt: F,
) -> Result<(), SniperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SimOutcome, SniperError>>,
{
    let mut last_error = String::from("no simulation attempt completed");

    for n in 1..=max_attempts {
        match attempt().await {
            Ok(SimOutcome::Clean) => return Ok(()),
            Ok(SimOutcome::ExecutionError(err)) => {
                error!("Simulation attempt {} failed: {}", n, err);
                last_error = err;
            }
            Err(e) => {
                error!("Simulation attempt {} error: {}", n, e);
                last_error = e.to_string();
            }
        }
        if n < max_attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(SniperError::SimulationFailed(last_error))
}

pub struct TradeExecutor {
    client: Arc<SolanaClient>,
    wallet: Arc<WalletManager>,
    resolver: PoolResolver,
    fees: FeeEstimator,
    jito: Arc<JitoClient>,
    config: Arc<Config>,
}

impl TradeExecutor {
    pub fn new(
        client: Arc<SolanaClient>,
        wallet: Arc<WalletManager>,
        jito: Arc<JitoClient>,
        config: Arc<Config>,
    ) -> Self {
        let resolver = PoolResolver::new(Arc::clone(&client));
        let fees = FeeEstimator::new(Arc::clone(&client), config.tx_fee_sol);
        Self {
            client,
            wallet,
            resolver,
            fees,
            jito,
            config,
        }
    }

    /// Fee the active delivery channel will cost, in SOL. Relay mode pays the
    /// fixed tip; direct mode pays the dynamically estimated priority fee.
    async fn channel_fee_sol(&self) -> f64 {
        if self.config.jito_mode {
            self.config.jito_fee_sol
        } else {
            self.fees.recommend().await
        }
    }

    pub async fn buy(&self, mint: Pubkey) -> Result<BuyOutcome, SniperError> {
        let wallet_pubkey = self.wallet.pubkey();
        let handle = TokenHandle::derive(mint, &wallet_pubkey);

        info!("========= Starting token purchase =========");
        let pool = self.resolver.resolve(&handle).await?;

        let fee_sol = self.channel_fee_sol().await;
        info!("Transaction fee set to: {} SOL", fee_sol);

        let sol_balance = self.client.get_sol_balance(&wallet_pubkey).await?;
        let required = self.config.quote_amount_lamports + (fee_sol * LAMPORTS_PER_SOL) as u64;
        if sol_balance < required {
            return Err(SniperError::InsufficientBalance(format!(
                "Insufficient SOL balance: {} SOL < {} SOL",
                sol_balance as f64 / LAMPORTS_PER_SOL,
                required as f64 / LAMPORTS_PER_SOL
            )));
        }

        let sol_in = self.config.quote_amount_sol();
        info!("Using quote amount: {} SOL", sol_in);

        let token_out = token_out_for_sol_in(
            self.config.quote_amount_lamports,
            pool.virtual_sol_reserves,
            pool.virtual_token_reserves,
        );
        let max_cost = max_sol_cost(sol_in, self.config.slippage_fraction());

        let create_ata = self
            .client
            .get_account_optional(&handle.user_ata, self.client.commitment())
            .await?
            .is_none();

        let instructions = build_buy_instructions(
            &handle,
            &wallet_pubkey,
            fee_sol,
            self.config.compute_unit_limit,
            token_out,
            max_cost,
            create_ata,
        );

        let (transaction, blockhash) = self.sign_transaction(&instructions).await?;
        self.preflight(&transaction).await?;
        let signature = self.submit(&transaction, blockhash).await?;

        let tokens_received = self.await_tokens(&handle).await?;
        let price = sol_in / tokens_received;
        let timestamp = Utc::now().timestamp();

        info!("========= Token purchase completed =========");
        info!(
            "Bought {} tokens of {} at {:.12} SOL/token",
            tokens_received, handle.mint, price
        );

        Ok(BuyOutcome {
            handle,
            tokens_received,
            result: TradeResult {
                side: TradeSide::Buy,
                price: Some(price),
                timestamp,
                signature,
            },
        })
    }

    pub async fn sell(
        &self,
        handle: &TokenHandle,
        token_amount: f64,
    ) -> Result<TradeResult, SniperError> {
        let wallet_pubkey = self.wallet.pubkey();

        let token_balance = self
            .client
            .get_token_balance(&handle.user_ata)
            .await?
            .ui_amount
            .unwrap_or(0.0);
        if token_balance < token_amount {
            return Err(SniperError::InsufficientBalance(format!(
                "Insufficient token balance: {} < {}",
                token_balance, token_amount
            )));
        }

        let fee_sol = self.channel_fee_sol().await;
        info!("Transaction fee set to: {} SOL", fee_sol);

        let sol_balance = self.client.get_sol_balance(&wallet_pubkey).await?;
        if sol_balance < (fee_sol * LAMPORTS_PER_SOL) as u64 {
            return Err(SniperError::InsufficientBalance(
                "Insufficient SOL balance for transaction fee".to_string(),
            ));
        }

        let instructions = build_sell_instructions(
            handle,
            &wallet_pubkey,
            fee_sol,
            self.config.compute_unit_limit,
            scaled_token_amount(token_amount),
        );

        let (transaction, blockhash) = self.sign_transaction(&instructions).await?;
        self.preflight(&transaction).await?;
        let signature = self.submit(&transaction, blockhash).await?;

        Ok(TradeResult {
            side: TradeSide::Sell,
            price: None,
            timestamp: Utc::now().timestamp(),
            signature,
        })
    }

    async fn sign_transaction(
        &self,
        instructions: &[Instruction],
    ) -> Result<(VersionedTransaction, Hash), SniperError> {
        let blockhash = self.client.latest_blockhash().await?;
        let message = v0::Message::try_compile(&self.wallet.pubkey(), instructions, &[], blockhash)
            .map_err(|e| SniperError::ProtocolConstraint(format!("message compile failed: {}", e)))?;
        let transaction =
            VersionedTransaction::try_new(VersionedMessage::V0(message), &[self.wallet.keypair()])
                .map_err(|e| SniperError::ProtocolConstraint(format!("signing failed: {}", e)))?;
        Ok((transaction, blockhash))
    }

    async fn preflight(&self, transaction: &VersionedTransaction) -> Result<(), SniperError> {
        simulate_with_retry(SIMULATE_MAX_ATTEMPTS, SIMULATE_RETRY_DELAY, || async move {
            match self.client.simulate_versioned_transaction(transaction).await {
                Ok(result) => match result.err {
                    None => Ok(SimOutcome::Clean),
                    Some(err) => {
                        if let Some(logs) = result.logs {
                            warn!("Simulation logs: {:?}", logs);
                        }
                        Ok(SimOutcome::ExecutionError(format!("{:?}", err)))
                    }
                },
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Exactly one delivery channel, selected by configuration. A relay
    /// failure is a hard trade failure; there is no fallback to direct send.
    async fn submit(
        &self,
        transaction: &VersionedTransaction,
        blockhash: Hash,
    ) -> Result<String, SniperError> {
        if self.config.jito_mode {
            let bundle_id = self
                .jito
                .send_bundle(
                    self.wallet.keypair(),
                    std::slice::from_ref(transaction),
                    blockhash,
                )
                .await?;
            info!("Submitted transaction via bundle, id: {}", bundle_id);
            Ok(bundle_id)
        } else {
            let signature = self.client.send_versioned_transaction(transaction).await?;
            info!("Transaction signature: https://solscan.io/tx/{}", signature);
            Ok(signature.to_string())
        }
    }

    /// A confirmed buy can still deliver zero tokens when slippage or
    /// front-running exhausts the curve; poll until the balance is visible
    /// or the retry budget runs out.
    async fn await_tokens(&self, handle: &TokenHandle) -> Result<f64, SniperError> {
        let retries = self.config.balance_check_retries;
        let delay = Duration::from_secs(self.config.balance_check_delay_secs);

        for attempt in 1..=retries {
            match self.client.get_token_balance(&handle.user_ata).await {
                Ok(balance) => {
                    let ui_amount = balance.ui_amount.unwrap_or(0.0);
                    if ui_amount > 0.0 {
                        info!("Token balance: {}", ui_amount);
                        return Ok(ui_amount);
                    }
                }
                Err(e) => {
                    warn!(
                        "Retry {}/{}: failed to fetch token balance: {}",
                        attempt, retries, e
                    );
                }
            }
            if attempt < retries {
                tokio::time::sleep(delay).await;
            }
        }

        Err(SniperError::NoTokensReceived { attempts: retries })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_simulation_retry_then_single_submission() {
        let attempts = Cell::new(0u32);
        let submissions = Cell::new(0u32);

        // Two execution errors, then a clean pass.
        let preflight = simulate_with_retry(3, Duration::from_millis(1), || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n < 3 {
                    Ok(SimOutcome::ExecutionError(format!("attempt {} rejected", n)))
                } else {
                    Ok(SimOutcome::Clean)
                }
            }
        })
        .await;

        // Submission happens exactly once, after preflight succeeds.
        if preflight.is_ok() {
            submissions.set(submissions.get() + 1);
        }

        assert!(preflight.is_ok());
        assert_eq!(attempts.get(), 3);
        assert_eq!(submissions.get(), 1);
    }

    #[tokio::test]
    async fn test_simulation_exhaustion_blocks_submission() {
        let attempts = Cell::new(0u32);
        let submissions = Cell::new(0u32);

        let preflight = simulate_with_retry(3, Duration::from_millis(1), || {
            attempts.set(attempts.get() + 1);
            async { Ok(SimOutcome::ExecutionError("custom program error".to_string())) }
        })
        .await;

        if preflight.is_ok() {
            submissions.set(submissions.get() + 1);
        }

        assert!(matches!(preflight, Err(SniperError::SimulationFailed(_))));
        assert_eq!(attempts.get(), 3);
        assert_eq!(submissions.get(), 0);
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried_too() {
        let attempts = Cell::new(0u32);

        let preflight = simulate_with_retry(3, Duration::from_millis(1), || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n == 1 {
                    Err(SniperError::TransientRpc("connection reset".to_string()))
                } else {
                    Ok(SimOutcome::Clean)
                }
            }
        })
        .await;

        assert!(preflight.is_ok());
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn test_first_attempt_clean_short_circuits() {
        let attempts = Cell::new(0u32);

        let preflight = simulate_with_retry(3, Duration::from_millis(1), || {
            attempts.set(attempts.get() + 1);
            async { Ok(SimOutcome::Clean) }
        })
        .await;

        assert!(preflight.is_ok());
        assert_eq!(attempts.get(), 1);
    }
}
