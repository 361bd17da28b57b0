// src/trading/monitor.rs
//
// Per-token exit loop: sell on take-profit, stop-loss, or when the holding
// time runs out. One monitor runs per bought token, concurrently with
// others, until the position is closed.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::DexScreenerClient;
use crate::config::Config;
use crate::error::log_classified;
use crate::trading::curve::TokenHandle;
use crate::trading::executor::TradeExecutor;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Decision for one monitor iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    /// Maximum holding time reached; exit regardless of price.
    HoldExpired,
    TakeProfit,
    StopLoss,
    /// Keep holding.
    Hold,
}

#[derive(Debug, Clone)]
pub struct ExitParams {
    pub take_profit_fraction: f64,
    pub stop_loss_fraction: f64,
    pub hold_duration_secs: i64,
    /// Cap on failed price-triggered sells before deferring to the
    /// hold-duration exit. 0 = retry indefinitely.
    pub max_sell_retries: u32,
}

impl ExitParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            take_profit_fraction: config.take_profit_percent / 100.0,
            stop_loss_fraction: config.stop_loss_percent / 100.0,
            hold_duration_secs: config.hold_duration_secs,
            max_sell_retries: config.max_sell_retries,
        }
    }
}

/// Relative move from the cost basis.
pub fn price_change(current: f64, buy_price: f64) -> f64 {
    (current - buy_price) / buy_price
}

/// Pure exit decision. The holding-time trigger wins over price triggers and
/// needs no price data; `None` price change (feed has no pair yet) holds.
pub fn evaluate_exit(
    elapsed_secs: i64,
    hold_duration_secs: i64,
    change: Option<f64>,
    take_profit_fraction: f64,
    stop_loss_fraction: f64,
) -> ExitSignal {
    if elapsed_secs >= hold_duration_secs {
        return ExitSignal::HoldExpired;
    }
    match change {
        Some(change) if change >= take_profit_fraction => ExitSignal::TakeProfit,
        Some(change) if change <= -stop_loss_fraction => ExitSignal::StopLoss,
        _ => ExitSignal::Hold,
    }
}

pub struct ExitMonitor {
    executor: Arc<TradeExecutor>,
    price_feed: Arc<DexScreenerClient>,
    params: ExitParams,
}

impl ExitMonitor {
    pub fn new(
        executor: Arc<TradeExecutor>,
        price_feed: Arc<DexScreenerClient>,
        params: ExitParams,
    ) -> Self {
        Self {
            executor,
            price_feed,
            params,
        }
    }

    /// Watch one position until it is sold. Sell failures are logged and the
    /// loop continues; the hold-duration trigger keeps firing until the
    /// position actually closes.
    pub async fn run(
        &self,
        handle: &TokenHandle,
        token_amount: f64,
        buy_price: f64,
        buy_timestamp: i64,
    ) {
        info!("Starting price monitoring for {}", handle.mint);

        let mut failed_price_sells = 0u32;
        let mut price_exits_suspended = false;

        loop {
            let elapsed = Utc::now().timestamp() - buy_timestamp;

            if evaluate_exit(
                elapsed,
                self.params.hold_duration_secs,
                None,
                self.params.take_profit_fraction,
                self.params.stop_loss_fraction,
            ) == ExitSignal::HoldExpired
            {
                info!(
                    "Holding time exceeded: {} seconds, triggering sell",
                    self.params.hold_duration_secs
                );
                if self.try_sell(handle, token_amount).await {
                    info!("Successfully sold {} after holding duration", handle.mint);
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }

            let quote = match self
                .price_feed
                .get_pair_quote(&handle.mint.to_string())
                .await
            {
                Ok(Some(quote)) => quote,
                Ok(None) => {
                    warn!("No pair data for {} yet, retrying...", handle.mint);
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
                Err(e) => {
                    log_classified("price feed", &e);
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
            };

            info!(
                "Token: {}, Price: ${}, Liquidity: ${}",
                handle.mint, quote.price_usd, quote.liquidity_usd
            );

            let change = price_change(quote.price_usd, buy_price);
            let signal = if price_exits_suspended {
                ExitSignal::Hold
            } else {
                evaluate_exit(
                    elapsed,
                    self.params.hold_duration_secs,
                    Some(change),
                    self.params.take_profit_fraction,
                    self.params.stop_loss_fraction,
                )
            };

            match signal {
                ExitSignal::TakeProfit => {
                    info!(
                        "Triggering profit sell: {:.2}% >= {:.2}%",
                        change * 100.0,
                        self.params.take_profit_fraction * 100.0
                    );
                    if self.try_sell(handle, token_amount).await {
                        info!("Successfully sold {}", handle.mint);
                        return;
                    }
                    failed_price_sells += 1;
                    price_exits_suspended = self.sell_budget_spent(failed_price_sells);
                }
                ExitSignal::StopLoss => {
                    info!(
                        "Triggering stop-loss sell: {:.2}% <= -{:.2}%",
                        change * 100.0,
                        self.params.stop_loss_fraction * 100.0
                    );
                    if self.try_sell(handle, token_amount).await {
                        info!("Successfully sold {}", handle.mint);
                        return;
                    }
                    failed_price_sells += 1;
                    price_exits_suspended = self.sell_budget_spent(failed_price_sells);
                }
                ExitSignal::Hold | ExitSignal::HoldExpired => {}
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn try_sell(&self, handle: &TokenHandle, token_amount: f64) -> bool {
        match self.executor.sell(handle, token_amount).await {
            Ok(_) => true,
            Err(e) => {
                log_classified("sell", &e);
                false
            }
        }
    }

    fn sell_budget_spent(&self, failed_sells: u32) -> bool {
        if self.params.max_sell_retries > 0 && failed_sells >= self.params.max_sell_retries {
            warn!(
                "Price-triggered sell failed {} times, deferring to the hold-duration exit",
                failed_sells
            );
            true
        } else {
            false
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
