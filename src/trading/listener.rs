// src/trading/listener.rs
//
// Event ingestion: subscribes to the Pump.fun program's log stream, picks
// out mint events, and dispatches one lifecycle task per accepted token.
// The concurrency gate brackets every lifecycle; dropped events are gone,
// there is no queue.

use futures::StreamExt;
use solana_client::{
    nonblocking::pubsub_client::PubsubClient,
    rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter},
    rpc_response::RpcLogsResponse,
};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiMessage,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{log_classified, SniperError};
use crate::filter::TokenFilter;
use crate::solana::SolanaClient;
use crate::trading::curve::PUMP_PROGRAM_ID;
use crate::trading::executor::TradeExecutor;
use crate::trading::gate::{ConcurrencyGate, GateRejection, SlotGuard};
use crate::trading::monitor::ExitMonitor;

/// Log line marker identifying a token mint in a transaction's log batch.
const MINT_LOG_MARKER: &str = "MintTo";

/// Delay between accepting a mint and trading it, so the pool account has
/// propagated to the RPC node we read from.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Accounts pulled out of a mint-creation transaction.
#[derive(Debug, Clone)]
pub struct MintEventAccounts {
    pub wallet: Pubkey,
    pub mint: Pubkey,
    pub pool_token_account: Pubkey,
}

/// Positional account extraction for the counterparty program's known
/// create-instruction shape. The indices are version data: if the program
/// reorders its accounts, this accessor is what changes, not the pipeline.
#[derive(Debug, Clone)]
pub struct MintEventAccessor {
    wallet_index: usize,
    mint_index: usize,
    pool_token_account_index: usize,
}

impl Default for MintEventAccessor {
    fn default() -> Self {
        Self {
            wallet_index: 0,
            mint_index: 1,
            pool_token_account_index: 4,
        }
    }
}

impl MintEventAccessor {
    /// Accessor for a program version whose create transaction lays its
    /// accounts out differently.
    pub fn new(wallet_index: usize, mint_index: usize, pool_token_account_index: usize) -> Self {
        Self {
            wallet_index,
            mint_index,
            pool_token_account_index,
        }
    }

    pub fn extract(&self, account_keys: &[String]) -> Result<MintEventAccounts, SniperError> {
        let key_at = |index: usize| -> Result<Pubkey, SniperError> {
            let key = account_keys.get(index).ok_or_else(|| {
                SniperError::ProtocolConstraint(format!(
                    "account index {} out of range ({} keys)",
                    index,
                    account_keys.len()
                ))
            })?;
            Pubkey::from_str(key).map_err(|e| {
                SniperError::ProtocolConstraint(format!("invalid account key at {}: {}", index, e))
            })
        };

        Ok(MintEventAccounts {
            wallet: key_at(self.wallet_index)?,
            mint: key_at(self.mint_index)?,
            pool_token_account: key_at(self.pool_token_account_index)?,
        })
    }
}

fn is_mint_event(logs: &[String]) -> bool {
    logs.iter().any(|log| log.contains(MINT_LOG_MARKER))
}

fn parsed_account_keys(
    transaction: &EncodedConfirmedTransactionWithStatusMeta,
) -> Result<Vec<String>, SniperError> {
    match &transaction.transaction.transaction {
        EncodedTransaction::Json(ui_transaction) => match &ui_transaction.message {
            UiMessage::Parsed(message) => Ok(message
                .account_keys
                .iter()
                .map(|key| key.pubkey.clone())
                .collect()),
            _ => Err(SniperError::ProtocolConstraint(
                "transaction message is not parsed".to_string(),
            )),
        },
        _ => Err(SniperError::ProtocolConstraint(
            "transaction is not JSON-encoded".to_string(),
        )),
    }
}

pub struct PumpListener {
    config: Arc<Config>,
    client: Arc<SolanaClient>,
    executor: Arc<TradeExecutor>,
    monitor: Arc<ExitMonitor>,
    filter: Arc<dyn TokenFilter>,
    gate: Arc<ConcurrencyGate>,
    accessor: MintEventAccessor,
}

impl PumpListener {
    pub fn new(
        config: Arc<Config>,
        client: Arc<SolanaClient>,
        executor: Arc<TradeExecutor>,
        monitor: Arc<ExitMonitor>,
        filter: Arc<dyn TokenFilter>,
        gate: Arc<ConcurrencyGate>,
    ) -> Self {
        Self {
            config,
            client,
            executor,
            monitor,
            filter,
            gate,
            accessor: MintEventAccessor::default(),
        }
    }

    /// Subscribe and process mint events until the stream ends. A failure to
    /// establish the subscription is fatal and propagates; a failure while
    /// handling one event only costs that event.
    pub async fn run(&self) -> Result<(), SniperError> {
        info!("Tracking new pools on pump.fun...");

        let pubsub_client = PubsubClient::new(&self.config.ws_url)
            .await
            .map_err(|e| SniperError::Subscription(format!("WebSocket connect failed: {}", e)))?;

        let (mut logs_stream, _unsubscribe) = pubsub_client
            .logs_subscribe(
                RpcTransactionLogsFilter::Mentions(vec![PUMP_PROGRAM_ID.to_string()]),
                RpcTransactionLogsConfig {
                    commitment: Some(self.config.commitment()),
                },
            )
            .await
            .map_err(|e| SniperError::Subscription(format!("logs subscription failed: {}", e)))?;

        while let Some(response) = logs_stream.next().await {
            self.handle_log_event(response.value).await;
        }

        warn!("Log stream ended");
        Ok(())
    }

    async fn handle_log_event(&self, event: RpcLogsResponse) {
        // Failed transactions mint nothing worth chasing.
        if event.err.is_some() || !is_mint_event(&event.logs) {
            return;
        }

        if self.gate.is_full() {
            warn!(
                "Maximum concurrent tokens ({}) reached, skipping new token",
                self.gate.capacity()
            );
            return;
        }

        info!("============== Discovered new token on pump.fun ==============");
        info!("Transaction signature: {}", event.signature);

        if let Err(e) = self.accept_token(&event.signature).await {
            log_classified("listener", &e);
        }
    }

    async fn accept_token(&self, signature: &str) -> Result<(), SniperError> {
        let signature = Signature::from_str(signature)
            .map_err(|e| SniperError::ProtocolConstraint(format!("invalid signature: {}", e)))?;

        let transaction = self
            .client
            .get_parsed_transaction(&signature, self.config.fetch_commitment())
            .await?;
        let account_keys = parsed_account_keys(&transaction)?;
        let accounts = self.accessor.extract(&account_keys)?;
        debug!(
            "Mint event accounts: wallet={}, mint={}, pool_ata={}",
            accounts.wallet, accounts.mint, accounts.pool_token_account
        );

        let slot = match self.gate.try_acquire(accounts.mint) {
            Ok(slot) => slot,
            Err(GateRejection::AtCapacity) => {
                warn!(
                    "Maximum concurrent tokens ({}) reached, skipping {}",
                    self.gate.capacity(),
                    accounts.mint
                );
                return Ok(());
            }
            Err(GateRejection::AlreadyTracked) => {
                warn!("Lifecycle already running for {}, skipping", accounts.mint);
                return Ok(());
            }
        };

        // The lifecycle runs off the subscription loop; the slot guard moves
        // with it and releases the gate however the task ends.
        let config = Arc::clone(&self.config);
        let client = Arc::clone(&self.client);
        let executor = Arc::clone(&self.executor);
        let monitor = Arc::clone(&self.monitor);
        let filter = Arc::clone(&self.filter);
        tokio::spawn(async move {
            run_lifecycle(config, client, executor, monitor, filter, slot).await;
        });

        Ok(())
    }
}

/// One token's full lifecycle: settle, filter, buy, monitor until sold.
/// The slot guard owned by this task releases the gate on every exit path.
async fn run_lifecycle(
    config: Arc<Config>,
    client: Arc<SolanaClient>,
    executor: Arc<TradeExecutor>,
    monitor: Arc<ExitMonitor>,
    filter: Arc<dyn TokenFilter>,
    slot: SlotGuard,
) {
    let mint = *slot.mint();

    // Let pool initialization propagate before the first read.
    tokio::time::sleep(SETTLE_DELAY).await;

    if config.check_filter {
        match filter.check(&mint, &client, config.commitment()).await {
            Ok(verdict) if verdict.pass => {
                info!("🚀 Token passed filter check, proceeding to buy");
            }
            Ok(verdict) => {
                info!("🚀 Token failed filter check, skipping: {}", verdict.reason);
                return;
            }
            Err(e) => {
                log_classified(&format!("filter({})", mint), &e);
                return;
            }
        }
    }

    match executor.buy(mint).await {
        Ok(outcome) => match outcome.result.price {
            Some(buy_price) => {
                monitor
                    .run(
                        &outcome.handle,
                        outcome.tokens_received,
                        buy_price,
                        outcome.result.timestamp,
                    )
                    .await;
            }
            None => warn!("Invalid purchase result for {}: no executed price", mint),
        },
        Err(e) => log_classified(&format!("lifecycle({})", mint), &e),
    }
}

// ============================================================================
// TESTS
// ============================================================================
