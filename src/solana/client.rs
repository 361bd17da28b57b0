use solana_account_decoder::parse_token::UiTokenAmount;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig, RpcTransactionConfig},
    rpc_response::RpcSimulateTransactionResult,
};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::SniperError;

/// Maximum client-side resends when broadcasting directly over RPC.
const SEND_MAX_RETRIES: usize = 5;

/// Thin wrapper over the nonblocking RPC client. Every method maps transport
/// failures to `SniperError::TransientRpc`; callers decide whether to retry.
#[derive(Clone)]
pub struct SolanaClient {
    rpc_client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl SolanaClient {
    /// Connect and verify the endpoint answers before any trading starts.
    pub async fn connect(rpc_url: &str, commitment: CommitmentConfig) -> Result<Self, SniperError> {
        let rpc_client = RpcClient::new_with_commitment(rpc_url.to_string(), commitment);
        match rpc_client.get_latest_blockhash().await {
            Ok(_) => info!("Successfully connected to Solana RPC: {}", rpc_url),
            Err(e) => {
                error!("Failed to connect to Solana RPC {}: {}", rpc_url, e);
                return Err(SniperError::TransientRpc(format!(
                    "Failed to connect to RPC {}: {}",
                    rpc_url, e
                )));
            }
        }

        Ok(Self {
            rpc_client: Arc::new(rpc_client),
            commitment,
        })
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    pub async fn get_sol_balance(&self, pubkey: &Pubkey) -> Result<u64, SniperError> {
        self.rpc_client
            .get_balance(pubkey)
            .await
            .map_err(|e| SniperError::TransientRpc(format!("Failed to get balance: {}", e)))
    }

    /// Fetch an account; a missing account is `Ok(None)`, not an error.
    pub async fn get_account_optional(
        &self,
        pubkey: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<Account>, SniperError> {
        let response = self
            .rpc_client
            .get_account_with_commitment(pubkey, commitment)
            .await
            .map_err(|e| SniperError::TransientRpc(format!("Failed to get account {}: {}", pubkey, e)))?;
        Ok(response.value)
    }

    pub async fn get_token_balance(&self, ata: &Pubkey) -> Result<UiTokenAmount, SniperError> {
        self.rpc_client
            .get_token_account_balance(ata)
            .await
            .map_err(|e| {
                SniperError::TransientRpc(format!("Failed to get token balance for {}: {}", ata, e))
            })
    }

    pub async fn latest_blockhash(&self) -> Result<Hash, SniperError> {
        self.rpc_client
            .get_latest_blockhash()
            .await
            .map_err(|e| SniperError::TransientRpc(format!("Failed to get latest blockhash: {}", e)))
    }

    /// Preflight a signed transaction. A transport failure is an `Err`; an
    /// on-chain execution error comes back inside the result's `err` field.
    pub async fn simulate_versioned_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<RpcSimulateTransactionResult, SniperError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true, // tolerate a blockhash replaced since build
            commitment: Some(self.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            accounts: None,
            min_context_slot: None,
            inner_instructions: false,
        };

        let response = self
            .rpc_client
            .simulate_transaction_with_config(transaction, config)
            .await
            .map_err(|e| SniperError::TransientRpc(format!("Simulation request failed: {}", e)))?;

        Ok(response.value)
    }

    /// Broadcast a signed transaction with client-side resend retries.
    pub async fn send_versioned_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, SniperError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            max_retries: Some(SEND_MAX_RETRIES),
            min_context_slot: None,
        };

        let signature = self
            .rpc_client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| SniperError::TransientRpc(format!("Send failed: {}", e)))?;

        debug!("Transaction sent with signature: {}", signature);
        Ok(signature)
    }

    pub async fn get_parsed_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<EncodedConfirmedTransactionWithStatusMeta, SniperError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(commitment),
            max_supported_transaction_version: Some(0),
        };

        self.rpc_client
            .get_transaction_with_config(signature, config)
            .await
            .map_err(|e| {
                SniperError::TransientRpc(format!("Failed to fetch transaction {}: {}", signature, e))
            })
    }

    /// Recent prioritization fees paid for write locks on the given accounts,
    /// in lamports. Order is whatever the node returns.
    pub async fn recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<u64>, SniperError> {
        let fees = self
            .rpc_client
            .get_recent_prioritization_fees(accounts)
            .await
            .map_err(|e| {
                SniperError::TransientRpc(format!("Failed to get prioritization fees: {}", e))
            })?;

        Ok(fees.into_iter().map(|f| f.prioritization_fee).collect())
    }
}
