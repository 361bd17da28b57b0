//! Jito bundle submission.
//!
//! Packages signed transactions plus a tip payment into one bundle and posts
//! it to a block engine. Tip account and endpoint are picked uniformly at
//! random per submission so a degraded region does not sink every trade.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    message::{v0, VersionedMessage},
    signature::Keypair,
    signer::Signer,
    system_instruction,
    transaction::VersionedTransaction,
};
use std::time::Duration;
use tracing::{error, info};

use crate::error::SniperError;

/// Relay network limit on transactions per bundle (the tip transaction this
/// client appends counts toward the limit on top of the caller's batch).
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Tip accounts operated by the relay, one per region.
pub const TIP_ACCOUNTS: [&str; 3] = [
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe", // Amsterdam
    "Cw8CFyM9FkoMi7K7Cr9B2WarnaF9QvbVgEDjL7VdgZ6t", // NY
    "ADaUMid9zVhPNutdb59uS5iaUF4XRVcfes9KXoehztPa", // Tokyo
];

/// Block engine bundle endpoints, matching regions.
pub const BLOCK_ENGINE_URLS: [&str; 3] = [
    "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://ny.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles",
];

#[derive(Debug, Serialize)]
struct BundleRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Vec<Vec<String>>,
}

impl BundleRequest {
    fn new(transactions: Vec<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method: "sendBundle",
            params: vec![transactions],
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Clone)]
pub struct JitoClient {
    http: Client,
    endpoints: Vec<String>,
    tip_lamports: u64,
}

impl JitoClient {
    pub fn new(tip_lamports: u64) -> Result<Self, SniperError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SniperError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoints: BLOCK_ENGINE_URLS.iter().map(|s| s.to_string()).collect(),
            tip_lamports,
        })
    }

    /// Replace the endpoint pool, e.g. for a self-hosted relay.
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn tip_lamports(&self) -> u64 {
        self.tip_lamports
    }

    /// Submit 1..=5 signed transactions as one bundle, tip appended last.
    /// Returns the bundle id. Oversized batches are rejected before any
    /// network traffic; no retries happen at this layer.
    pub async fn send_bundle(
        &self,
        payer: &Keypair,
        transactions: &[VersionedTransaction],
        blockhash: Hash,
    ) -> Result<String, SniperError> {
        if transactions.is_empty() {
            return Err(SniperError::RelaySubmissionFailed(
                "bundle cannot be empty".to_string(),
            ));
        }
        if transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            return Err(SniperError::RelaySubmissionFailed(format!(
                "bundle cannot contain more than {} transactions",
                MAX_BUNDLE_TRANSACTIONS
            )));
        }

        let tip_transaction = self.build_tip_transaction(payer, blockhash)?;

        let mut encoded = Vec::with_capacity(transactions.len() + 1);
        for transaction in transactions.iter().chain(std::iter::once(&tip_transaction)) {
            let bytes = bincode::serialize(transaction).map_err(|e| {
                SniperError::RelaySubmissionFailed(format!("transaction serialization failed: {}", e))
            })?;
            encoded.push(STANDARD.encode(bytes));
        }

        let endpoint = {
            let mut rng = rand::thread_rng();
            &self.endpoints[rng.gen_range(0..self.endpoints.len())]
        };

        let response = self
            .http
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&BundleRequest::new(encoded))
            .send()
            .await
            .map_err(|e| SniperError::RelaySubmissionFailed(format!("bundle POST failed: {}", e)))?;

        let body: JsonRpcResponse<String> = response.json().await.map_err(|e| {
            SniperError::RelaySubmissionFailed(format!("invalid bundle response: {}", e))
        })?;

        if let Some(err) = body.error {
            error!("Bundle submission rejected: {} (code {})", err.message, err.code);
            return Err(SniperError::RelaySubmissionFailed(err.message));
        }

        let bundle_id = body.result.ok_or_else(|| {
            SniperError::RelaySubmissionFailed("no bundle id in response".to_string())
        })?;

        info!("Bundle submitted, id: {}, endpoint: {}", bundle_id, endpoint);
        Ok(bundle_id)
    }

    fn build_tip_transaction(
        &self,
        payer: &Keypair,
        blockhash: Hash,
    ) -> Result<VersionedTransaction, SniperError> {
        let tip_account: solana_sdk::pubkey::Pubkey = {
            let mut rng = rand::thread_rng();
            TIP_ACCOUNTS[rng.gen_range(0..TIP_ACCOUNTS.len())]
                .parse()
                .expect("Invalid tip account address")
        };

        let tip_instruction =
            system_instruction::transfer(&payer.pubkey(), &tip_account, self.tip_lamports);

        let message = v0::Message::try_compile(&payer.pubkey(), &[tip_instruction], &[], blockhash)
            .map_err(|e| {
                SniperError::RelaySubmissionFailed(format!("tip compile failed: {}", e))
            })?;

        VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
            .map_err(|e| SniperError::RelaySubmissionFailed(format!("tip signing failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: String) -> JitoClient {
        JitoClient::new(10_000)
            .unwrap()
            .with_endpoints(vec![url])
    }

    #[tokio::test]
    async fn test_rejects_oversized_bundle_before_network() {
        // Endpoint is unroutable on purpose: validation must fail first.
        let client = client_for("http://127.0.0.1:1/api/v1/bundles".to_string());
        let payer = Keypair::new();
        let batch = vec![VersionedTransaction::default(); 6];

        let err = client
            .send_bundle(&payer, &batch, Hash::default())
            .await
            .unwrap_err();
        match err {
            SniperError::RelaySubmissionFailed(msg) => assert!(msg.contains("more than 5")),
            other => panic!("expected RelaySubmissionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_bundle() {
        let client = client_for("http://127.0.0.1:1/api/v1/bundles".to_string());
        let payer = Keypair::new();

        let err = client
            .send_bundle(&payer, &[], Hash::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SniperError::RelaySubmissionFailed(_)));
    }

    #[tokio::test]
    async fn test_bundle_id_returned_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/bundles")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","result":"abc123","id":1}"#)
            .create_async()
            .await;

        let client = client_for(format!("{}/api/v1/bundles", server.url()));
        let payer = Keypair::new();
        let batch = vec![VersionedTransaction::default()];

        let bundle_id = client
            .send_bundle(&payer, &batch, Hash::default())
            .await
            .unwrap();
        assert_eq!(bundle_id, "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_field_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/bundles")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"rate limited"},"id":1}"#)
            .create_async()
            .await;

        let client = client_for(format!("{}/api/v1/bundles", server.url()));
        let payer = Keypair::new();
        let batch = vec![VersionedTransaction::default()];

        let err = client
            .send_bundle(&payer, &batch, Hash::default())
            .await
            .unwrap_err();
        match err {
            SniperError::RelaySubmissionFailed(msg) => assert!(msg.contains("rate limited")),
            other => panic!("expected RelaySubmissionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_request_shape() {
        let request = BundleRequest::new(vec!["tx1".to_string(), "tx2".to_string()]);
        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.method, "sendBundle");
        assert_eq!(request.params.len(), 1);
        assert_eq!(request.params[0].len(), 2);
    }

    #[test]
    fn test_tip_accounts_are_valid_pubkeys() {
        for account in TIP_ACCOUNTS {
            assert!(account.parse::<solana_sdk::pubkey::Pubkey>().is_ok());
        }
    }
}
