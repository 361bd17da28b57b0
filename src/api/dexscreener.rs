use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const API_TIMEOUT: Duration = Duration::from_secs(15);

// --- Response Structs ---

#[derive(Debug, Deserialize)]
struct DexScreenerResponse {
    pairs: Option<Vec<PairData>>,
}

#[derive(Debug, Deserialize)]
struct PairData {
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    liquidity: Option<LiquidityData>,
}

#[derive(Debug, Deserialize)]
struct LiquidityData {
    usd: Option<f64>,
}

/// Price and liquidity of a token's primary pair.
#[derive(Debug, Clone, Copy)]
pub struct PairQuote {
    pub price_usd: f64,
    pub liquidity_usd: f64,
}

// --- DexScreener Client Implementation ---

/// Looks up the current market quote for a mint. A token too new to be
/// indexed yields `Ok(None)`; the caller waits and retries.
#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    base_url: String,
    client: Client,
}

impl DexScreenerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(API_TIMEOUT)
                .build()
                .context("Failed to create DexScreener HTTP client")?,
        })
    }

    pub async fn get_pair_quote(&self, mint: &str) -> Result<Option<PairQuote>> {
        let url = format!("{}/{}", self.base_url, mint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to DexScreener API")?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("DexScreener API error for {}: {}", mint, status);
            return Ok(None);
        }

        let data: DexScreenerResponse = response
            .json()
            .await
            .context("Failed to parse DexScreener response")?;

        let pair = match data.pairs.and_then(|pairs| pairs.into_iter().next()) {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let price_usd = match pair.price_usd.as_deref().and_then(|p| p.parse::<f64>().ok()) {
            Some(price) => price,
            None => {
                warn!("DexScreener pair for {} has no parseable priceUsd", mint);
                return Ok(None);
            }
        };

        let liquidity_usd = pair.liquidity.and_then(|l| l.usd).unwrap_or(0.0);

        Ok(Some(PairQuote {
            price_usd,
            liquidity_usd,
        }))
    }
}
