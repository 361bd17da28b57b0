// src/trading/fees.rs
//
// Priority fee estimation from recently observed network fees.

use std::sync::Arc;
use tracing::warn;

use crate::solana::SolanaClient;
use crate::trading::curve::pump_program_id;

/// Upper bound on the recommended fee, in SOL. Keeps a congested fee market
/// from eating the position.
const FEE_CEILING_SOL: f64 = 0.005;

/// Picks a transaction fee from recent prioritization fees paid for write
/// locks on the trading program. Infallible: any fetch problem or an empty
/// sample falls back to the configured static fee.
#[derive(Clone)]
pub struct FeeEstimator {
    client: Arc<SolanaClient>,
    static_fee_sol: f64,
}

impl FeeEstimator {
    pub fn new(client: Arc<SolanaClient>, static_fee_sol: f64) -> Self {
        Self {
            client,
            static_fee_sol,
        }
    }

    pub async fn recommend(&self) -> f64 {
        match self
            .client
            .recent_prioritization_fees(&[pump_program_id()])
            .await
        {
            Ok(samples) => recommend_from_samples(samples, self.static_fee_sol),
            Err(e) => {
                warn!("Failed to fetch dynamic priority fee, using static fee: {}", e);
                self.static_fee_sol
            }
        }
    }
}

/// Median of the observed fees, converted to SOL and clamped to
/// `[static_fee, FEE_CEILING_SOL]`.
pub fn recommend_from_samples(mut samples: Vec<u64>, static_fee_sol: f64) -> f64 {
    if samples.is_empty() {
        warn!("No recent prioritization fee data, using static fee");
        return static_fee_sol;
    }

    samples.sort_unstable();
    let median = samples[samples.len() / 2];
    let adjusted = (median as f64 / 1e9).max(static_fee_sol);
    adjusted.min(FEE_CEILING_SOL)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIC_FEE: f64 = 0.0005;

    #[test]
    fn test_empty_sample_returns_static_fee() {
        assert_eq!(recommend_from_samples(Vec::new(), STATIC_FEE), STATIC_FEE);
    }

    #[test]
    fn test_low_median_floors_at_static_fee() {
        // Median of 300 lamports is far below the static fee
        let fee = recommend_from_samples(vec![100, 300, 500], STATIC_FEE);
        assert_eq!(fee, STATIC_FEE);
    }

    #[test]
    fn test_high_median_is_capped() {
        // 10 SOL worth of lamports, clamped to the ceiling
        let fee = recommend_from_samples(vec![10_000_000_000, 10_000_000_000, 10_000_000_000], STATIC_FEE);
        assert_eq!(fee, FEE_CEILING_SOL);
    }

    #[test]
    fn test_median_between_bounds() {
        // 2_000_000 lamports = 0.002 SOL, between floor and ceiling
        let fee = recommend_from_samples(vec![1_000_000, 2_000_000, 3_000_000], STATIC_FEE);
        assert!((fee - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let fee = recommend_from_samples(vec![3_000_000, 1_000_000, 2_000_000], STATIC_FEE);
        assert!((fee - 0.002).abs() < 1e-12);
    }
}
