// src/trading/curve.rs
//
// Pump.fun bonding curve addressing and on-chain state. A token's curve
// account is a PDA of the trading program; its reserve fields drive both the
// buy quote and the exit price math.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::SniperError;
use crate::solana::SolanaClient;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Pump.fun program ID
pub const PUMP_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Global config account of the trading program
pub const GLOBAL_ACCOUNT: &str = "4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf";

/// Protocol fee recipient
pub const FEE_RECIPIENT: &str = "CebN5WGQ4jvEPvsVU4EoHEpgzq1VV7AbicfhtW4xC9iM";

/// Event authority account
pub const EVENT_AUTHORITY: &str = "Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1";

/// Bonding curve seed for PDA derivation
pub const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";

/// Pump.fun tokens use 6 decimals
pub const TOKEN_DECIMALS: u32 = 6;

/// Serialized length of the curve state: 5 x u64 + 1 x bool, little-endian,
/// no padding. The account may carry trailing bytes; only this prefix is read.
pub const CURVE_STATE_LEN: usize = 41;

/// Attempts when resolving pool state before giving up.
const RESOLVE_MAX_RETRIES: u32 = 3;
/// Backoff between resolution attempts.
const RESOLVE_RETRY_DELAY: Duration = Duration::from_secs(2);

pub fn pump_program_id() -> Pubkey {
    Pubkey::from_str(PUMP_PROGRAM_ID).expect("Invalid PUMP_PROGRAM_ID")
}

/// Derive the bonding curve PDA for a mint. Returns (PDA pubkey, bump seed).
pub fn derive_bonding_curve_pda(mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[BONDING_CURVE_SEED, mint.as_ref()], &pump_program_id())
}

/// Associated token account holding the curve's token-side reserves.
pub fn derive_bonding_curve_ata(bonding_curve: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address(bonding_curve, mint)
}

// ============================================================================
// BONDING CURVE STATE
// ============================================================================

/// On-chain state of one bonding curve. Always a snapshot: reserves move with
/// every trade, so a fresh read is required before quoting.
#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct BondingCurveState {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    /// Whether the curve has completed (token graduated off the curve)
    pub complete: bool,
}

impl BondingCurveState {
    pub fn decode(data: &[u8]) -> Result<Self, SniperError> {
        if data.len() < CURVE_STATE_LEN {
            return Err(SniperError::PoolResolutionFailed(format!(
                "curve account too short: {} bytes",
                data.len()
            )));
        }
        Self::try_from_slice(&data[..CURVE_STATE_LEN])
            .map_err(|e| SniperError::PoolResolutionFailed(format!("curve decode failed: {}", e)))
    }
}

// ============================================================================
// TOKEN HANDLE
// ============================================================================

/// All derived addresses for one in-flight token lifecycle. Built once when a
/// mint is accepted, owned by that lifecycle's task until it terminates.
#[derive(Debug, Clone)]
pub struct TokenHandle {
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub associated_bonding_curve: Pubkey,
    /// The trading wallet's associated token account for this mint
    pub user_ata: Pubkey,
}

impl TokenHandle {
    pub fn derive(mint: Pubkey, wallet: &Pubkey) -> Self {
        let (bonding_curve, _bump) = derive_bonding_curve_pda(&mint);
        let associated_bonding_curve = derive_bonding_curve_ata(&bonding_curve, &mint);
        let user_ata = get_associated_token_address(wallet, &mint);
        Self {
            mint,
            bonding_curve,
            associated_bonding_curve,
            user_ata,
        }
    }
}

// ============================================================================
// POOL RESOLVER
// ============================================================================

/// Fetches and decodes a mint's bonding curve account. Not cached: reserves
/// change block to block, so every call re-reads the chain.
#[derive(Clone)]
pub struct PoolResolver {
    client: Arc<SolanaClient>,
}

impl PoolResolver {
    pub fn new(client: Arc<SolanaClient>) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, handle: &TokenHandle) -> Result<BondingCurveState, SniperError> {
        let mut last_error = String::new();

        for attempt in 1..=RESOLVE_MAX_RETRIES {
            match self.fetch_once(handle).await {
                Ok(state) => {
                    info!("Pool state fetched successfully for {}", handle.mint);
                    return Ok(state);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "Retry {}/{} for pool state of {}: {}",
                        attempt, RESOLVE_MAX_RETRIES, handle.mint, last_error
                    );
                    if attempt < RESOLVE_MAX_RETRIES {
                        tokio::time::sleep(RESOLVE_RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(SniperError::PoolResolutionFailed(last_error))
    }

    async fn fetch_once(&self, handle: &TokenHandle) -> Result<BondingCurveState, SniperError> {
        let account = self
            .client
            .get_account_optional(&handle.bonding_curve, self.client.commitment())
            .await?
            .ok_or(SniperError::PoolNotFound(handle.mint))?;

        BondingCurveState::decode(&account.data)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_state(state: &BondingCurveState) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&state.virtual_token_reserves.to_le_bytes());
        data.extend_from_slice(&state.virtual_sol_reserves.to_le_bytes());
        data.extend_from_slice(&state.real_token_reserves.to_le_bytes());
        data.extend_from_slice(&state.real_sol_reserves.to_le_bytes());
        data.extend_from_slice(&state.token_total_supply.to_le_bytes());
        data.push(state.complete as u8);
        data
    }

    #[test]
    fn test_derive_bonding_curve_pda() {
        let mint = Pubkey::from_str("So11111111111111111111111111111111111111112").unwrap();
        let (pda, bump) = derive_bonding_curve_pda(&mint);

        assert!(bump > 0);
        assert_ne!(pda, mint);
        // Deterministic: deriving twice gives the same address
        assert_eq!(pda, derive_bonding_curve_pda(&mint).0);
    }

    #[test]
    fn test_handle_derivation_is_consistent() {
        let mint = Pubkey::new_unique();
        let wallet = Pubkey::new_unique();
        let handle = TokenHandle::derive(mint, &wallet);

        assert_eq!(handle.mint, mint);
        assert_eq!(
            handle.associated_bonding_curve,
            derive_bonding_curve_ata(&handle.bonding_curve, &mint)
        );
        assert_eq!(handle.user_ata, get_associated_token_address(&wallet, &mint));
    }

    #[test]
    fn test_decode_fixed_layout() {
        let state = BondingCurveState {
            virtual_token_reserves: 1_073_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 793_100_000_000_000,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
        };
        let data = encode_state(&state);
        assert_eq!(data.len(), CURVE_STATE_LEN);

        let decoded = BondingCurveState::decode(&data).unwrap();
        assert_eq!(decoded.virtual_token_reserves, state.virtual_token_reserves);
        assert_eq!(decoded.virtual_sol_reserves, state.virtual_sol_reserves);
        assert_eq!(decoded.token_total_supply, state.token_total_supply);
        assert!(!decoded.complete);
    }

    #[test]
    fn test_decode_tolerates_trailing_bytes() {
        let state = BondingCurveState {
            virtual_token_reserves: 1,
            virtual_sol_reserves: 2,
            real_token_reserves: 3,
            real_sol_reserves: 4,
            token_total_supply: 5,
            complete: true,
        };
        let mut data = encode_state(&state);
        data.extend_from_slice(&[0xAA; 16]);

        let decoded = BondingCurveState::decode(&data).unwrap();
        assert_eq!(decoded.real_sol_reserves, 4);
        assert!(decoded.complete);
    }

    #[test]
    fn test_decode_rejects_short_account() {
        let err = BondingCurveState::decode(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, SniperError::PoolResolutionFailed(_)));
    }
}
