// src/trading/builder.rs
//
// Instruction construction for bonding-curve swaps. The account meta order
// and the instruction data layout are a wire contract with the on-chain
// program; any change breaks execution with a seed/constraint error.

use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
    sysvar::rent,
};
use spl_associated_token_account::instruction::create_associated_token_account;
use std::str::FromStr;

use crate::config::LAMPORTS_PER_SOL;
use crate::trading::curve::{
    pump_program_id, TokenHandle, EVENT_AUTHORITY, FEE_RECIPIENT, GLOBAL_ACCOUNT, TOKEN_DECIMALS,
};

/// Method selector for the buy instruction
pub const BUY_SELECTOR: [u8; 8] = [0x66, 0x06, 0x3d, 0x12, 0x01, 0xda, 0xeb, 0xea];
/// Method selector for the sell instruction
pub const SELL_SELECTOR: [u8; 8] = [0xb1, 0xd9, 0x74, 0x28, 0xd0, 0x65, 0x02, 0x9b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

fn global_account() -> Pubkey {
    Pubkey::from_str(GLOBAL_ACCOUNT).expect("Invalid GLOBAL_ACCOUNT")
}

fn fee_recipient() -> Pubkey {
    Pubkey::from_str(FEE_RECIPIENT).expect("Invalid FEE_RECIPIENT")
}

fn event_authority() -> Pubkey {
    Pubkey::from_str(EVENT_AUTHORITY).expect("Invalid EVENT_AUTHORITY")
}

// ============================================================================
// AMOUNT MATH
// ============================================================================

/// Expected token output for a SOL input, from the curve's virtual reserves.
/// Floors the constant-product quote; the widening multiply avoids overflow
/// at launch-size reserves.
pub fn token_out_for_sol_in(sol_in_lamports: u64, virtual_sol: u64, virtual_token: u64) -> u64 {
    if virtual_sol == 0 {
        return 0;
    }
    ((sol_in_lamports as u128 * virtual_token as u128) / virtual_sol as u128) as u64
}

/// Slippage-adjusted maximum SOL spend, in lamports.
pub fn max_sol_cost(sol_in: f64, slippage_fraction: f64) -> u64 {
    (sol_in * LAMPORTS_PER_SOL * (1.0 + slippage_fraction)).round() as u64
}

/// Token UI amount scaled to the fixed 6-decimal base units.
pub fn scaled_token_amount(ui_amount: f64) -> u64 {
    (ui_amount * 10f64.powi(TOKEN_DECIMALS as i32)).round() as u64
}

/// Compute-unit price in micro-lamports such that the whole budget costs
/// roughly `fee_sol`.
pub fn compute_unit_price_micro_lamports(fee_sol: f64, compute_unit_limit: u32) -> u64 {
    (fee_sol * 1e9 / compute_unit_limit as f64 * 1e6).floor() as u64
}

// ============================================================================
// INSTRUCTION ENCODING
// ============================================================================

/// Swap instruction data: 8-byte selector + two little-endian u64 fields.
/// Buy: (token amount out, max SOL cost). Sell: (token amount in, min SOL out).
fn swap_instruction_data(side: TradeSide, amount: u64, limit: u64) -> Vec<u8> {
    let selector = match side {
        TradeSide::Buy => BUY_SELECTOR,
        TradeSide::Sell => SELL_SELECTOR,
    };
    let mut data = Vec::with_capacity(24);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&amount.to_le_bytes());
    data.extend_from_slice(&limit.to_le_bytes());
    data
}

/// Account metas in the exact order the program expects. Identical for buy
/// and sell.
fn swap_account_metas(handle: &TokenHandle, user: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(global_account(), false),
        AccountMeta::new(fee_recipient(), false),
        AccountMeta::new_readonly(handle.mint, false),
        AccountMeta::new(handle.bonding_curve, false),
        AccountMeta::new(handle.associated_bonding_curve, false),
        AccountMeta::new(handle.user_ata, false),
        AccountMeta::new(*user, true),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(rent::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(event_authority(), false),
    ]
}

pub fn build_swap_instruction(
    side: TradeSide,
    handle: &TokenHandle,
    user: &Pubkey,
    amount: u64,
    limit: u64,
) -> Instruction {
    Instruction {
        program_id: pump_program_id(),
        accounts: swap_account_metas(handle, user),
        data: swap_instruction_data(side, amount, limit),
    }
}

/// Full buy instruction list: compute-unit price, compute-unit limit,
/// optionally the buyer's ATA creation, then the swap.
#[allow(clippy::too_many_arguments)]
pub fn build_buy_instructions(
    handle: &TokenHandle,
    user: &Pubkey,
    fee_sol: f64,
    compute_unit_limit: u32,
    token_out: u64,
    max_cost_lamports: u64,
    create_ata: bool,
) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(4);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
        compute_unit_price_micro_lamports(fee_sol, compute_unit_limit),
    ));
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
        compute_unit_limit,
    ));

    if create_ata {
        instructions.push(create_associated_token_account(
            user,
            user,
            &handle.mint,
            &spl_token::id(),
        ));
    }

    instructions.push(build_swap_instruction(
        TradeSide::Buy,
        handle,
        user,
        token_out,
        max_cost_lamports,
    ));
    instructions
}

/// Full sell instruction list. No ATA creation: a position implies the
/// account already exists. Min SOL out is encoded as zero, matching the
/// counterparty wire format.
pub fn build_sell_instructions(
    handle: &TokenHandle,
    user: &Pubkey,
    fee_sol: f64,
    compute_unit_limit: u32,
    token_amount: u64,
) -> Vec<Instruction> {
    vec![
        ComputeBudgetInstruction::set_compute_unit_price(compute_unit_price_micro_lamports(
            fee_sol,
            compute_unit_limit,
        )),
        ComputeBudgetInstruction::set_compute_unit_limit(compute_unit_limit),
        build_swap_instruction(TradeSide::Sell, handle, user, token_amount, 0),
    ]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::compute_budget;

    fn sample_handle() -> (TokenHandle, Pubkey) {
        let user = Pubkey::new_unique();
        let handle = TokenHandle::derive(Pubkey::new_unique(), &user);
        (handle, user)
    }

    #[test]
    fn test_token_out_estimate() {
        // 1 SOL virtual / 2 tokens virtual, 0.1 SOL in -> 0.2 tokens out
        assert_eq!(
            token_out_for_sol_in(100_000_000, 1_000_000_000, 2_000_000_000),
            200_000_000
        );
    }

    #[test]
    fn test_token_out_zero_reserves() {
        assert_eq!(token_out_for_sol_in(100_000_000, 0, 2_000_000_000), 0);
    }

    #[test]
    fn test_max_sol_cost_with_slippage() {
        assert_eq!(max_sol_cost(1.0, 0.01), 1_010_000_000);
    }

    #[test]
    fn test_scaled_token_amount() {
        assert_eq!(scaled_token_amount(1.5), 1_500_000);
        assert_eq!(scaled_token_amount(0.000001), 1);
    }

    #[test]
    fn test_compute_unit_price() {
        // 0.0005 SOL over 200k CU -> 2500 micro-lamports per CU
        assert_eq!(compute_unit_price_micro_lamports(0.0005, 200_000), 2_500);
    }

    #[test]
    fn test_buy_instruction_data_layout() {
        let (handle, user) = sample_handle();
        let ix = build_swap_instruction(TradeSide::Buy, &handle, &user, 200_000_000, 1_010_000_000);

        assert_eq!(ix.program_id, pump_program_id());
        assert_eq!(ix.data.len(), 24);
        assert_eq!(&ix.data[..8], &BUY_SELECTOR);
        assert_eq!(&ix.data[8..16], &200_000_000u64.to_le_bytes());
        assert_eq!(&ix.data[16..24], &1_010_000_000u64.to_le_bytes());
    }

    #[test]
    fn test_sell_instruction_encodes_zero_min_out() {
        let (handle, user) = sample_handle();
        let ix = build_swap_instruction(TradeSide::Sell, &handle, &user, 1_500_000, 0);

        assert_eq!(&ix.data[..8], &SELL_SELECTOR);
        assert_eq!(&ix.data[16..24], &0u64.to_le_bytes());
    }

    #[test]
    fn test_account_meta_order() {
        let (handle, user) = sample_handle();
        let ix = build_swap_instruction(TradeSide::Buy, &handle, &user, 1, 1);

        assert_eq!(ix.accounts.len(), 12);
        assert_eq!(ix.accounts[2].pubkey, handle.mint);
        assert_eq!(ix.accounts[3].pubkey, handle.bonding_curve);
        assert_eq!(ix.accounts[4].pubkey, handle.associated_bonding_curve);
        assert_eq!(ix.accounts[5].pubkey, handle.user_ata);
        assert_eq!(ix.accounts[6].pubkey, user);
        assert!(ix.accounts[6].is_signer);
        assert_eq!(ix.accounts[7].pubkey, system_program::id());
        assert_eq!(ix.accounts[8].pubkey, spl_token::id());
        assert_eq!(ix.accounts[9].pubkey, rent::id());
        assert_eq!(ix.accounts[10].pubkey, spl_associated_token_account::id());

        // writable set: fee recipient, curve, curve ATA, user ATA, user
        for idx in [1, 3, 4, 5, 6] {
            assert!(ix.accounts[idx].is_writable, "account {} should be writable", idx);
        }
        for idx in [0, 2, 7, 8, 9, 10, 11] {
            assert!(!ix.accounts[idx].is_writable, "account {} should be readonly", idx);
        }
    }

    #[test]
    fn test_buy_instruction_ordering_with_ata() {
        let (handle, user) = sample_handle();
        let ixs = build_buy_instructions(&handle, &user, 0.0005, 200_000, 1, 1, true);

        assert_eq!(ixs.len(), 4);
        assert_eq!(ixs[0].program_id, compute_budget::id());
        assert_eq!(ixs[1].program_id, compute_budget::id());
        assert_eq!(ixs[2].program_id, spl_associated_token_account::id());
        assert_eq!(ixs[3].program_id, pump_program_id());
    }

    #[test]
    fn test_buy_instruction_ordering_without_ata() {
        let (handle, user) = sample_handle();
        let ixs = build_buy_instructions(&handle, &user, 0.0005, 200_000, 1, 1, false);

        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[2].program_id, pump_program_id());
    }

    #[test]
    fn test_sell_instruction_ordering() {
        let (handle, user) = sample_handle();
        let ixs = build_sell_instructions(&handle, &user, 0.0005, 200_000, 1_000_000);

        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, compute_budget::id());
        assert_eq!(ixs[1].program_id, compute_budget::id());
        assert_eq!(ixs[2].program_id, pump_program_id());
    }
}
