//! # Batch Settlement Engine
//!
//! The two relayed intakes that move value between the liquid bucket and
//! pending debt:
//!
//! - **Debt intake** accepts postings for L2 users paid out on L1. Liquidity
//!   becomes pending debt and the L2 block watermark advances.
//! - **Settlement** accepts a settled batch from L2. Pending debt is retired
//!   and principal plus LP fees land back in the liquid bucket, raising the
//!   share price without minting.
//!
//! Each intake is split into a pure check pass that computes the post-call
//! state, and an apply pass that only assigns it. A check failure therefore
//! cannot leave anything half-written.

use alloy_primitives::U256;

use crate::error::{ensure_address, ensure_amount, VaultError, VaultResult};
use crate::ledger::VaultState;
use crate::types::{DebtPosting, SettlementPayload};

// ---------------------------------------------------------------------------
// Debt intake
// ---------------------------------------------------------------------------

/// Post-state of an accepted debt intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakePlan {
    /// Sum of all posting amounts.
    pub total: U256,
    pub liquid_balance: U256,
    pub pending_debt: U256,
    pub last_processed_block: u64,
}

/// Validates a batch of postings against `state`.
///
/// Every posting is checked against the watermark as it stood at call
/// start, so a batch may list blocks in any order as long as all of them are
/// new. The cumulative amount is checked incrementally against the liquid
/// balance.
pub fn check_postings(state: &VaultState, postings: &[DebtPosting]) -> VaultResult<IntakePlan> {
    let watermark = state.last_processed_block;
    let mut total = U256::ZERO;
    let mut highest = watermark;

    for posting in postings {
        ensure_address(posting.recipient)?;
        ensure_amount(posting.amount)?;

        if posting.l2_block <= watermark {
            return Err(VaultError::BlockAlreadyProcessed {
                l2_block: posting.l2_block,
                watermark,
            });
        }

        total = total
            .checked_add(posting.amount)
            .ok_or(VaultError::Overflow("posting total"))?;
        if total > state.liquid_balance {
            return Err(VaultError::InsufficientUnderlying {
                requested: total,
                available: state.liquid_balance,
            });
        }

        highest = highest.max(posting.l2_block);
    }

    let pending_debt = state
        .pending_debt
        .checked_add(total)
        .ok_or(VaultError::Overflow("pending debt"))?;

    Ok(IntakePlan {
        total,
        liquid_balance: state.liquid_balance - total,
        pending_debt,
        last_processed_block: highest,
    })
}

/// Writes an intake's post-state.
pub fn apply_intake(state: &mut VaultState, plan: &IntakePlan) {
    state.liquid_balance = plan.liquid_balance;
    state.pending_debt = plan.pending_debt;
    state.last_processed_block = plan.last_processed_block;
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Post-state of an accepted settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementPlan {
    /// Principal plus fees flowing back into the vault.
    pub returned: U256,
    pub liquid_balance: U256,
    pub pending_debt: U256,
    pub last_settled_nonce: u64,
}

/// Validates a settlement payload against `state`.
///
/// The nonce must match exactly: no gaps, no replays.
pub fn check_settlement(
    state: &VaultState,
    payload: &SettlementPayload,
) -> VaultResult<SettlementPlan> {
    if payload.nonce != state.last_settled_nonce {
        return Err(VaultError::InvalidBatchNonce {
            expected: state.last_settled_nonce,
            received: payload.nonce,
        });
    }

    let pending_debt = state
        .pending_debt
        .checked_sub(payload.amount_underlying)
        .ok_or(VaultError::DebtUnderflow {
            pending: state.pending_debt,
            settled: payload.amount_underlying,
        })?;

    let returned = payload
        .amount_underlying
        .checked_add(payload.amount_lp_fees)
        .ok_or(VaultError::Overflow("settlement amount"))?;
    let liquid_balance = state
        .liquid_balance
        .checked_add(returned)
        .ok_or(VaultError::Overflow("liquid balance"))?;
    liquid_balance
        .checked_add(pending_debt)
        .ok_or(VaultError::Overflow("total assets"))?;

    let last_settled_nonce = state
        .last_settled_nonce
        .checked_add(1)
        .ok_or(VaultError::Overflow("settlement nonce"))?;

    Ok(SettlementPlan {
        returned,
        liquid_balance,
        pending_debt,
        last_settled_nonce,
    })
}

/// Writes a settlement's post-state.
pub fn apply_settlement(state: &mut VaultState, plan: &SettlementPlan) {
    state.liquid_balance = plan.liquid_balance;
    state.pending_debt = plan.pending_debt;
    state.last_settled_nonce = plan.last_settled_nonce;
}
