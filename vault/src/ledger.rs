//! # Ledger
//!
//! The two balance buckets, the settlement cursors and the share book,
//! kept together because every operation that moves one must respect the
//! others.
//!
//! ```text
//! total_assets = liquid_balance + pending_debt
//! total_shares = Σ share balances
//! ```
//!
//! Both identities hold after every public call. Mutators are crate-private:
//! only the vault's operations, after their checks pass, may touch them.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::shares::{self, Rounding, ShareBook};

/// Singleton accounting state of the vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultState {
    /// Assets redeemable on L1 right now.
    pub liquid_balance: U256,
    /// Assets paid out to L2 users and not yet settled back.
    pub pending_debt: U256,
    /// Next settlement nonce the vault will accept.
    pub last_settled_nonce: u64,
    /// Highest L2 block whose debts were accepted.
    pub last_processed_block: u64,
    /// Shares outstanding.
    pub total_shares: U256,
}

impl VaultState {
    /// Liquid balance plus pending debt.
    ///
    /// Mutators refuse any update whose sum would not fit, so this never
    /// saturates in a reachable state.
    pub fn total_assets(&self) -> U256 {
        self.liquid_balance.saturating_add(self.pending_debt)
    }
}

/// Accounting state plus the share book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    state: VaultState,
    shares: ShareBook,
}

impl Ledger {
    pub fn new(shares: ShareBook) -> Self {
        Self {
            state: VaultState::default(),
            shares,
        }
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn shares(&self) -> &ShareBook {
        &self.shares
    }

    pub(crate) fn state_mut(&mut self) -> &mut VaultState {
        &mut self.state
    }

    pub(crate) fn shares_mut(&mut self) -> &mut ShareBook {
        &mut self.shares
    }

    // -- Conversions --------------------------------------------------------

    /// Shares for `assets`, rounded down.
    pub fn convert_to_shares(&self, assets: U256) -> VaultResult<U256> {
        self.to_shares(assets, Rounding::Down)
    }

    /// Assets for `shares`, rounded down.
    pub fn convert_to_assets(&self, shares: U256) -> VaultResult<U256> {
        self.to_assets(shares, Rounding::Down)
    }

    /// Shares minted by depositing `assets`.
    pub fn preview_deposit(&self, assets: U256) -> VaultResult<U256> {
        self.to_shares(assets, Rounding::Down)
    }

    /// Assets collected to mint exactly `shares`.
    pub fn preview_mint(&self, shares: U256) -> VaultResult<U256> {
        self.to_assets(shares, Rounding::Up)
    }

    /// Shares burned to withdraw exactly `assets`.
    pub fn preview_withdraw(&self, assets: U256) -> VaultResult<U256> {
        self.to_shares(assets, Rounding::Up)
    }

    /// Assets paid for redeeming `shares`.
    pub fn preview_redeem(&self, shares: U256) -> VaultResult<U256> {
        self.to_assets(shares, Rounding::Down)
    }

    /// Largest asset amount `owner` could withdraw, ignoring liquidity.
    pub fn max_withdraw(&self, owner: Address) -> VaultResult<U256> {
        self.to_assets(self.shares.balance_of(owner), Rounding::Down)
    }

    /// Largest share amount `owner` could redeem.
    pub fn max_redeem(&self, owner: Address) -> U256 {
        self.shares.balance_of(owner)
    }

    fn to_shares(&self, assets: U256, rounding: Rounding) -> VaultResult<U256> {
        shares::to_shares(
            assets,
            self.state.total_shares,
            self.state.total_assets(),
            rounding,
        )
    }

    fn to_assets(&self, shares_amount: U256, rounding: Rounding) -> VaultResult<U256> {
        shares::to_assets(
            shares_amount,
            self.state.total_shares,
            self.state.total_assets(),
            rounding,
        )
    }

    // -- Mutators -----------------------------------------------------------

    /// Adds freshly received assets to the liquid bucket.
    pub(crate) fn credit_liquidity(&mut self, assets: U256) -> VaultResult<()> {
        let liquid = self
            .state
            .liquid_balance
            .checked_add(assets)
            .ok_or(VaultError::Overflow("liquid balance"))?;
        liquid
            .checked_add(self.state.pending_debt)
            .ok_or(VaultError::Overflow("total assets"))?;
        self.state.liquid_balance = liquid;
        Ok(())
    }

    /// Removes assets leaving the vault from the liquid bucket.
    pub(crate) fn debit_liquidity(&mut self, assets: U256) -> VaultResult<()> {
        self.state.liquid_balance = self
            .state
            .liquid_balance
            .checked_sub(assets)
            .ok_or(VaultError::Overflow("liquid balance underflow"))?;
        Ok(())
    }

    /// Issues `amount` new shares to `to`.
    pub(crate) fn mint_shares(&mut self, to: Address, amount: U256) -> VaultResult<()> {
        let supply = self
            .state
            .total_shares
            .checked_add(amount)
            .ok_or(VaultError::Overflow("total shares"))?;
        self.shares.credit(to, amount)?;
        self.state.total_shares = supply;
        Ok(())
    }

    /// Destroys `amount` of `from`'s shares.
    pub(crate) fn burn_shares(&mut self, from: Address, amount: U256) -> VaultResult<()> {
        let supply = self
            .state
            .total_shares
            .checked_sub(amount)
            .ok_or(VaultError::Overflow("total shares underflow"))?;
        self.shares.debit(from, amount)?;
        self.state.total_shares = supply;
        Ok(())
    }

    /// Moves shares between holders. Supply is unchanged.
    pub(crate) fn move_shares(&mut self, from: Address, to: Address, amount: U256) -> VaultResult<()> {
        self.shares.debit(from, amount)?;
        self.shares.credit(to, amount)
    }
}
