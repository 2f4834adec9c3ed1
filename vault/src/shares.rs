//! # Share Accounting
//!
//! Asset⇄share conversion and the share token's balance book.
//!
//! ## Conversion
//!
//! While shares exist, conversions price against one virtual share and one
//! virtual asset:
//!
//! ```text
//! shares = assets * (total_shares + 1) / (total_assets + 1)
//! assets = shares * (total_assets + 1) / (total_shares + 1)
//! ```
//!
//! The offset keeps a first depositor from inflating the share price with a
//! donation. An empty vault (no shares) converts 1:1.
//!
//! Every conversion takes an explicit [`Rounding`]. The direction always
//! favours the vault: the side that receives value is rounded down, the side
//! that pays is rounded up.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

// ---------------------------------------------------------------------------
// Conversion math
// ---------------------------------------------------------------------------

/// Rounding direction of an integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero (floor).
    Down,
    /// Away from zero (ceil).
    Up,
}

/// Computes `x * y / denominator` with the requested rounding.
///
/// Fails with [`VaultError::Overflow`] if the product does not fit in 256
/// bits or the denominator is zero.
pub fn mul_div(x: U256, y: U256, denominator: U256, rounding: Rounding) -> VaultResult<U256> {
    if denominator.is_zero() {
        return Err(VaultError::Overflow("mul_div: zero denominator"));
    }
    let product = x
        .checked_mul(y)
        .ok_or(VaultError::Overflow("mul_div: product"))?;
    Ok(match rounding {
        Rounding::Down => product / denominator,
        Rounding::Up => product.div_ceil(denominator),
    })
}

/// Shares worth `assets` at the given supply and backing.
pub fn to_shares(
    assets: U256,
    total_shares: U256,
    total_assets: U256,
    rounding: Rounding,
) -> VaultResult<U256> {
    if total_shares.is_zero() {
        return Ok(assets);
    }
    mul_div(
        assets,
        virtual_amount(total_shares)?,
        virtual_amount(total_assets)?,
        rounding,
    )
}

/// Assets backing `shares` at the given supply and backing.
pub fn to_assets(
    shares: U256,
    total_shares: U256,
    total_assets: U256,
    rounding: Rounding,
) -> VaultResult<U256> {
    if total_shares.is_zero() {
        return Ok(shares);
    }
    mul_div(
        shares,
        virtual_amount(total_assets)?,
        virtual_amount(total_shares)?,
        rounding,
    )
}

fn virtual_amount(amount: U256) -> VaultResult<U256> {
    amount
        .checked_add(U256::from(1u8))
        .ok_or(VaultError::Overflow("virtual offset"))
}

// ---------------------------------------------------------------------------
// Share book
// ---------------------------------------------------------------------------

/// Per-holder share balances and spender allowances.
///
/// The book only tracks who holds what. Total supply lives in
/// [`VaultState`](crate::ledger::VaultState) and is kept in step by the
/// ledger, which is the only caller of [`credit`](Self::credit) and
/// [`debit`](Self::debit).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareBook {
    /// Display name of the share token.
    pub name: String,
    /// Ticker of the share token.
    pub symbol: String,
    balances: BTreeMap<Address, U256>,
    allowances: BTreeMap<(Address, Address), U256>,
}

impl ShareBook {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Share balance of `holder`.
    pub fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or(U256::ZERO)
    }

    /// Shares `spender` may still move out of `owner`'s balance.
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Sum of all balances. Equals total supply when the ledger is sound.
    pub fn sum_of_balances(&self) -> U256 {
        self.balances
            .values()
            .fold(U256::ZERO, |acc, v| acc.saturating_add(*v))
    }

    /// Fails unless `owner` holds at least `shares`.
    pub fn ensure_balance(&self, owner: Address, shares: U256) -> VaultResult<()> {
        let balance = self.balance_of(owner);
        if balance < shares {
            return Err(VaultError::InsufficientShares {
                owner,
                balance,
                requested: shares,
            });
        }
        Ok(())
    }

    /// Fails unless `spender` may move `shares` of `owner`'s balance.
    pub fn ensure_allowance(&self, owner: Address, spender: Address, shares: U256) -> VaultResult<()> {
        let allowance = self.allowance(owner, spender);
        if allowance < shares {
            return Err(VaultError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                requested: shares,
            });
        }
        Ok(())
    }

    /// Sets the allowance of `spender` over `owner`'s shares.
    pub(crate) fn approve(&mut self, owner: Address, spender: Address, shares: U256) {
        if shares.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), shares);
        }
    }

    /// Consumes allowance. `U256::MAX` is treated as unlimited.
    pub(crate) fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        shares: U256,
    ) -> VaultResult<()> {
        self.ensure_allowance(owner, spender, shares)?;
        let allowance = self.allowance(owner, spender);
        if allowance != U256::MAX {
            self.approve(owner, spender, allowance - shares);
        }
        Ok(())
    }

    pub(crate) fn credit(&mut self, holder: Address, shares: U256) -> VaultResult<()> {
        if shares.is_zero() {
            return Ok(());
        }
        let balance = self.balances.entry(holder).or_default();
        *balance = balance
            .checked_add(shares)
            .ok_or(VaultError::Overflow("share balance"))?;
        Ok(())
    }

    pub(crate) fn debit(&mut self, holder: Address, shares: U256) -> VaultResult<()> {
        self.ensure_balance(holder, shares)?;
        if shares.is_zero() {
            return Ok(());
        }
        let remaining = self.balance_of(holder) - shares;
        if remaining.is_zero() {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, remaining);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn mul_div_rounds_in_requested_direction() {
        assert_eq!(mul_div(n(10), n(1), n(3), Rounding::Down).unwrap(), n(3));
        assert_eq!(mul_div(n(10), n(1), n(3), Rounding::Up).unwrap(), n(4));
        assert_eq!(mul_div(n(9), n(1), n(3), Rounding::Up).unwrap(), n(3));
    }

    #[test]
    fn mul_div_reports_overflow() {
        assert_eq!(
            mul_div(U256::MAX, n(2), n(1), Rounding::Down),
            Err(VaultError::Overflow("mul_div: product"))
        );
        assert!(mul_div(n(1), n(1), U256::ZERO, Rounding::Down).is_err());
    }

    #[test]
    fn empty_vault_converts_one_to_one() {
        assert_eq!(to_shares(n(50), n(0), n(0), Rounding::Down).unwrap(), n(50));
        assert_eq!(to_assets(n(50), n(0), n(0), Rounding::Up).unwrap(), n(50));
        // Residual assets with no shares outstanding still bootstrap 1:1.
        assert_eq!(to_shares(n(50), n(0), n(7), Rounding::Down).unwrap(), n(50));
    }

    #[test]
    fn conversions_favour_the_vault() {
        // 100 shares backed by 150 assets.
        let (supply, assets) = (n(100), n(150));
        let down = to_assets(n(1), supply, assets, Rounding::Down).unwrap();
        let up = to_assets(n(1), supply, assets, Rounding::Up).unwrap();
        assert_eq!(down, n(1));
        assert_eq!(up, n(2));

        let shares_down = to_shares(n(1), supply, assets, Rounding::Down).unwrap();
        let shares_up = to_shares(n(1), supply, assets, Rounding::Up).unwrap();
        assert_eq!(shares_down, n(0));
        assert_eq!(shares_up, n(1));
    }

    #[test]
    fn virtual_offset_costs_one_unit_after_yield() {
        let e18 = n(1_000_000_000_000_000_000);
        let supply = n(50) * e18;
        let backing = n(505) * e18 / n(10);
        let out = to_assets(supply, supply, backing, Rounding::Down).unwrap();
        assert_eq!(out, backing - n(1));
    }

    #[test]
    fn book_tracks_balances_and_prunes_zero_entries() {
        let alice = Address::repeat_byte(1);
        let mut book = ShareBook::new("usdc bridge", "usdc_b");
        book.credit(alice, n(10)).unwrap();
        assert_eq!(book.balance_of(alice), n(10));
        assert_eq!(book.holder_count(), 1);

        let err = book.debit(alice, n(11)).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares { .. }));

        book.debit(alice, n(10)).unwrap();
        assert_eq!(book.holder_count(), 0);
        assert_eq!(book, ShareBook::new("usdc bridge", "usdc_b"));
    }

    #[test]
    fn allowances_are_spent_except_when_unlimited() {
        let owner = Address::repeat_byte(1);
        let spender = Address::repeat_byte(2);
        let mut book = ShareBook::default();

        book.approve(owner, spender, n(5));
        book.spend_allowance(owner, spender, n(3)).unwrap();
        assert_eq!(book.allowance(owner, spender), n(2));
        assert!(book.spend_allowance(owner, spender, n(3)).is_err());

        book.approve(owner, spender, U256::MAX);
        book.spend_allowance(owner, spender, n(1_000)).unwrap();
        assert_eq!(book.allowance(owner, spender), U256::MAX);
    }
}
