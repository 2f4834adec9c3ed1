//! # Underlying-Value Transfer
//!
//! The vault never holds value itself: it asks a [`Bank`] to move native
//! value or tokens between accounts. On a real chain the bank is the token
//! contract (or the native balance table); here the trait is the seam, and
//! [`MemoryBank`] is the in-process implementation used by the node and the
//! test suites.
//!
//! Implementations must make each individual [`Bank::transfer`] atomic:
//! either the full amount moves or nothing does.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::AssetId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported by the transfer capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The payer does not hold enough of the asset.
    #[error("transfer amount exceeds balance: {holder} holds {available} of {asset}, requested {requested}")]
    InsufficientBalance {
        asset: AssetId,
        holder: Address,
        available: U256,
        requested: U256,
    },

    /// Crediting the payee would overflow its balance.
    #[error("balance overflow crediting {holder}")]
    Overflow {
        /// The account whose balance would overflow.
        holder: Address,
    },
}

// ---------------------------------------------------------------------------
// Bank trait
// ---------------------------------------------------------------------------

/// Capability to read balances and move value between accounts.
pub trait Bank {
    /// Balance of `holder` in `asset`.
    fn balance_of(&self, asset: AssetId, holder: Address) -> U256;

    /// Moves `amount` of `asset` from `from` to `to`.
    fn transfer(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferError>;

    /// Pays out several amounts from one account.
    ///
    /// The payer's balance is checked against the total before anything
    /// moves, so a short payer fails the whole batch up front.
    fn transfer_many(
        &mut self,
        asset: AssetId,
        from: Address,
        payouts: &[(Address, U256)],
    ) -> Result<(), TransferError> {
        let requested = payouts
            .iter()
            .try_fold(U256::ZERO, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(TransferError::Overflow { holder: from })?;

        let available = self.balance_of(asset, from);
        if available < requested {
            return Err(TransferError::InsufficientBalance {
                asset,
                holder: from,
                available,
                requested,
            });
        }

        for (to, amount) in payouts {
            self.transfer(asset, from, *to, *amount)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryBank
// ---------------------------------------------------------------------------

/// In-memory balance table keyed by asset, then holder.
///
/// Zero balances are not stored, so two banks holding the same funds
/// compare equal regardless of history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBank {
    balances: BTreeMap<AssetId, BTreeMap<Address, U256>>,
}

impl MemoryBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `amount` of `asset` out of thin air for `to`.
    ///
    /// Used to seed genesis allocations and test fixtures.
    pub fn mint(&mut self, asset: AssetId, to: Address, amount: U256) -> Result<(), TransferError> {
        self.credit(asset, to, amount)
    }

    /// Total amount of `asset` held across all accounts.
    pub fn total_supply(&self, asset: AssetId) -> U256 {
        self.balances
            .get(&asset)
            .map(|holders| {
                holders
                    .values()
                    .fold(U256::ZERO, |acc, v| acc.saturating_add(*v))
            })
            .unwrap_or(U256::ZERO)
    }

    /// Every non-zero balance of `holder`, by asset.
    pub fn holdings(&self, holder: Address) -> Vec<(AssetId, U256)> {
        self.balances
            .iter()
            .filter_map(|(asset, holders)| holders.get(&holder).map(|amount| (*asset, *amount)))
            .collect()
    }

    fn credit(&mut self, asset: AssetId, to: Address, amount: U256) -> Result<(), TransferError> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.balances.entry(asset).or_default().entry(to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow { holder: to })?;
        Ok(())
    }

    fn debit(&mut self, asset: AssetId, from: Address, amount: U256) -> Result<(), TransferError> {
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                asset,
                holder: from,
                available,
                requested: amount,
            });
        }
        if amount.is_zero() {
            return Ok(());
        }

        let remaining = available - amount;
        let holders = self.balances.entry(asset).or_default();
        if remaining.is_zero() {
            holders.remove(&from);
        } else {
            holders.insert(from, remaining);
        }
        if holders.is_empty() {
            self.balances.remove(&asset);
        }
        Ok(())
    }
}

impl Bank for MemoryBank {
    fn balance_of(&self, asset: AssetId, holder: Address) -> U256 {
        self.balances
            .get(&asset)
            .and_then(|holders| holders.get(&holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn transfer(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TransferError> {
        if from == to {
            // Still fail a short payer, but a self-transfer moves nothing.
            let available = self.balance_of(asset, from);
            if available < amount {
                return Err(TransferError::InsufficientBalance {
                    asset,
                    holder: from,
                    available,
                    requested: amount,
                });
            }
            return Ok(());
        }

        // Overflow on the payee is checked before the payer is debited.
        let to_balance = self.balance_of(asset, to);
        if to_balance.checked_add(amount).is_none() {
            return Err(TransferError::Overflow { holder: to });
        }

        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }
}
