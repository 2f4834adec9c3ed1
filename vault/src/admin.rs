//! # Maintenance Operations
//!
//! Admin-only calls outside the LP and settlement paths: the one-time L2
//! peer registration and sweeps of balances the ledger does not account for
//! (tokens sent to the vault by mistake, surplus underlying).

use alloy_primitives::{Address, U256};
use tracing::info;

use crate::bank::Bank;
use crate::error::{ensure_address, VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::types::{AssetId, L2Address, Role};
use crate::vault::Vault;

impl<B: Bank> Vault<B> {
    /// Registers the L2 fast-withdraw peer. Succeeds once.
    ///
    /// # Errors
    ///
    /// [`VaultError::AlreadySet`] on any call after the first, whatever the
    /// argument. [`VaultError::AddressNul`] for a zero identifier.
    pub fn set_l2_fw(&mut self, caller: Address, l2_fw: L2Address) -> VaultResult<()> {
        self.roles.require(Role::Admin, caller)?;
        if self.peers.l2_fw.is_some() {
            return Err(VaultError::AlreadySet);
        }
        if l2_fw.is_zero() {
            return Err(VaultError::AddressNul);
        }

        self.peers.l2_fw = Some(l2_fw);
        self.events.push(VaultEvent::L2FwSet { l2_fw });
        info!(%l2_fw, "l2 fast-withdraw peer registered");
        Ok(())
    }

    /// Sweeps the vault's unbacked balance of `token`. Returns the amount
    /// swept.
    ///
    /// For the underlying token only the surplus above the liquid balance
    /// moves.
    pub fn harvest_erc20(&mut self, caller: Address, token: Address) -> VaultResult<U256> {
        self.roles.require(Role::Admin, caller)?;
        ensure_address(token)?;
        self.harvest(caller, AssetId::Token(token))
    }

    /// Sweeps the vault's unbacked native balance. Returns the amount swept.
    pub fn harvest_eth(&mut self, caller: Address) -> VaultResult<U256> {
        self.roles.require(Role::Admin, caller)?;
        self.harvest(caller, AssetId::Native)
    }

    fn harvest(&mut self, caller: Address, asset: AssetId) -> VaultResult<U256> {
        let held = self.bank.balance_of(asset, self.address);
        let amount = if asset == self.asset {
            held.saturating_sub(self.ledger.state().liquid_balance)
        } else {
            held
        };
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }

        let to = self.treasury.unwrap_or(caller);
        self.bank.transfer(asset, self.address, to, amount)?;

        self.events.push(VaultEvent::Harvested { asset, to, amount });
        info!(%asset, to = %to, %amount, "harvested");
        Ok(amount)
    }
}
