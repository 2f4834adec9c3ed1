//! # Liquidity Vault
//!
//! The vault pools LP liquidity on L1 and uses it to pay L2 users out
//! immediately, before their withdrawal batch has settled across the bridge.
//! The lifecycle of a unit of liquidity is:
//!
//! 1. **Deposit**: an LP moves underlying in and receives shares.
//! 2. **Debt intake**: the relayer posts L2 debts; the vault pays each
//!    recipient and moves the amount from the liquid bucket to pending debt.
//! 3. **Settlement**: the L2 batch lands on L1; principal plus LP fees are
//!    pulled from the L1 bridge back into the liquid bucket.
//! 4. **Redeem**: an LP burns shares for underlying at the grown share price.
//!
//! Every public call runs checks first, then ledger effects, then external
//! transfers. If a transfer fails the ledger is rolled back to its pre-call
//! checkpoint, so a rejected call leaves the vault exactly as it was.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::RoleGrants;
use crate::bank::{Bank, TransferError};
use crate::config::{VaultConfig, DECIMALS};
use crate::error::{ensure_address, ensure_amount, VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::ledger::{Ledger, VaultState};
use crate::pause::PauseState;
use crate::settlement;
use crate::shares::ShareBook;
use crate::types::{AssetId, DebtPosting, IntakeSource, L2Address, PeerReference, Role, SettlementPayload};

/// One liquidity vault over a single underlying asset.
///
/// `B` is the transfer capability. The vault owns it so that a snapshot of
/// the vault captures every balance it depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vault<B> {
    pub(crate) address: Address,
    pub(crate) asset: AssetId,
    pub(crate) peers: PeerReference,
    pub(crate) treasury: Option<Address>,
    pub(crate) ledger: Ledger,
    pub(crate) roles: RoleGrants,
    pub(crate) pause: PauseState,
    pub(crate) bank: B,
    #[serde(skip)]
    pub(crate) events: Vec<VaultEvent>,
}

impl<B: Bank> Vault<B> {
    /// Builds a vault from `config`, seeding `deployer` with the configured
    /// roles (always including `ADMIN`).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AddressNul`] if the deployer or any configured
    /// identity is zero.
    pub fn new(config: VaultConfig, deployer: Address, bank: B) -> VaultResult<Self> {
        config.validate()?;
        ensure_address(deployer)?;

        let mut roles = RoleGrants::new(deployer);
        for role in &config.deployer_roles {
            roles.insert(*role, deployer);
        }

        let events = roles
            .roles_of(deployer)
            .into_iter()
            .map(|role| VaultEvent::RoleGranted {
                role,
                account: deployer,
                sender: deployer,
            })
            .collect();

        info!(
            vault = %config.address,
            asset = %config.asset,
            deployer = %deployer,
            "vault created"
        );

        Ok(Self {
            address: config.address,
            asset: config.asset,
            peers: config.peers(),
            treasury: config.treasury,
            ledger: Ledger::new(ShareBook::new(config.share_name, config.share_symbol)),
            roles,
            pause: PauseState::Active,
            bank,
            events,
        })
    }

    // -----------------------------------------------------------------------
    // LP operations
    // -----------------------------------------------------------------------

    /// Deposits exactly `assets` from the caller and issues shares to
    /// `receiver`. Returns the shares issued.
    pub fn deposit(&mut self, caller: Address, assets: U256, receiver: Address) -> VaultResult<U256> {
        self.roles.require(Role::Lp, caller)?;
        ensure_amount(assets)?;
        ensure_address(receiver)?;

        let shares = self.ledger.preview_deposit(assets)?;
        self.enter(caller, receiver, assets, shares)?;
        Ok(shares)
    }

    /// Issues exactly `shares` to `receiver`, collecting whatever assets they
    /// cost from the caller. Returns the assets collected.
    pub fn mint(&mut self, caller: Address, shares: U256, receiver: Address) -> VaultResult<U256> {
        self.roles.require(Role::Lp, caller)?;
        ensure_amount(shares)?;
        ensure_address(receiver)?;

        let assets = self.ledger.preview_mint(shares)?;
        self.enter(caller, receiver, assets, shares)?;
        Ok(assets)
    }

    /// Pays exactly `assets` to `receiver`, burning the shares they cost
    /// from `owner`. Returns the shares burned.
    pub fn withdraw(
        &mut self,
        caller: Address,
        assets: U256,
        receiver: Address,
        owner: Address,
    ) -> VaultResult<U256> {
        self.roles.require(Role::Lp, caller)?;
        ensure_amount(assets)?;
        ensure_address(receiver)?;
        ensure_address(owner)?;

        let shares = self.ledger.preview_withdraw(assets)?;
        self.exit(caller, receiver, owner, assets, shares)?;
        Ok(shares)
    }

    /// Burns exactly `shares` from `owner` and pays their value to
    /// `receiver`. Returns the assets paid.
    pub fn redeem(
        &mut self,
        caller: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> VaultResult<U256> {
        self.roles.require(Role::Lp, caller)?;
        ensure_amount(shares)?;
        ensure_address(receiver)?;
        ensure_address(owner)?;

        let assets = self.ledger.preview_redeem(shares)?;
        self.exit(caller, receiver, owner, assets, shares)?;
        Ok(assets)
    }

    fn enter(&mut self, caller: Address, receiver: Address, assets: U256, shares: U256) -> VaultResult<()> {
        let (asset, vault) = (self.asset, self.address);
        self.atomically(|v| {
            v.ledger.credit_liquidity(assets)?;
            v.ledger.mint_shares(receiver, shares)?;
            v.bank.transfer(asset, caller, vault, assets)?;
            Ok(())
        })?;

        self.events.push(VaultEvent::Transfer {
            from: Address::ZERO,
            to: receiver,
            shares,
        });
        self.events.push(VaultEvent::Deposit {
            sender: caller,
            owner: receiver,
            assets,
            shares,
        });
        info!(caller = %caller, receiver = %receiver, %assets, %shares, "deposit");
        Ok(())
    }

    fn exit(
        &mut self,
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    ) -> VaultResult<()> {
        if caller != owner {
            self.ledger.shares().ensure_allowance(owner, caller, shares)?;
        }
        self.ledger.shares().ensure_balance(owner, shares)?;

        // Only liquid assets can leave; pending debt is still on L2.
        let liquid = self.ledger.state().liquid_balance;
        if assets > liquid {
            return Err(TransferError::InsufficientBalance {
                asset: self.asset,
                holder: self.address,
                available: liquid,
                requested: assets,
            }
            .into());
        }

        let (asset, vault) = (self.asset, self.address);
        self.atomically(|v| {
            if caller != owner {
                v.ledger.shares_mut().spend_allowance(owner, caller, shares)?;
            }
            v.ledger.burn_shares(owner, shares)?;
            v.ledger.debit_liquidity(assets)?;
            v.bank.transfer(asset, vault, receiver, assets)?;
            Ok(())
        })?;

        self.events.push(VaultEvent::Transfer {
            from: owner,
            to: Address::ZERO,
            shares,
        });
        self.events.push(VaultEvent::Withdraw {
            sender: caller,
            receiver,
            owner,
            assets,
            shares,
        });
        info!(caller = %caller, owner = %owner, receiver = %receiver, %assets, %shares, "withdraw");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Share token
    // -----------------------------------------------------------------------

    /// Moves the caller's shares to `to`.
    pub fn transfer(&mut self, caller: Address, to: Address, shares: U256) -> VaultResult<()> {
        ensure_address(to)?;
        self.ledger.shares().ensure_balance(caller, shares)?;
        self.atomically(|v| v.ledger.move_shares(caller, to, shares))?;

        self.events.push(VaultEvent::Transfer {
            from: caller,
            to,
            shares,
        });
        debug!(from = %caller, to = %to, %shares, "share transfer");
        Ok(())
    }

    /// Sets the caller's allowance for `spender`. `U256::MAX` never depletes.
    pub fn approve(&mut self, caller: Address, spender: Address, shares: U256) -> VaultResult<()> {
        ensure_address(spender)?;
        self.ledger.shares_mut().approve(caller, spender, shares);

        self.events.push(VaultEvent::Approval {
            owner: caller,
            spender,
            shares,
        });
        debug!(owner = %caller, spender = %spender, %shares, "share approval");
        Ok(())
    }

    /// Moves `from`'s shares to `to`, spending the caller's allowance.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        shares: U256,
    ) -> VaultResult<()> {
        ensure_address(from)?;
        ensure_address(to)?;
        self.ledger.shares().ensure_allowance(from, caller, shares)?;
        self.ledger.shares().ensure_balance(from, shares)?;

        self.atomically(|v| {
            v.ledger.shares_mut().spend_allowance(from, caller, shares)?;
            v.ledger.move_shares(from, to, shares)
        })?;

        self.events.push(VaultEvent::Transfer { from, to, shares });
        debug!(spender = %caller, from = %from, to = %to, %shares, "share transfer_from");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batch settlement
    // -----------------------------------------------------------------------

    /// Accepts relayed debt postings and pays each recipient from liquidity.
    /// Returns the total paid out.
    pub fn handle_bridge_users(&mut self, caller: Address, postings: &[DebtPosting]) -> VaultResult<U256> {
        self.intake(caller, postings, IntakeSource::Relayed)
    }

    /// Operator path for postings the relayer missed. Same checks and effects
    /// as [`handle_bridge_users`](Self::handle_bridge_users).
    pub fn handle_bridge_users_manually(
        &mut self,
        caller: Address,
        postings: &[DebtPosting],
    ) -> VaultResult<U256> {
        self.intake(caller, postings, IntakeSource::Manual)
    }

    fn intake(&mut self, caller: Address, postings: &[DebtPosting], source: IntakeSource) -> VaultResult<U256> {
        let result = self.try_intake(caller, postings, source);
        if let Err(err) = &result {
            warn!(
                caller = %caller,
                ?source,
                postings = postings.len(),
                kind = err.kind(),
                error = %err,
                "debt intake rejected"
            );
        }
        result
    }

    fn try_intake(&mut self, caller: Address, postings: &[DebtPosting], source: IntakeSource) -> VaultResult<U256> {
        self.roles.require(Role::Process, caller)?;
        let plan = settlement::check_postings(self.ledger.state(), postings)?;

        let payouts: Vec<(Address, U256)> = postings.iter().map(|p| (p.recipient, p.amount)).collect();
        let (asset, vault) = (self.asset, self.address);
        self.atomically(|v| {
            settlement::apply_intake(v.ledger.state_mut(), &plan);
            v.bank.transfer_many(asset, vault, &payouts)?;
            Ok(())
        })?;

        self.events.push(VaultEvent::BridgeUsersHandled {
            source,
            postings: postings.to_vec(),
        });
        info!(
            ?source,
            postings = postings.len(),
            total = %plan.total,
            watermark = plan.last_processed_block,
            "bridge users handled"
        );
        Ok(plan.total)
    }

    /// Accepts a settled L2 batch and pulls principal plus fees from the L1
    /// bridge. Returns the amount pulled.
    ///
    /// # Errors
    ///
    /// Checked in order: [`VaultError::Unauthorized`], [`VaultError::Paused`],
    /// [`VaultError::InvalidBatchNonce`], [`VaultError::DebtUnderflow`].
    pub fn execute_batch(&mut self, caller: Address, payload: &SettlementPayload) -> VaultResult<U256> {
        let result = self.try_execute_batch(caller, payload);
        if let Err(err) = &result {
            warn!(
                caller = %caller,
                nonce = payload.nonce,
                expected = self.ledger.state().last_settled_nonce,
                kind = err.kind(),
                error = %err,
                "batch rejected"
            );
        }
        result
    }

    fn try_execute_batch(&mut self, caller: Address, payload: &SettlementPayload) -> VaultResult<U256> {
        self.roles.require(Role::Process, caller)?;
        self.pause.ensure_not_paused()?;
        let plan = settlement::check_settlement(self.ledger.state(), payload)?;

        let (asset, vault, bridge) = (self.asset, self.address, self.peers.l1_bridge);
        self.atomically(|v| {
            settlement::apply_settlement(v.ledger.state_mut(), &plan);
            v.bank.transfer(asset, bridge, vault, plan.returned)?;
            Ok(())
        })?;

        self.events.push(VaultEvent::BatchProcessed {
            payload: payload.clone(),
        });
        info!(
            nonce = payload.nonce,
            principal = %payload.amount_underlying,
            fees = %payload.amount_lp_fees,
            liquid = %plan.liquid_balance,
            pending = %plan.pending_debt,
            "batch processed"
        );
        Ok(plan.returned)
    }

    // -----------------------------------------------------------------------
    // Pause & roles
    // -----------------------------------------------------------------------

    /// Halts batch settlement.
    pub fn pause(&mut self, caller: Address) -> VaultResult<()> {
        self.roles.require(Role::Pause, caller)?;
        self.pause.pause()?;
        self.events.push(VaultEvent::Paused { account: caller });
        warn!(caller = %caller, "vault paused");
        Ok(())
    }

    /// Resumes batch settlement.
    pub fn unpause(&mut self, caller: Address) -> VaultResult<()> {
        self.roles.require(Role::Pause, caller)?;
        self.pause.unpause()?;
        self.events.push(VaultEvent::Unpaused { account: caller });
        info!(caller = %caller, "vault unpaused");
        Ok(())
    }

    /// Grants `role` to `target`. Returns `false` if it already held it.
    pub fn grant_role(&mut self, caller: Address, role: Role, target: Address) -> VaultResult<bool> {
        self.roles.require(Role::Admin, caller)?;
        ensure_address(target)?;
        let changed = self.roles.grant_role(caller, role, target)?;
        if changed {
            self.events.push(VaultEvent::RoleGranted {
                role,
                account: target,
                sender: caller,
            });
            info!(%role, account = %target, sender = %caller, "role granted");
        }
        Ok(changed)
    }

    /// Revokes `role` from `target`. Returns `false` if it did not hold it.
    pub fn revoke_role(&mut self, caller: Address, role: Role, target: Address) -> VaultResult<bool> {
        self.roles.require(Role::Admin, caller)?;
        ensure_address(target)?;
        let changed = self.roles.revoke_role(caller, role, target)?;
        if changed {
            self.events.push(VaultEvent::RoleRevoked {
                role,
                account: target,
                sender: caller,
            });
            info!(%role, account = %target, sender = %caller, "role revoked");
        }
        Ok(changed)
    }

    /// Drops `role` from the caller.
    pub fn renounce_role(&mut self, caller: Address, role: Role) -> bool {
        let changed = self.roles.renounce_role(caller, role);
        if changed {
            self.events.push(VaultEvent::RoleRevoked {
                role,
                account: caller,
                sender: caller,
            });
            info!(%role, account = %caller, "role renounced");
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Runs `f` against a ledger checkpoint and restores it if `f` fails.
    ///
    /// The bank is not checkpointed: each transfer it performs is itself
    /// all-or-nothing, and every closure makes at most one fallible batch of
    /// transfers as its last step.
    pub(crate) fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> VaultResult<T>) -> VaultResult<T> {
        let checkpoint = self.ledger.clone();
        let result = f(self);
        if result.is_err() {
            self.ledger = checkpoint;
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Read-only surface
// ---------------------------------------------------------------------------

impl<B: Bank> Vault<B> {
    pub fn liquid_balance(&self) -> U256 {
        self.ledger.state().liquid_balance
    }

    pub fn pending_debt(&self) -> U256 {
        self.ledger.state().pending_debt
    }

    /// Liquid balance plus pending debt.
    pub fn total_assets(&self) -> U256 {
        self.ledger.state().total_assets()
    }

    pub fn last_processed_block(&self) -> u64 {
        self.ledger.state().last_processed_block
    }

    /// Next settlement nonce the vault will accept.
    pub fn last_settled_nonce(&self) -> u64 {
        self.ledger.state().last_settled_nonce
    }

    pub fn total_shares(&self) -> U256 {
        self.ledger.state().total_shares
    }

    pub fn state(&self) -> &VaultState {
        self.ledger.state()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.ledger.shares().balance_of(holder)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.ledger.shares().allowance(owner, spender)
    }

    pub fn share_name(&self) -> &str {
        &self.ledger.shares().name
    }

    pub fn share_symbol(&self) -> &str {
        &self.ledger.shares().symbol
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn convert_to_shares(&self, assets: U256) -> VaultResult<U256> {
        self.ledger.convert_to_shares(assets)
    }

    pub fn convert_to_assets(&self, shares: U256) -> VaultResult<U256> {
        self.ledger.convert_to_assets(shares)
    }

    pub fn preview_deposit(&self, assets: U256) -> VaultResult<U256> {
        self.ledger.preview_deposit(assets)
    }

    pub fn preview_mint(&self, shares: U256) -> VaultResult<U256> {
        self.ledger.preview_mint(shares)
    }

    pub fn preview_withdraw(&self, assets: U256) -> VaultResult<U256> {
        self.ledger.preview_withdraw(assets)
    }

    pub fn preview_redeem(&self, shares: U256) -> VaultResult<U256> {
        self.ledger.preview_redeem(shares)
    }

    pub fn max_withdraw(&self, owner: Address) -> VaultResult<U256> {
        self.ledger.max_withdraw(owner)
    }

    pub fn max_redeem(&self, owner: Address) -> U256 {
        self.ledger.max_redeem(owner)
    }

    pub fn paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.roles.has_role(role, account)
    }

    pub fn roles(&self) -> &RoleGrants {
        &self.roles
    }

    pub fn peers(&self) -> &PeerReference {
        &self.peers
    }

    pub fn starknet_core(&self) -> Address {
        self.peers.starknet_core
    }

    pub fn l1_bridge(&self) -> Address {
        self.peers.l1_bridge
    }

    pub fn l2_bridge(&self) -> L2Address {
        self.peers.l2_bridge
    }

    /// Registered L2 fast-withdraw peer, if any.
    pub fn l2_fw(&self) -> Option<L2Address> {
        self.peers.l2_fw
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    /// The vault's own identity in the bank.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn treasury(&self) -> Option<Address> {
        self.treasury
    }

    /// Events emitted since the last drain.
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Takes every pending event, oldest first.
    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Direct access to the transfer capability, for seeding balances.
    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }
}
