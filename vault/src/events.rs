//! # Vault Events
//!
//! Every successful mutating call appends one or more [`VaultEvent`]s to the
//! vault's log. The host drains the log after each call to persist and
//! broadcast it. Rejected calls append nothing.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::types::{AssetId, DebtPosting, IntakeSource, L2Address, Role, SettlementPayload};

/// Something observable that happened to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
    /// Assets came in and shares were issued.
    Deposit {
        sender: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
    /// Shares were burned and assets went out.
    Withdraw {
        sender: Address,
        receiver: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
    /// Share token movement. Mints come from and burns go to the zero address.
    Transfer {
        from: Address,
        to: Address,
        shares: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        shares: U256,
    },
    /// Debt postings accepted and paid out.
    BridgeUsersHandled {
        source: IntakeSource,
        postings: Vec<DebtPosting>,
    },
    /// A settlement was accepted.
    BatchProcessed { payload: SettlementPayload },
    Paused { account: Address },
    Unpaused { account: Address },
    /// The L2 fast-withdraw peer was registered.
    L2FwSet { l2_fw: L2Address },
    /// Unbacked balance swept out of the vault.
    Harvested {
        asset: AssetId,
        to: Address,
        amount: U256,
    },
}

impl VaultEvent {
    /// Short stable name, used in logs and the event stream.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::RoleGranted { .. } => "RoleGranted",
            VaultEvent::RoleRevoked { .. } => "RoleRevoked",
            VaultEvent::Deposit { .. } => "Deposit",
            VaultEvent::Withdraw { .. } => "Withdraw",
            VaultEvent::Transfer { .. } => "Transfer",
            VaultEvent::Approval { .. } => "Approval",
            VaultEvent::BridgeUsersHandled { .. } => "BridgeUsersHandled",
            VaultEvent::BatchProcessed { .. } => "BatchProcessed",
            VaultEvent::Paused { .. } => "Paused",
            VaultEvent::Unpaused { .. } => "Unpaused",
            VaultEvent::L2FwSet { .. } => "L2FwSet",
            VaultEvent::Harvested { .. } => "Harvested",
        }
    }
}
