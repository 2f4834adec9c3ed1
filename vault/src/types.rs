//! # Core Types
//!
//! Identifiers and call payloads shared by every vault component. Quantities
//! are 256-bit integers with 18 implied decimals; identities on L1 are plain
//! 20-byte addresses, identities on L2 are field elements.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// A capability tag in the vault's role table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Manages role grants, peer registration and sweeps. Self-administering.
    Admin,
    /// Relayer role: posts debts and settles batches.
    Process,
    /// Emergency halt of the settlement path.
    Pause,
    /// Liquidity provider: deposit, mint, withdraw, redeem.
    Lp,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [Role::Admin, Role::Process, Role::Pause, Role::Lp];

    /// Stable upper-case label, used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Process => "PROCESS",
            Role::Pause => "PAUSE",
            Role::Lp => "LP",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "PROCESS" => Ok(Role::Process),
            "PAUSE" => Ok(Role::Pause),
            "LP" => Ok(Role::Lp),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a program on L2 (a field element, not an L1 address).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct L2Address(pub U256);

impl L2Address {
    pub const ZERO: L2Address = L2Address(U256::ZERO);

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<u64> for L2Address {
    fn from(value: u64) -> Self {
        L2Address(U256::from(value))
    }
}

impl std::fmt::Display for L2Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Which balance a transfer moves: native chain value or a token contract.
///
/// A vault is configured with exactly one of these as its underlying asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetId {
    /// The chain's native value.
    Native,
    /// A fungible token identified by its contract address.
    Token(Address),
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(address) => write!(f, "token:{address}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Relayed payloads
// ---------------------------------------------------------------------------

/// A relayed claim that an L2 user is owed `amount` of the underlying.
///
/// Postings are consumed by debt intake and never stored; their effect is
/// folded into the vault's balance buckets and block watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtPosting {
    /// L1 account that receives the payout.
    #[serde(alias = "user")]
    pub recipient: Address,
    /// Amount owed, in underlying base units.
    #[serde(alias = "debt")]
    pub amount: U256,
    /// Sequence number assigned on L2. Carried through to events only.
    pub nonce: u64,
    /// L2 block height at which the debt was incurred.
    pub l2_block: u64,
}

/// A relayed confirmation that a debt batch was settled on L2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPayload {
    /// Must equal the vault's next expected settlement nonce.
    pub nonce: u64,
    /// Principal returned against pending debt.
    pub amount_underlying: U256,
    /// Fees earned by liquidity providers on this batch.
    pub amount_lp_fees: U256,
}

/// How a debt intake was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeSource {
    /// Delivered by the relayer from an L2 message.
    Relayed,
    /// Submitted by an operator as a corrective posting.
    Manual,
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

/// The counterpart programs the vault talks to.
///
/// Everything but `l2_fw` is fixed at construction; `l2_fw` may be filled in
/// exactly once afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerReference {
    /// Cross-chain messaging entry point on L1.
    pub starknet_core: Address,
    /// L1 side of the token bridge. Settlements are pulled from here.
    pub l1_bridge: Address,
    /// L2 side of the token bridge.
    pub l2_bridge: L2Address,
    /// L2 fast-withdraw program, once registered.
    pub l2_fw: Option<L2Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_round_trip_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.label().parse::<Role>().unwrap(), role);
        }
        assert_eq!("lp".parse::<Role>().unwrap(), Role::Lp);
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn debt_posting_accepts_relayer_field_names() {
        let json = serde_json::json!({
            "user": "0x0262e8331dfa2d2becf26395270bce6a9ac5a197",
            "debt": "0x0f",
            "nonce": 3,
            "l2Block": 7
        });
        let posting: DebtPosting = serde_json::from_value(json).unwrap();
        assert_eq!(posting.amount, U256::from(15u64));
        assert_eq!(posting.l2_block, 7);
        assert!(!posting.recipient.is_zero());
    }

    #[test]
    fn l2_address_displays_as_hex() {
        assert_eq!(L2Address::from(255).to_string(), "0xff");
        assert!(L2Address::ZERO.is_zero());
    }
}
