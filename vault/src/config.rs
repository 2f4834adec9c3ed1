//! # Vault Configuration & Constants
//!
//! Fixed parameters of the vault and the construction-time configuration
//! that binds one vault instance to its underlying asset and its peers.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_address, VaultError, VaultResult};
use crate::types::{AssetId, L2Address, PeerReference, Role};

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Crate protocol version, reported by the node's status endpoints.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version of the persisted snapshot layout. Bump whenever [`crate::Vault`]
/// changes shape in a way bincode cannot read back.
pub const SNAPSHOT_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Token parameters
// ---------------------------------------------------------------------------

/// Implied decimals of both the underlying and the share token.
pub const DECIMALS: u8 = 18;

/// Default share token name.
pub const DEFAULT_SHARE_NAME: &str = "Bridgepool LP";

/// Default share token ticker.
pub const DEFAULT_SHARE_SYMBOL: &str = "bpLP";

// ---------------------------------------------------------------------------
// Node defaults
// ---------------------------------------------------------------------------

/// JSON-RPC and WebSocket port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Prometheus scrape port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Capacity of the event broadcast channel feeding WebSocket subscribers.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Everything needed to construct a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Identity of the vault itself in the transfer capability.
    pub address: Address,
    /// The single underlying asset LPs deposit.
    pub asset: AssetId,
    #[serde(default = "default_share_name")]
    pub share_name: String,
    #[serde(default = "default_share_symbol")]
    pub share_symbol: String,
    pub starknet_core: Address,
    pub l1_bridge: Address,
    pub l2_bridge: L2Address,
    /// Usually registered later with `set_l2_fw`.
    #[serde(default)]
    pub l2_fw: Option<L2Address>,
    /// Sweep destination. Falls back to the calling admin when unset.
    #[serde(default)]
    pub treasury: Option<Address>,
    /// Roles seeded to the deployer. `ADMIN` is always included.
    #[serde(default = "default_deployer_roles")]
    pub deployer_roles: Vec<Role>,
}

fn default_share_name() -> String {
    DEFAULT_SHARE_NAME.to_string()
}

fn default_share_symbol() -> String {
    DEFAULT_SHARE_SYMBOL.to_string()
}

fn default_deployer_roles() -> Vec<Role> {
    Role::ALL.to_vec()
}

impl VaultConfig {
    /// Rejects zero identities and a registered-but-zero L2 peer.
    pub fn validate(&self) -> VaultResult<()> {
        ensure_address(self.address)?;
        ensure_address(self.starknet_core)?;
        ensure_address(self.l1_bridge)?;
        if let AssetId::Token(token) = self.asset {
            ensure_address(token)?;
        }
        if self.l2_bridge.is_zero() || self.l2_fw.is_some_and(|fw| fw.is_zero()) {
            return Err(VaultError::AddressNul);
        }
        if let Some(treasury) = self.treasury {
            ensure_address(treasury)?;
        }
        Ok(())
    }

    /// The peer identifiers this config binds the vault to.
    pub fn peers(&self) -> PeerReference {
        PeerReference {
            starknet_core: self.starknet_core,
            l1_bridge: self.l1_bridge,
            l2_bridge: self.l2_bridge,
            l2_fw: self.l2_fw,
        }
    }

    /// A fully populated devnet configuration backed by `asset`.
    pub fn devnet(asset: AssetId) -> Self {
        Self {
            address: Address::repeat_byte(0xf0),
            asset,
            share_name: default_share_name(),
            share_symbol: default_share_symbol(),
            starknet_core: Address::repeat_byte(0xc0),
            l1_bridge: Address::repeat_byte(0xb1),
            l2_bridge: L2Address::from(0xb2),
            l2_fw: None,
            treasury: None,
            deployer_roles: default_deployer_roles(),
        }
    }
}
