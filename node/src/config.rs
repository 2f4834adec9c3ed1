//! # Node Configuration
//!
//! The YAML file read by `bridgepool-node run` and written by
//! `bridgepool-node init`. It binds the node to one vault: who deploys it,
//! how it is configured and which balances the in-memory bank starts with.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use alloy_primitives::{utils::parse_ether, Address, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use bridgepool_vault::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};
use bridgepool_vault::{AssetId, MemoryBank, VaultConfig};

use crate::logging::LogFormat;

/// File name looked up in the data directory when `--config` is omitted.
pub const CONFIG_FILE_NAME: &str = "bridgepool.yaml";

/// Top-level node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Deployer of the vault; receives the configured deployer roles.
    pub admin: Address,
    pub vault: VaultConfig,
    /// Balances minted into the bank when the vault is first created.
    #[serde(default)]
    pub genesis: Vec<GenesisAllocation>,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub rpc_port: u16,
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rpc_port: DEFAULT_RPC_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

/// A starting balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub account: Address,
    pub asset: AssetId,
    pub amount: U256,
}

impl NodeConfig {
    /// Loads from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(&file)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .vault
            .validate()
            .with_context(|| format!("invalid vault section in {}", path.display()))?;
        Ok(config)
    }

    /// Saves to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// A devnet layout: a token-backed vault, an admin, and a funded L1
    /// bridge so settlements can be pulled.
    pub fn devnet() -> anyhow::Result<Self> {
        let token = AssetId::Token(Address::repeat_byte(0xee));
        let vault = VaultConfig::devnet(token);
        let admin = Address::repeat_byte(0x01);
        let genesis = vec![
            GenesisAllocation {
                account: admin,
                asset: token,
                amount: parse_ether("1000")?,
            },
            GenesisAllocation {
                account: vault.l1_bridge,
                asset: token,
                amount: parse_ether("1000")?,
            },
        ];
        Ok(Self {
            server: ServerConfig::default(),
            log_format: LogFormat::Pretty,
            admin,
            vault,
            genesis,
        })
    }

    /// Builds the bank described by the genesis allocations.
    pub fn genesis_bank(&self) -> anyhow::Result<MemoryBank> {
        let mut bank = MemoryBank::new();
        for alloc in &self.genesis {
            bank.mint(alloc.asset, alloc.account, alloc.amount)
                .with_context(|| format!("genesis allocation to {} overflows", alloc.account))?;
        }
        Ok(bank)
    }
}
