// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bridgepool Vault
//!
//! Accounting core of a cross-chain fast-withdrawal liquidity vault. LPs
//! pool an underlying asset on L1; a relayer uses that pool to pay L2 users
//! out immediately and later settles the batch back, fees included:
//!
//! - **Access Gate** ([`access`]): role table checked before every
//!   privileged call.
//! - **Share Ledger** ([`shares`], [`ledger`]): ERC-4626 style conversion
//!   with a virtual offset, and the share token's balances and allowances.
//! - **Batch Settlement** ([`settlement`]): debt intake and settlement, each
//!   a pure check pass followed by an assignment pass.
//! - **Pause Controller** ([`pause`]): halts the settlement path.
//! - **Maintenance** (`admin`): one-time L2 peer registration and sweeps.
//!
//! ## Design Principles
//!
//! 1. All quantities are `U256` and every arithmetic step is checked.
//! 2. Checks, then effects, then transfers. A failing transfer restores the
//!    pre-call ledger.
//! 3. The vault never authenticates anyone. The host passes the caller.
//! 4. Every public type is serde-serializable for RPC and snapshots.

pub mod access;
mod admin;
pub mod bank;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod pause;
pub mod settlement;
pub mod shares;
pub mod types;
pub mod vault;

pub use bank::{Bank, MemoryBank, TransferError};
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use events::VaultEvent;
pub use ledger::VaultState;
pub use types::{AssetId, DebtPosting, IntakeSource, L2Address, PeerReference, Role, SettlementPayload};
pub use vault::Vault;
