//! # Vault Errors
//!
//! Every rejected call surfaces exactly one [`VaultError`]. Rejection is
//! terminal for the call and leaves the vault untouched; the caller decides
//! whether to retry with corrected input.

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::bank::TransferError;
use crate::types::Role;

/// Errors returned by vault operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The caller does not hold the role the operation requires.
    #[error("unauthorized: account {caller} is missing role {role}")]
    Unauthorized {
        /// Role the operation requires.
        role: Role,
        /// The authenticated caller.
        caller: Address,
    },

    /// A recipient, owner or target address was zero.
    #[error("AddressNul: zero address is not a valid account")]
    AddressNul,

    /// An amount that must be positive was zero.
    #[error("AmountNul: amount must be greater than zero")]
    AmountNul,

    /// Debt postings in one call add up to more than the liquid balance.
    #[error("InsufficientUnderlying: postings require {requested}, liquid balance is {available}")]
    InsufficientUnderlying {
        /// Cumulative posting amount at the point of failure.
        requested: U256,
        /// Liquid balance at call start.
        available: U256,
    },

    /// A posting refers to an L2 block at or below the watermark.
    #[error("BlockAlreadyProcessed: l2 block {l2_block} is not above watermark {watermark}")]
    BlockAlreadyProcessed {
        /// Block height carried by the offending posting.
        l2_block: u64,
        /// Highest block already accepted.
        watermark: u64,
    },

    /// A settlement arrived out of sequence.
    #[error("InvalidBatchNonce: expected nonce {expected}, got {received}")]
    InvalidBatchNonce {
        /// Next nonce the vault will accept.
        expected: u64,
        /// Nonce carried by the payload.
        received: u64,
    },

    /// The one-time L2 peer registration already happened.
    #[error("FWAlreadySet: the l2 fast-withdraw peer is already registered")]
    AlreadySet,

    /// The settlement path is halted.
    #[error("Pausable: paused")]
    Paused,

    /// `unpause` was called on an active vault.
    #[error("Pausable: not paused")]
    NotPaused,

    /// The owner does not hold enough shares for the burn.
    #[error("insufficient shares: {owner} holds {balance}, requested {requested}")]
    InsufficientShares {
        /// Account whose shares would be burned or moved.
        owner: Address,
        /// Current share balance.
        balance: U256,
        /// Shares the operation needs.
        requested: U256,
    },

    /// A spender acting for an owner exceeded its share allowance.
    #[error("insufficient allowance: {spender} may move {allowance} of {owner}'s shares, requested {requested}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: U256,
        requested: U256,
    },

    /// A settlement would return more principal than is pending.
    #[error("debt underflow: settling {settled} against pending debt of {pending}")]
    DebtUnderflow {
        /// Pending debt before the settlement.
        pending: U256,
        /// Principal the payload claims to return.
        settled: U256,
    },

    /// 256-bit arithmetic overflowed or underflowed.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// The transfer capability refused to move value.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl VaultError {
    /// Stable machine-readable kind, used for metrics labels and RPC error data.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::Unauthorized { .. } => "Unauthorized",
            VaultError::AddressNul => "AddressNul",
            VaultError::AmountNul => "AmountNul",
            VaultError::InsufficientUnderlying { .. } => "InsufficientUnderlying",
            VaultError::BlockAlreadyProcessed { .. } => "BlockAlreadyProcessed",
            VaultError::InvalidBatchNonce { .. } => "InvalidBatchNonce",
            VaultError::AlreadySet => "AlreadySet",
            VaultError::Paused => "Paused",
            VaultError::NotPaused => "NotPaused",
            VaultError::InsufficientShares { .. } => "InsufficientShares",
            VaultError::InsufficientAllowance { .. } => "InsufficientAllowance",
            VaultError::DebtUnderflow { .. } => "DebtUnderflow",
            VaultError::Overflow(_) => "Overflow",
            VaultError::Transfer(_) => "TransferFailed",
        }
    }
}

/// Convenience alias used across the crate.
pub type VaultResult<T> = Result<T, VaultError>;

/// Rejects the zero address.
pub(crate) fn ensure_address(address: Address) -> VaultResult<()> {
    if address.is_zero() {
        return Err(VaultError::AddressNul);
    }
    Ok(())
}

/// Rejects a zero amount.
pub(crate) fn ensure_amount(amount: U256) -> VaultResult<()> {
    if amount.is_zero() {
        return Err(VaultError::AmountNul);
    }
    Ok(())
}
