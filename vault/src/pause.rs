//! # Pause Controller
//!
//! Emergency halt for the settlement path. Only batch settlement consults
//! this flag; LP operations and debt intake stay open while paused.

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Whether the settlement path is halted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseState {
    #[default]
    Active,
    Paused,
}

impl std::fmt::Display for PauseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PauseState::Active => write!(f, "Active"),
            PauseState::Paused => write!(f, "Paused"),
        }
    }
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        matches!(self, PauseState::Paused)
    }

    /// Fails with [`VaultError::Paused`] while halted.
    pub fn ensure_not_paused(&self) -> VaultResult<()> {
        if self.is_paused() {
            return Err(VaultError::Paused);
        }
        Ok(())
    }

    /// Transitions `Active` → `Paused`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Paused`] if already paused.
    pub fn pause(&mut self) -> VaultResult<()> {
        self.ensure_not_paused()?;
        *self = PauseState::Paused;
        Ok(())
    }

    /// Transitions `Paused` → `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotPaused`] if not paused.
    pub fn unpause(&mut self) -> VaultResult<()> {
        if !self.is_paused() {
            return Err(VaultError::NotPaused);
        }
        *self = PauseState::Active;
        Ok(())
    }
}
