//! # Access Gate
//!
//! Role table consulted before every mutating call. Membership is direct:
//! holding `ADMIN` does not imply any other role. `ADMIN` administers every
//! role, itself included, so an admin can hand over or give up control.
//!
//! The gate never authenticates anyone. The host supplies the caller
//! identity; the gate only answers "does this identity hold that role".

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::types::Role;

/// Role → members table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrants {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl RoleGrants {
    /// Creates a table with `admin` holding [`Role::Admin`].
    pub fn new(admin: Address) -> Self {
        let mut grants = Self::default();
        grants.insert(Role::Admin, admin);
        grants
    }

    /// Returns `true` if `account` holds `role`.
    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(&account))
    }

    /// Fails with [`VaultError::Unauthorized`] unless `caller` holds `role`.
    pub fn require(&self, role: Role, caller: Address) -> VaultResult<()> {
        if self.has_role(role, caller) {
            Ok(())
        } else {
            Err(VaultError::Unauthorized { role, caller })
        }
    }

    /// Grants `role` to `target` on behalf of an admin `caller`.
    ///
    /// Returns `true` if membership changed, `false` if `target` already
    /// held the role.
    pub fn grant_role(&mut self, caller: Address, role: Role, target: Address) -> VaultResult<bool> {
        self.require(Role::Admin, caller)?;
        Ok(self.insert(role, target))
    }

    /// Revokes `role` from `target` on behalf of an admin `caller`.
    ///
    /// Returns `true` if membership changed.
    pub fn revoke_role(&mut self, caller: Address, role: Role, target: Address) -> VaultResult<bool> {
        self.require(Role::Admin, caller)?;
        Ok(self.remove(role, target))
    }

    /// Drops `role` from the caller itself. Needs no admin rights.
    pub fn renounce_role(&mut self, caller: Address, role: Role) -> bool {
        self.remove(role, caller)
    }

    /// Members of `role`, in address order.
    pub fn members(&self, role: Role) -> impl Iterator<Item = &Address> {
        self.members.get(&role).into_iter().flatten()
    }

    /// Roles held by `account`.
    pub fn roles_of(&self, account: Address) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.has_role(*role, account))
            .collect()
    }

    pub(crate) fn insert(&mut self, role: Role, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    fn remove(&mut self, role: Role, account: Address) -> bool {
        let Some(set) = self.members.get_mut(&role) else {
            return false;
        };
        let removed = set.remove(&account);
        if set.is_empty() {
            self.members.remove(&role);
        }
        removed
    }
}
