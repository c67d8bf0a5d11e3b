//! Capabilities an admin can be granted through a role's permissions.
//!
//! Every `Permission` document carries an `action` token; the tokens that
//! authorization understands are exactly the variants of [`Capability`].
//! Unknown tokens are kept in storage but never grant anything.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when an action token does not name a known capability.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown capability: {0}")]
pub struct CapabilityParseError(pub String);

/// A single thing an admin may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    /// List and view admin accounts.
    ViewAdmins,
    /// Create, update, delete and reset passwords of admin accounts.
    ManageAdmins,
    /// List and view customers.
    ViewCustomers,
    /// Create, update and delete customers.
    ManageCustomers,
    /// List and view inventory.
    ViewInventory,
    /// Create, update, delete inventory items and attach images.
    ManageInventory,
    /// Restock inventory items.
    RestockInventory,
    /// Manage roles.
    ManageRoles,
    /// Manage permissions.
    ManagePermissions,
    /// Change general settings.
    ManageSettings,
}

impl Capability {
    /// Every capability, in display order.
    pub const ALL: [Self; 10] = [
        Self::ViewAdmins,
        Self::ManageAdmins,
        Self::ViewCustomers,
        Self::ManageCustomers,
        Self::ViewInventory,
        Self::ManageInventory,
        Self::RestockInventory,
        Self::ManageRoles,
        Self::ManagePermissions,
        Self::ManageSettings,
    ];

    /// The action token stored on `Permission` documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewAdmins => "admins:view",
            Self::ManageAdmins => "admins:manage",
            Self::ViewCustomers => "customers:view",
            Self::ManageCustomers => "customers:manage",
            Self::ViewInventory => "inventory:view",
            Self::ManageInventory => "inventory:manage",
            Self::RestockInventory => "inventory:restock",
            Self::ManageRoles => "roles:manage",
            Self::ManagePermissions => "permissions:manage",
            Self::ManageSettings => "settings:manage",
        }
    }

    /// Human readable phrase, used in denial messages.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::ViewAdmins => "view admins",
            Self::ManageAdmins => "manage admins",
            Self::ViewCustomers => "view customers",
            Self::ManageCustomers => "manage customers",
            Self::ViewInventory => "view inventory",
            Self::ManageInventory => "manage inventory",
            Self::RestockInventory => "restock inventory",
            Self::ManageRoles => "manage roles",
            Self::ManagePermissions => "manage permissions",
            Self::ManageSettings => "manage settings",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .into_iter()
            .find(|capability| capability.as_str() == token)
            .ok_or_else(|| CapabilityParseError(token.to_owned()))
    }
}

impl TryFrom<String> for Capability {
    type Error = CapabilityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.as_str().to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_parses_back() {
        for capability in Capability::ALL {
            assert_eq!(capability.as_str().parse::<Capability>(), Ok(capability));
        }
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let err = "inventory:burn".parse::<Capability>().unwrap_err();
        assert_eq!(err.to_string(), "unknown capability: inventory:burn");
    }

    #[test]
    fn test_tokens_are_unique() {
        let mut tokens: Vec<_> = Capability::ALL.iter().map(|c| c.as_str()).collect();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), Capability::ALL.len());
    }

    #[test]
    fn test_serde_uses_token() {
        let json = serde_json::to_string(&Capability::RestockInventory).unwrap();
        assert_eq!(json, "\"inventory:restock\"");
        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Capability::RestockInventory);
    }
}
