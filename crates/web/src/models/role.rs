//! Roles and permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmfusion_core::{Capability, PermissionId, RoleId};

use crate::db::Document;

/// A named set of permissions assigned to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Not enforced: ids may point at deleted permissions.
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Build a fresh role document.
    #[must_use]
    pub fn new(name: String, permissions: Vec<PermissionId>) -> Self {
        let now = Utc::now();
        Self {
            id: RoleId::generate(),
            name,
            permissions,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Role {
    type Id = RoleId;

    const COLLECTION: &'static str = "roles";
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];
    const SORT_FIELD: &'static str = "name";
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn id(&self) -> RoleId {
        self.id
    }
}

/// Editable role fields.
#[derive(Debug, Clone, Serialize)]
pub struct RolePatch {
    pub name: String,
    pub permissions: Vec<PermissionId>,
}

/// A permission: a named, described capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Capability token; unknown tokens are stored but grant nothing.
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Build a fresh permission document.
    #[must_use]
    pub fn new(name: String, description: String, action: String) -> Self {
        let now = Utc::now();
        Self {
            id: PermissionId::generate(),
            name,
            description,
            action,
            created_at: now,
            updated_at: now,
        }
    }

    /// The capability this permission grants, if its action is known.
    #[must_use]
    pub fn capability(&self) -> Option<Capability> {
        self.action.parse().ok()
    }
}

impl Document for Permission {
    type Id = PermissionId;

    const COLLECTION: &'static str = "permissions";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const SORT_FIELD: &'static str = "name";
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn id(&self) -> PermissionId {
        self.id
    }
}

/// Editable permission fields.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionPatch {
    pub name: String,
    pub description: String,
    pub action: String,
}
