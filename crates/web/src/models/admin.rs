//! Admin account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmfusion_core::{AdminId, Email, RoleId};

use crate::db::Document;

/// An admin account as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub id: AdminId,
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Weak reference; the role may have been deleted since.
    #[serde(default)]
    pub role: Option<RoleId>,
    /// Legacy capability tokens granted directly to the account.
    #[serde(default)]
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create an admin.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Option<RoleId>,
}

impl Admin {
    /// Build a fresh admin document.
    #[must_use]
    pub fn new(input: NewAdmin) -> Self {
        let now = Utc::now();
        Self {
            id: AdminId::generate(),
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
            role: input.role,
            permissions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Admin {
    type Id = AdminId;

    const COLLECTION: &'static str = "admins";
    const SEARCH_FIELDS: &'static [&'static str] = &["first_name", "last_name", "email"];
    const SORT_FIELD: &'static str = "first_name";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email", "phone"];

    fn id(&self) -> AdminId {
        self.id
    }
}

/// Profile fields an admin edits; `role` and `phone` are overwritten even when empty.
#[derive(Debug, Clone, Serialize)]
pub struct AdminPatch {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: Option<RoleId>,
}

/// An admin without credentials, safe to keep in handlers and templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: AdminId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Option<RoleId>,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl AdminProfile {
    /// "First Last", trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

impl From<Admin> for AdminProfile {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            first_name: admin.first_name,
            last_name: admin.last_name,
            phone: admin.phone,
            role: admin.role,
            permissions: admin.permissions,
            created_at: admin.created_at,
        }
    }
}
