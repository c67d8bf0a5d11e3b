//! Domain models stored in the document store.

pub mod admin;
pub mod customer;
pub mod inventory;
pub mod notification;
pub mod role;
pub mod session;
pub mod settings;

use serde::Serialize;

pub use admin::{Admin, AdminPatch, AdminProfile, NewAdmin};
pub use customer::{Customer, CustomerPatch, CustomerProfile, NewCustomer};
pub use inventory::{InventoryImage, InventoryItem, InventoryPatch, NewInventoryItem, RestockHistory};
pub use notification::Notification;
pub use role::{Permission, PermissionPatch, Role, RolePatch};
pub use session::session_keys;
pub use settings::GeneralSettings;

/// Patch replacing an account's password hash.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordPatch {
    pub password_hash: String,
}
