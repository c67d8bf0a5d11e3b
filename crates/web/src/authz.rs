//! Capability checks for back-office actions.
//!
//! An admin's capabilities are the union of the actions of their role's
//! permissions and the legacy tokens stored on the admin itself. Unknown
//! action strings grant nothing.

use std::collections::HashSet;

use farmfusion_core::Capability;

use crate::db::{DocumentStore, Repository, RepositoryError};
use crate::models::{AdminProfile, Permission, Role};

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The admin has no role and no inline grant.
    NoRole,
    /// The admin's role was deleted.
    RoleNotFound,
    /// Neither the role nor the inline list grants the capability.
    MissingCapability,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    /// Whether the action may proceed.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// State of the admin's role reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleState {
    Unassigned,
    Missing,
    Loaded,
}

/// Capabilities held by one admin.
#[derive(Debug, Clone)]
pub struct Grants {
    capabilities: HashSet<Capability>,
    role: RoleState,
}

impl Grants {
    /// Resolve the admin's role and permissions.
    ///
    /// Permission ids the role still references after the permission was
    /// deleted are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the role or permissions cannot be loaded.
    pub async fn load(
        store: &DocumentStore,
        admin: &AdminProfile,
    ) -> Result<Self, RepositoryError> {
        let role = match admin.role {
            Some(role_id) => Repository::<Role>::new(store).get(role_id).await?,
            None => None,
        };
        let permissions = match &role {
            Some(role) => {
                Repository::<Permission>::new(store)
                    .get_many(&role.permissions)
                    .await?
            }
            None => Vec::new(),
        };
        let state = match (admin.role, &role) {
            (None, _) => RoleState::Unassigned,
            (Some(_), None) => RoleState::Missing,
            (Some(_), Some(_)) => RoleState::Loaded,
        };
        Ok(Self::resolve(state, &permissions, &admin.permissions))
    }

    fn resolve(role: RoleState, permissions: &[Permission], inline: &[String]) -> Self {
        let capabilities = permissions
            .iter()
            .filter_map(Permission::capability)
            .chain(inline.iter().filter_map(|token| token.parse().ok()))
            .collect();
        Self { capabilities, role }
    }

    /// Check a single capability.
    #[must_use]
    pub fn authorize(&self, capability: Capability) -> Decision {
        if self.capabilities.contains(&capability) {
            return Decision::Allow;
        }
        Decision::Deny(match self.role {
            RoleState::Unassigned => DenyReason::NoRole,
            RoleState::Missing => DenyReason::RoleNotFound,
            RoleState::Loaded => DenyReason::MissingCapability,
        })
    }

    /// [`Grants::authorize`], logging refusals against `admin`.
    #[must_use]
    pub fn check(&self, admin: &AdminProfile, capability: Capability) -> Decision {
        let decision = self.authorize(capability);
        if let Decision::Deny(reason) = decision {
            tracing::warn!(
                admin_id = %admin.id,
                capability = capability.as_str(),
                ?reason,
                "action denied"
            );
        }
        decision
    }

    /// Every capability held, in declaration order.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self.capabilities.contains(c))
            .collect()
    }
}

/// Load the admin's grants and check `capability`.
///
/// # Errors
///
/// Returns `RepositoryError` if the role or permissions cannot be loaded.
pub async fn authorize(
    store: &DocumentStore,
    admin: &AdminProfile,
    capability: Capability,
) -> Result<Decision, RepositoryError> {
    Ok(Grants::load(store, admin).await?.check(admin, capability))
}

/// Flash title shown when `capability` is refused.
#[must_use]
pub fn denied_message(capability: Capability) -> String {
    format!("You are not allowed to {}", capability.describe())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use farmfusion_core::Email;

    use super::*;
    use crate::models::{Admin, NewAdmin};

    fn permission(action: &str) -> Permission {
        Permission::new(action.to_string(), String::new(), action.to_string())
    }

    #[test]
    fn test_union_of_role_and_inline_grants() {
        let grants = Grants::resolve(
            RoleState::Loaded,
            &[permission("inventory:view")],
            &["inventory:restock".to_string(), "legacy-stock".to_string()],
        );
        assert_eq!(grants.authorize(Capability::ViewInventory), Decision::Allow);
        assert_eq!(grants.authorize(Capability::RestockInventory), Decision::Allow);
        assert_eq!(
            grants.authorize(Capability::ManageRoles),
            Decision::Deny(DenyReason::MissingCapability)
        );
        assert_eq!(
            grants.capabilities(),
            vec![Capability::ViewInventory, Capability::RestockInventory]
        );
    }

    #[test]
    fn test_deny_reasons_follow_role_state() {
        let none = Grants::resolve(RoleState::Unassigned, &[], &[]);
        assert_eq!(
            none.authorize(Capability::ViewAdmins),
            Decision::Deny(DenyReason::NoRole)
        );
        let missing = Grants::resolve(RoleState::Missing, &[], &[]);
        assert_eq!(
            missing.authorize(Capability::ViewAdmins),
            Decision::Deny(DenyReason::RoleNotFound)
        );
        let inline_only =
            Grants::resolve(RoleState::Unassigned, &[], &["admins:view".to_string()]);
        assert!(inline_only.authorize(Capability::ViewAdmins).is_allowed());
    }

    #[tokio::test]
    async fn test_deleted_role_reports_role_not_found() {
        let store = DocumentStore::memory();
        let view = Repository::<Permission>::new(&store)
            .create(permission("customers:view"))
            .await
            .unwrap();
        let role = Repository::<Role>::new(&store)
            .create(Role::new("Clerk".to_string(), vec![view.id]))
            .await
            .unwrap();
        let admin = Repository::<Admin>::new(&store)
            .create(Admin::new(NewAdmin {
                email: Email::parse("clerk@farm.test").unwrap(),
                password_hash: "hash".to_string(),
                first_name: "Efua".to_string(),
                last_name: "Asante".to_string(),
                phone: None,
                role: Some(role.id),
            }))
            .await
            .unwrap();
        let profile = AdminProfile::from(admin.clone());

        assert_eq!(
            authorize(&store, &profile, Capability::ViewCustomers).await.unwrap(),
            Decision::Allow
        );

        assert!(Repository::<Role>::new(&store).delete(role.id).await.unwrap());
        let admin = Repository::<Admin>::new(&store).get(admin.id).await.unwrap().unwrap();
        assert_eq!(admin.role, Some(role.id));
        assert_eq!(
            authorize(&store, &admin.into(), Capability::ViewCustomers).await.unwrap(),
            Decision::Deny(DenyReason::RoleNotFound)
        );
    }
}
