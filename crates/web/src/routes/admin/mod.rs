//! Back-office route handlers.
//!
//! Every page but login requires a logged-in admin. Pages and form posts
//! additionally check a [`Capability`]; a refusal flashes
//! "You are not allowed to ..." and redirects to the dashboard.

pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod inventory;
pub mod notifications;
pub mod permissions;
pub mod roles;
pub mod settings;
pub mod users;

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::get,
};

use farmfusion_core::Capability;

use crate::{
    authz::{self, Decision, Grants},
    error::AppError,
    flash::FlashMessage,
    middleware::ADMIN_LOGIN_PATH,
    models::AdminProfile,
    state::AppState,
};

use super::flash_redirect;

/// Dashboard path; denied requests land here.
pub const DASHBOARD_PATH: &str = "/admin";

/// Back-office routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(ADMIN_LOGIN_PATH, get(auth::login_page).post(auth::login))
        .route("/admin/logout", get(auth::logout).post(auth::logout))
        .route(DASHBOARD_PATH, get(dashboard::index))
        .route(users::PATH, get(users::index).post(users::action))
        .route(customers::PATH, get(customers::index).post(customers::action))
        .route(inventory::PATH, get(inventory::index).post(inventory::action))
        .route(
            "/admin/inventory/{id}",
            get(inventory::show).post(inventory::item_action),
        )
        .route(settings::PATH, get(settings::index).post(settings::action))
        .route(roles::PATH, get(roles::index).post(roles::action))
        .route(
            permissions::PATH,
            get(permissions::index).post(permissions::action),
        )
        .route(
            notifications::PATH,
            get(notifications::index).post(notifications::action),
        )
}

/// Sidebar entries and the capability that reveals each.
const NAV_ITEMS: [(&str, &str, Option<Capability>); 8] = [
    (DASHBOARD_PATH, "Dashboard", None),
    (users::PATH, "Admins", Some(Capability::ViewAdmins)),
    (customers::PATH, "Customers", Some(Capability::ViewCustomers)),
    (inventory::PATH, "Inventory", Some(Capability::ViewInventory)),
    (settings::PATH, "Settings", Some(Capability::ManageSettings)),
    (roles::PATH, "Roles", Some(Capability::ManageRoles)),
    (permissions::PATH, "Permissions", Some(Capability::ManagePermissions)),
    (notifications::PATH, "Notifications", None),
];

/// One sidebar link.
#[derive(Debug, Clone)]
pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// Admin chrome shown on every back-office page.
#[derive(Debug, Clone)]
pub struct AdminNav {
    pub name: String,
    pub email: String,
    pub links: Vec<NavLink>,
}

/// A logged-in admin with their resolved capabilities.
pub struct Access {
    pub admin: AdminProfile,
    pub grants: Grants,
}

impl Access {
    /// Resolve the admin's capabilities without checking any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the role cannot be loaded.
    pub async fn load(state: &AppState, admin: AdminProfile) -> Result<Self, AppError> {
        let grants = Grants::load(state.store(), &admin).await?;
        Ok(Self { admin, grants })
    }

    /// Resolve the admin's capabilities and require `capability`.
    ///
    /// # Errors
    ///
    /// The error is the finished response: a flash redirect to the dashboard
    /// when refused, or a 500 when the role cannot be loaded.
    pub async fn require(
        state: &AppState,
        admin: AdminProfile,
        capability: Capability,
    ) -> Result<Self, Response> {
        let access = Self::load(state, admin)
            .await
            .map_err(IntoResponse::into_response)?;
        access.ensure(capability)?;
        Ok(access)
    }

    /// Check one more capability.
    ///
    /// # Errors
    ///
    /// A flash redirect to the dashboard when refused.
    pub fn ensure(&self, capability: Capability) -> Result<(), Response> {
        match self.grants.check(&self.admin, capability) {
            Decision::Allow => Ok(()),
            Decision::Deny(_) => Err(flash_redirect(
                DASHBOARD_PATH,
                FlashMessage::error(authz::denied_message(capability)),
            )),
        }
    }

    /// Whether `capability` is held, without logging a refusal.
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        self.grants.authorize(capability).is_allowed()
    }

    /// Sidebar for a page at `current_path`.
    #[must_use]
    pub fn nav(&self, current_path: &str) -> AdminNav {
        let links = NAV_ITEMS
            .iter()
            .filter(|(_, _, capability)| capability.is_none_or(|c| self.can(c)))
            .map(|&(href, label, _)| NavLink {
                href,
                label,
                active: href == current_path,
            })
            .collect();
        AdminNav {
            name: self.admin.full_name(),
            email: self.admin.email.to_string(),
            links,
        }
    }
}

/// Short date used in back-office tables.
pub(crate) fn short_date(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use farmfusion_core::Email;
    use secrecy::SecretString;

    use super::*;
    use crate::config::WebConfig;
    use crate::db::{DocumentStore, Repository};
    use crate::models::{Admin, NewAdmin, Permission, Role};

    async fn access_with(actions: &[&str]) -> Access {
        let store = DocumentStore::memory();
        let mut ids = Vec::new();
        for action in actions {
            let permission = Repository::<Permission>::new(&store)
                .create(Permission::new(
                    (*action).to_string(),
                    String::new(),
                    (*action).to_string(),
                ))
                .await
                .unwrap();
            ids.push(permission.id);
        }
        let role = Repository::<Role>::new(&store)
            .create(Role::new("Clerk".to_string(), ids))
            .await
            .unwrap();
        let admin = Admin::new(NewAdmin {
            email: Email::parse("clerk@farm.test").unwrap(),
            password_hash: "hash".to_string(),
            first_name: "Kofi".to_string(),
            last_name: "Mensah".to_string(),
            phone: None,
            role: Some(role.id),
        });
        let config = WebConfig::local(SecretString::from("kP9#vR2$mX7!qL4@wZ8&nB3*tY6^hJ1%"));
        let state = AppState::new(config, store);
        Access::load(&state, admin.into()).await.unwrap()
    }

    #[tokio::test]
    async fn test_nav_hides_pages_without_capability() {
        let access = access_with(&["inventory:view"]).await;
        let nav = access.nav(inventory::PATH);
        let labels: Vec<_> = nav.links.iter().map(|l| l.label).collect();
        assert_eq!(labels, vec!["Dashboard", "Inventory", "Notifications"]);
        assert!(nav.links.iter().any(|l| l.active && l.href == inventory::PATH));
        assert_eq!(nav.name, "Kofi Mensah");
    }

    #[tokio::test]
    async fn test_ensure_refusal_redirects_to_dashboard() {
        let access = access_with(&["inventory:view"]).await;
        assert!(access.ensure(Capability::ViewInventory).is_ok());
        let response = access.ensure(Capability::ManageRoles).unwrap_err();
        assert_eq!(response.headers()["location"], DASHBOARD_PATH);
    }
}
