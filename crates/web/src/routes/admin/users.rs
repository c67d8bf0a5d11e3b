//! Admin account management.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use farmfusion_core::{AdminId, Capability, RoleId};

use crate::{
    db::Repository,
    error::{AppError, Result},
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    models::{Admin, AdminPatch, NewAdmin, Role},
    routes::{
        Intent, ListParams, Pager, Verb, flash_redirect, form_path, outcome, parse_id,
        validation_failed,
    },
    services::auth::{AdminAuth, AuthError, hash_password},
    state::AppState,
    validation::{self, FieldErrors},
};

use super::{Access, AdminNav, short_date};

/// Route of the admin list.
pub const PATH: &str = "/admin/users";

/// Admin row for templates.
#[derive(Debug, Clone)]
pub struct AdminRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role_id: String,
    pub role_name: String,
    pub created_at: String,
    pub is_self: bool,
}

/// Role choice in the admin form.
#[derive(Debug, Clone)]
pub struct RoleOption {
    pub id: String,
    pub name: String,
}

/// Admin list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub admins: Vec<AdminRow>,
    pub roles: Vec<RoleOption>,
    pub pager: Pager,
    pub can_manage: bool,
}

/// Admin list handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(params): Query<ListParams>,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ViewAdmins).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };

    let roles = Repository::<Role>::new(state.store()).all().await?;
    let role_names: HashMap<RoleId, String> =
        roles.iter().map(|r| (r.id, r.name.clone())).collect();

    let page = Repository::<Admin>::new(state.store())
        .list(&params.query(state.config().page_size))
        .await?;
    let pager = Pager::new(PATH, &page, &params);
    let admins = page
        .items
        .into_iter()
        .map(|a| AdminRow {
            id: a.id.to_string(),
            is_self: a.id == access.admin.id,
            role_id: a.role.map(|r| r.to_string()).unwrap_or_default(),
            role_name: match a.role {
                Some(role) => role_names
                    .get(&role)
                    .cloned()
                    .unwrap_or_else(|| "Deleted role".to_string()),
                None => "None".to_string(),
            },
            first_name: a.first_name,
            last_name: a.last_name,
            email: a.email.to_string(),
            phone: a.phone.unwrap_or_default(),
            created_at: short_date(a.created_at),
        })
        .collect();

    Ok(UsersTemplate {
        nav: access.nav(PATH),
        flash,
        admins,
        roles: roles
            .into_iter()
            .map(|r| RoleOption {
                id: r.id.to_string(),
                name: r.name,
            })
            .collect(),
        pager,
        can_manage: access.can(Capability::ManageAdmins),
    }
    .into_response())
}

/// Admin form fields; which ones matter depends on `intent`.
#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl UserForm {
    /// Validate the profile fields shared by `create` and `update`,
    /// recording failures in `errors`.
    pub fn profile(&self, errors: &mut FieldErrors) -> Option<AdminPatch> {
        let first_name = errors.check("first_name", validation::name(&self.first_name));
        let last_name = errors.check("last_name", validation::name(&self.last_name));
        let email = errors.check("email", validation::email(&self.email));
        let phone = errors.check("phone", validation::phone(&self.phone, false));
        let role = errors.check("role", parse_role(&self.role));
        Some(AdminPatch {
            first_name: first_name?,
            last_name: last_name?,
            email: email?,
            phone: phone.filter(|p| !p.is_empty()),
            role: role?,
        })
    }

    fn check_password(&self, errors: &mut FieldErrors) {
        errors.check("password", validation::password(&self.password));
        errors.check(
            "confirm_password",
            validation::confirmation(&self.password, &self.confirm_password),
        );
    }
}

/// Empty selects "no role".
fn parse_role(raw: &str) -> std::result::Result<Option<RoleId>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| "Invalid role".to_string())
}

/// Admin form handler (`create`, `update`, `delete`, `reset_password`).
#[instrument(skip_all)]
pub async fn action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Form(form): Form<UserForm>,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ManageAdmins).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };
    let path = form_path(form.path.as_deref(), PATH);
    let admins = Repository::<Admin>::new(state.store());
    let id: Option<AdminId> = parse_id(form.id.as_deref());

    let message = match (form.intent, id) {
        (Intent::Create, _) => {
            let mut errors = FieldErrors::new();
            let profile = form.profile(&mut errors);
            form.check_password(&mut errors);
            let Some(profile) = profile.filter(|_| errors.is_empty()) else {
                return Ok(validation_failed(errors));
            };
            let admin = Admin::new(NewAdmin {
                email: profile.email,
                password_hash: hash_password(&form.password)?,
                first_name: profile.first_name,
                last_name: profile.last_name,
                phone: profile.phone,
                role: profile.role,
            });
            outcome("Admin", Verb::Add, admins.create(admin).await.map(Some))
        }
        (Intent::Update, Some(id)) => {
            let mut errors = FieldErrors::new();
            let Some(patch) = form.profile(&mut errors).filter(|_| errors.is_empty()) else {
                return Ok(validation_failed(errors));
            };
            outcome("Admin", Verb::Update, admins.update(id, &patch).await)
        }
        (Intent::Delete, Some(id)) if id == access.admin.id => {
            FlashMessage::error("You cannot delete your own account")
        }
        (Intent::Delete, Some(id)) => outcome(
            "Admin",
            Verb::Delete,
            admins.delete(id).await.map(|existed| existed.then_some(())),
        ),
        (Intent::ResetPassword, Some(id)) => {
            let mut errors = FieldErrors::new();
            form.check_password(&mut errors);
            if !errors.is_empty() {
                return Ok(validation_failed(errors));
            }
            reset_password(&state, id, &form.password).await?
        }
        (Intent::Update | Intent::Delete | Intent::ResetPassword, None) => {
            FlashMessage::error("Admin does not exist!")
        }
        _ => FlashMessage::error("Unsupported action"),
    };

    Ok(flash_redirect(&path, message))
}

async fn reset_password(state: &AppState, id: AdminId, password: &str) -> Result<FlashMessage> {
    match AdminAuth::new(state.store()).reset_password(id, password).await {
        Ok(()) => Ok(FlashMessage::success("Password Reset Successful")),
        Err(AuthError::AccountNotFound) => Ok(FlashMessage::error("Admin does not exist!")),
        Err(AuthError::Repository(e)) => {
            tracing::error!(admin_id = %id, error = %e, "password reset failed");
            Ok(FlashMessage::error("Error Resetting Password"))
        }
        Err(e) => Err(AppError::from(e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(intent: Intent) -> UserForm {
        UserForm {
            intent,
            path: None,
            id: None,
            first_name: "Ama".into(),
            last_name: "Owusu".into(),
            email: "Ama@Farm.test".into(),
            phone: String::new(),
            role: String::new(),
            password: "Harvest42".into(),
            confirm_password: "Harvest42".into(),
        }
    }

    #[test]
    fn test_profile_normalizes_optional_fields() {
        let mut errors = FieldErrors::new();
        let patch = form(Intent::Create).profile(&mut errors).unwrap();
        assert!(errors.is_empty());
        assert_eq!(patch.email.as_str(), "ama@farm.test");
        assert_eq!(patch.phone, None);
        assert_eq!(patch.role, None);
    }

    #[test]
    fn test_profile_rejects_bad_role_and_name() {
        let mut bad = form(Intent::Update);
        bad.role = "not-a-uuid".into();
        bad.last_name = "O".into();
        let mut errors = FieldErrors::new();
        assert!(bad.profile(&mut errors).is_none());
        assert_eq!(errors.get("role"), Some("Invalid role"));
        assert_eq!(errors.get("last_name"), Some("Invalid name"));
    }

    #[test]
    fn test_password_mismatch_is_reported() {
        let mut bad = form(Intent::ResetPassword);
        bad.confirm_password = "Harvest43".into();
        let mut errors = FieldErrors::new();
        bad.check_password(&mut errors);
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
    }
}
