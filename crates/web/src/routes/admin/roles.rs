//! Role management.
//!
//! A role's permissions arrive as repeated `permissions` fields (a multiple
//! select) or as one comma separated value; both forms are accepted.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use farmfusion_core::{Capability, PermissionId, RoleId};

use crate::{
    db::Repository,
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    models::{Permission, Role, RolePatch},
    routes::{
        Intent, ListParams, Pager, Verb, flash_redirect, form_path, outcome, parse_id,
        validation_failed,
    },
    state::AppState,
    validation::{self, FieldErrors},
};

use super::{Access, AdminNav, short_date};

/// Route of the role list.
pub const PATH: &str = "/admin/settings/roles";

/// Role row for templates.
#[derive(Debug, Clone)]
pub struct RoleRow {
    pub id: String,
    pub name: String,
    pub permission_ids: String,
    pub permission_names: Vec<String>,
    pub created_at: String,
}

/// Permission choice in the role form.
#[derive(Debug, Clone)]
pub struct PermissionOption {
    pub id: String,
    pub name: String,
    pub action: String,
}

/// Role list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/roles.html")]
pub struct RolesTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub roles: Vec<RoleRow>,
    pub permissions: Vec<PermissionOption>,
    pub pager: Pager,
}

/// Role list handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(params): Query<ListParams>,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ManageRoles).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };

    let permissions = Repository::<Permission>::new(state.store()).all().await?;
    let names: HashMap<PermissionId, &str> = permissions
        .iter()
        .map(|p| (p.id, p.name.as_str()))
        .collect();

    let page = Repository::<Role>::new(state.store())
        .list(&params.query(state.config().page_size))
        .await?;
    let pager = Pager::new(PATH, &page, &params);
    let roles = page
        .items
        .into_iter()
        .map(|role| RoleRow {
            id: role.id.to_string(),
            permission_ids: role
                .permissions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            // Ids of deleted permissions are skipped.
            permission_names: role
                .permissions
                .iter()
                .filter_map(|id| names.get(id).map(|name| (*name).to_string()))
                .collect(),
            created_at: short_date(role.created_at),
            name: role.name,
        })
        .collect();

    Ok(RolesTemplate {
        nav: access.nav(PATH),
        flash,
        roles,
        permissions: permissions
            .iter()
            .map(|p| PermissionOption {
                id: p.id.to_string(),
                name: p.name.clone(),
                action: p.action.clone(),
            })
            .collect(),
        pager,
    }
    .into_response())
}

/// Role form fields.
#[derive(Debug, Default)]
pub struct RoleForm {
    pub intent: Option<String>,
    pub path: Option<String>,
    pub id: Option<String>,
    pub name: String,
    pub permissions: Vec<String>,
}

impl RoleForm {
    /// Collect the posted fields; repeated `permissions` values accumulate.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "intent" => form.intent = Some(value),
                "path" => form.path = Some(value),
                "id" => form.id = Some(value),
                "name" => form.name = value,
                "permissions" => form.permissions.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(String::from),
                ),
                _ => {}
            }
        }
        form
    }

    /// Posted intent, if it is a known one.
    #[must_use]
    pub fn intent(&self) -> Option<Intent> {
        let raw = self.intent.as_deref()?;
        serde_json::from_value(serde_json::Value::String(raw.to_string())).ok()
    }

    /// Validate the role fields, recording failures in `errors`.
    pub fn fields(&self, errors: &mut FieldErrors) -> Option<RolePatch> {
        let name = errors.check("name", validation::required(&self.name, "Name"));
        let permissions: std::result::Result<Vec<PermissionId>, _> =
            self.permissions.iter().map(|raw| raw.parse()).collect();
        let permissions = errors.check(
            "permissions",
            permissions.map_err(|_| "Invalid permission".to_string()),
        );
        Some(RolePatch {
            name: name?,
            permissions: permissions?,
        })
    }
}

/// Role form handler (`create`, `update`, `delete`).
#[instrument(skip_all)]
pub async fn action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response> {
    if let Err(denied) = Access::require(&state, admin, Capability::ManageRoles).await {
        return Ok(denied);
    }
    let form = RoleForm::from_pairs(pairs);
    let path = form_path(form.path.as_deref(), PATH);
    let roles = Repository::<Role>::new(state.store());
    let id: Option<RoleId> = parse_id(form.id.as_deref());

    let message = match (form.intent(), id) {
        (Some(Intent::Create), _) => {
            let mut errors = FieldErrors::new();
            let Some(fields) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            let role = Role::new(fields.name, fields.permissions);
            outcome("Role", Verb::Add, roles.create(role).await.map(Some))
        }
        (Some(Intent::Update), Some(id)) => {
            let mut errors = FieldErrors::new();
            let Some(patch) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            outcome("Role", Verb::Update, roles.update(id, &patch).await)
        }
        // Admins holding the role keep the dangling id.
        (Some(Intent::Delete), Some(id)) => outcome(
            "Role",
            Verb::Delete,
            roles.delete(id).await.map(|existed| existed.then_some(())),
        ),
        (Some(Intent::Update | Intent::Delete), None) => FlashMessage::error("Role not found"),
        _ => FlashMessage::error("Unsupported action"),
    };

    Ok(flash_redirect(&path, message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_permissions_accept_repeated_and_comma_separated() {
        let a = PermissionId::generate();
        let b = PermissionId::generate();
        let c = PermissionId::generate();
        let form = RoleForm::from_pairs(pairs(&[
            ("intent", "create"),
            ("name", "Storekeeper"),
            ("permissions", &a.to_string()),
            ("permissions", &format!("{b}, {c}")),
        ]));
        assert_eq!(form.intent(), Some(Intent::Create));

        let mut errors = FieldErrors::new();
        let patch = form.fields(&mut errors).unwrap();
        assert_eq!(patch.name, "Storekeeper");
        assert_eq!(patch.permissions, vec![a, b, c]);
    }

    #[test]
    fn test_unknown_intent_and_bad_ids() {
        let form = RoleForm::from_pairs(pairs(&[
            ("intent", "archive"),
            ("name", " "),
            ("permissions", "not-an-id"),
        ]));
        assert_eq!(form.intent(), None);

        let mut errors = FieldErrors::new();
        assert!(form.fields(&mut errors).is_none());
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("permissions"), Some("Invalid permission"));
    }
}
