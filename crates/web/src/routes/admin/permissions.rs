//! Permission management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use farmfusion_core::{Capability, PermissionId};

use crate::{
    db::Repository,
    error::Result,
    filters,
    flash::{Flash, FlashMessage},
    middleware::CurrentAdmin,
    models::{Permission, PermissionPatch},
    routes::{
        Intent, ListParams, Pager, Verb, flash_redirect, form_path, outcome, parse_id,
        validation_failed,
    },
    state::AppState,
    validation::{self, FieldErrors},
};

use super::{Access, AdminNav};

/// Route of the permission list.
pub const PATH: &str = "/admin/settings/permissions";

/// Permission row for templates.
#[derive(Debug, Clone)]
pub struct PermissionRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub action: String,
    /// Whether the action is a capability the back office checks.
    pub known: bool,
}

/// A capability offered as a permission action.
#[derive(Debug, Clone)]
pub struct ActionOption {
    pub token: &'static str,
    pub label: &'static str,
}

/// Permission list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/permissions.html")]
pub struct PermissionsTemplate {
    pub nav: AdminNav,
    pub flash: Option<FlashMessage>,
    pub permissions: Vec<PermissionRow>,
    pub actions: Vec<ActionOption>,
    pub pager: Pager,
}

/// Permission list handler.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(params): Query<ListParams>,
    Flash(flash): Flash,
) -> Result<Response> {
    let access = match Access::require(&state, admin, Capability::ManagePermissions).await {
        Ok(access) => access,
        Err(denied) => return Ok(denied),
    };

    let page = Repository::<Permission>::new(state.store())
        .list(&params.query(state.config().page_size))
        .await?;
    let pager = Pager::new(PATH, &page, &params);
    let permissions = page
        .items
        .into_iter()
        .map(|p| PermissionRow {
            id: p.id.to_string(),
            known: p.capability().is_some(),
            name: p.name,
            description: p.description,
            action: p.action,
        })
        .collect();

    Ok(PermissionsTemplate {
        nav: access.nav(PATH),
        flash,
        permissions,
        actions: Capability::ALL
            .iter()
            .map(|c| ActionOption {
                token: c.as_str(),
                label: c.describe(),
            })
            .collect(),
        pager,
    }
    .into_response())
}

/// Permission form fields.
#[derive(Debug, Deserialize)]
pub struct PermissionForm {
    pub intent: Intent,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: String,
}

impl PermissionForm {
    /// Validate the permission fields, recording failures in `errors`.
    ///
    /// Actions outside the known capabilities are stored as given; they
    /// grant nothing.
    pub fn fields(&self, errors: &mut FieldErrors) -> Option<PermissionPatch> {
        let name = errors.check("name", validation::required(&self.name, "Name"));
        let action = errors.check("action", validation::required(&self.action, "Action"));
        Some(PermissionPatch {
            name: name?,
            description: self.description.trim().to_string(),
            action: action?,
        })
    }
}

/// Permission form handler (`create`, `update`, `delete`).
#[instrument(skip_all)]
pub async fn action(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Form(form): Form<PermissionForm>,
) -> Result<Response> {
    if let Err(denied) = Access::require(&state, admin, Capability::ManagePermissions).await {
        return Ok(denied);
    }
    let path = form_path(form.path.as_deref(), PATH);
    let permissions = Repository::<Permission>::new(state.store());
    let id: Option<PermissionId> = parse_id(form.id.as_deref());

    let message = match (form.intent, id) {
        (Intent::Create, _) => {
            let mut errors = FieldErrors::new();
            let Some(fields) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            let permission = Permission::new(fields.name, fields.description, fields.action);
            outcome(
                "Permission",
                Verb::Add,
                permissions.create(permission).await.map(Some),
            )
        }
        (Intent::Update, Some(id)) => {
            let mut errors = FieldErrors::new();
            let Some(patch) = form.fields(&mut errors) else {
                return Ok(validation_failed(errors));
            };
            outcome("Permission", Verb::Update, permissions.update(id, &patch).await)
        }
        // Roles keep the dangling id; it is skipped when resolving grants.
        (Intent::Delete, Some(id)) => outcome(
            "Permission",
            Verb::Delete,
            permissions.delete(id).await.map(|existed| existed.then_some(())),
        ),
        (Intent::Update | Intent::Delete, None) => FlashMessage::error("Permission not found"),
        _ => FlashMessage::error("Unsupported action"),
    };

    Ok(flash_redirect(&path, message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_action_is_kept() {
        let form = PermissionForm {
            intent: Intent::Create,
            path: None,
            id: None,
            name: "Export".into(),
            description: " Download reports ".into(),
            action: "reports:export".into(),
        };
        let mut errors = FieldErrors::new();
        let patch = form.fields(&mut errors).unwrap();
        assert_eq!(patch.action, "reports:export");
        assert_eq!(patch.description, "Download reports");
    }

    #[test]
    fn test_action_is_required() {
        let form = PermissionForm {
            intent: Intent::Create,
            path: None,
            id: None,
            name: "Export".into(),
            description: String::new(),
            action: String::new(),
        };
        let mut errors = FieldErrors::new();
        assert!(form.fields(&mut errors).is_none());
        assert_eq!(errors.get("action"), Some("Action is required"));
    }
}
